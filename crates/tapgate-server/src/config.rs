//! Runtime configuration.

use std::time::Duration;

use tapgate_core::{AuthConfig, MailboxConfig, RendezvousConfig};
use tapgate_reader::{DEFAULT_PRESENCE, ReaderConfig};

use crate::GateError;

/// Configuration for both sides of a [`Gate`](crate::Gate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Scan mailbox TTL and capacity
    pub mailbox: MailboxConfig,
    /// Waiter poll bound
    pub rendezvous: RendezvousConfig,
    /// Flow timeouts and registration rounds
    pub auth: AuthConfig,
    /// Reader poll, debounce and publish settings
    pub reader: ReaderConfig,
    /// How long a console tap stays in the antenna field
    pub tap_presence: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            mailbox: MailboxConfig::default(),
            rendezvous: RendezvousConfig::default(),
            auth: AuthConfig::default(),
            reader: ReaderConfig::default(),
            tap_presence: DEFAULT_PRESENCE,
        }
    }
}

impl GateConfig {
    /// Reject settings that would make every request fail.
    pub fn validate(&self) -> Result<(), GateError> {
        if self.mailbox.ttl.is_zero() {
            return Err(GateError::Config("card TTL must be positive".to_string()));
        }
        if self.mailbox.capacity == 0 {
            return Err(GateError::Config("mailbox capacity must be positive".to_string()));
        }
        if self.rendezvous.poll_interval.is_zero() {
            return Err(GateError::Config("poll interval must be positive".to_string()));
        }
        if self.reader.poll_interval.is_zero() {
            return Err(GateError::Config("reader poll interval must be positive".to_string()));
        }
        if self.reader.queue_capacity == 0 {
            return Err(GateError::Config("queue capacity must be positive".to_string()));
        }
        if self.tap_presence.is_zero() {
            return Err(GateError::Config("tap presence must be positive".to_string()));
        }
        if self.auth.register_attempts == 0 {
            return Err(GateError::Config("register attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(GateConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let mut config = GateConfig::default();
        config.mailbox.ttl = Duration::ZERO;
        assert!(matches!(config.validate(), Err(GateError::Config(_))));
    }

    #[test]
    fn zero_register_attempts_is_rejected() {
        let mut config = GateConfig::default();
        config.auth.register_attempts = 0;
        assert!(matches!(config.validate(), Err(GateError::Config(_))));
    }

    #[test]
    fn zero_tap_presence_is_rejected() {
        let config = GateConfig { tap_presence: Duration::ZERO, ..GateConfig::default() };
        assert!(matches!(config.validate(), Err(GateError::Config(_))));
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let mut config = GateConfig::default();
        config.reader.queue_capacity = 0;
        assert!(matches!(config.validate(), Err(GateError::Config(_))));
    }
}
