//! Scan control protocol.
//!
//! The server tells the reader when to report scans by publishing a
//! [`Directive`] on [`CONTROL_TOPIC`]. Directives are idempotent and the last
//! one received wins, so at-least-once delivery is safe.
//!
//! Every authentication flow brackets its rendezvous the same way:
//!
//! ```text
//! begin_scan()  ->  await_card(..)  ->  end_scan()
//! ```
//!
//! Windows are counted: the reader is started when the first one opens and
//! stopped when the last one closes, so overlapping requests never switch
//! scanning off under each other. The bracket bounds the time in which an
//! out-of-band tap can be attributed to an in-flight request.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::{
    bus::{Bus, BusError, CONTROL_TOPIC, QoS},
    error::PayloadError,
};

/// Instruction to the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    /// Begin reporting scans.
    Start,
    /// Stop reporting scans.
    Stop,
}

impl Directive {
    /// Directive that results in `enabled` scanning.
    pub const fn from_enabled(enabled: bool) -> Self {
        if enabled { Self::Start } else { Self::Stop }
    }

    /// Whether this directive enables scanning.
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Start)
    }

    /// Wire form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }

    /// Decode an `rfid/control` payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        let text = std::str::from_utf8(payload).map_err(|_| PayloadError::NotUtf8)?;
        match text.trim() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            other => Err(PayloadError::UnknownDirective { raw: other.to_string() }),
        }
    }

    /// Encode as an `rfid/control` payload.
    pub fn to_payload(self) -> Bytes {
        Bytes::from_static(self.as_str().as_bytes())
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side publisher of control directives.
pub struct ScanControl<B: Bus> {
    bus: Arc<B>,
    active: Arc<Mutex<usize>>,
}

impl<B: Bus> ScanControl<B> {
    /// Create a controller publishing on `bus`.
    pub fn new(bus: Arc<B>) -> Self {
        Self { bus, active: Arc::new(Mutex::new(0)) }
    }

    /// Open a scan window for one waiting request.
    ///
    /// Starts the reader if no other window is open. The count lock is held
    /// across the publish so start and stop leave in transition order.
    pub async fn begin_scan(&self) {
        let mut active = self.active.lock().await;
        *active += 1;
        if *active == 1 {
            self.set_scanning(true).await;
        }
    }

    /// Close a window opened by [`ScanControl::begin_scan`].
    ///
    /// Stops the reader once the last open window closes.
    pub async fn end_scan(&self) {
        let mut active = self.active.lock().await;
        let Some(remaining) = active.checked_sub(1) else {
            tracing::warn!("end_scan without an open scan window");
            return;
        };

        *active = remaining;
        if remaining == 0 {
            self.set_scanning(false).await;
        } else {
            tracing::debug!(remaining, "scan window closed, reader kept on");
        }
    }

    /// Ask the reader to start or stop reporting scans.
    ///
    /// No acknowledgment is awaited. A transient failure gets one reconnect
    /// and retry; anything else is logged and swallowed, and the pending
    /// request then times out on its own.
    pub async fn set_scanning(&self, enabled: bool) {
        let directive = Directive::from_enabled(enabled);

        let error = match self.send(directive).await {
            Ok(()) => return,
            Err(e) if e.is_transient() => e,
            Err(e) => {
                tracing::warn!(%directive, error = %e, "failed to send control directive");
                return;
            },
        };

        tracing::warn!(%directive, error = %error, "control publish failed, reconnecting");
        if let Err(e) = self.bus.reconnect().await {
            tracing::warn!(error = %e, "reconnect failed");
        }

        if let Err(e) = self.send(directive).await {
            tracing::warn!(%directive, error = %e, "failed to send control directive");
        }
    }

    async fn send(&self, directive: Directive) -> Result<(), BusError> {
        self.bus.publish(CONTROL_TOPIC, directive.to_payload(), QoS::AtLeastOnce).await?;
        tracing::debug!(%directive, "control directive sent");
        Ok(())
    }
}

impl<B: Bus> Clone for ScanControl<B> {
    fn clone(&self) -> Self {
        Self { bus: Arc::clone(&self.bus), active: Arc::clone(&self.active) }
    }
}

impl<B: Bus> fmt::Debug for ScanControl<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanControl").finish_non_exhaustive()
    }
}
