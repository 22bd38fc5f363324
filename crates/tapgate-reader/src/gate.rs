//! Reader-side control state.
//!
//! A single "scanning enabled" flag, written by the control-message handler
//! and read by the poll loop once per iteration. Last directive wins.

use std::sync::atomic::{AtomicBool, Ordering};

use tapgate_core::Directive;

/// Whether the reader should report scans.
#[derive(Debug, Default)]
pub struct ControlState {
    enabled: AtomicBool,
}

impl ControlState {
    /// Create the flag with an initial value.
    pub fn new(enabled: bool) -> Self {
        Self { enabled: AtomicBool::new(enabled) }
    }

    /// Current value.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Overwrite the flag from a directive.
    ///
    /// Returns true if this call turned scanning on (disabled → enabled).
    pub fn apply(&self, directive: Directive) -> bool {
        let was_enabled = self.enabled.swap(directive.is_enabled(), Ordering::AcqRel);
        directive.is_enabled() && !was_enabled
    }
}
