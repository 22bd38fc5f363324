//! Tap debouncing.
//!
//! A card resting on the antenna is read dozens of times per second. The
//! debouncer accepts a read when the card differs from the last accepted one
//! or the window since the last acceptance has elapsed; everything else is
//! suppressed. A deliberate re-tap of the same card inside the window is
//! suppressed too.

use std::time::{Duration, Instant};

use tapgate_core::CardId;

/// Last accepted read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Accepted {
    card: CardId,
    at: Instant,
}

/// Debounce state for one reader.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: Option<Accepted>,
}

impl Debouncer {
    /// Create a debouncer with an empty history.
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Decide whether a read of `card` at `now` should be reported.
    ///
    /// State only changes when the read is accepted.
    pub fn observe(&mut self, card: CardId, now: Instant) -> bool {
        let accept = match self.last {
            None => true,
            Some(last) => {
                last.card != card || now.saturating_duration_since(last.at) >= self.window
            },
        };

        if accept {
            self.last = Some(Accepted { card, at: now });
        }

        accept
    }

    /// Forget the last accepted read.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
