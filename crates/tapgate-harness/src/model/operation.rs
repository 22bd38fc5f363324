//! Operations for model-based testing.
//!
//! Operations are generated randomly by proptest (or decoded from fuzz input)
//! and applied to both the model and the real mailbox.

use arbitrary::Arbitrary;
use tapgate_core::CardId;

/// Card identifier in the model (u8 keeps collisions frequent).
pub type ModelCard = u8;

/// Operations that can be applied to a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// A scan of `card` arrives.
    Insert {
        /// Card scanned.
        card: ModelCard,
    },

    /// Advance simulation time.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },

    /// Claim the oldest live scan of `card`, or of any card when `None`.
    Take {
        /// Card wanted.
        card: Option<ModelCard>,
    },

    /// Count live scans.
    Count,
}

impl Operation {
    /// Predicate a `Take` hands to the mailbox.
    pub fn wants(card: Option<ModelCard>) -> impl Fn(CardId) -> bool + Send + Sync {
        move |candidate| card.is_none_or(|wanted| candidate == to_card(wanted))
    }
}

/// Map a model card to a real one.
pub fn to_card(card: ModelCard) -> CardId {
    CardId::new(u128::from(card))
}

/// Observable result of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// Insert or time advance completed.
    Ok,
    /// Card claimed by a `Take`, if any.
    Taken(Option<ModelCard>),
    /// Live scans counted.
    Count(usize),
}
