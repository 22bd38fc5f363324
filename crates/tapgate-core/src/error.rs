//! Wire payload errors shared by both sides of the bus.

use thiserror::Error;

/// A bus payload that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Payload bytes are not UTF-8.
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    /// Scan payload is not an unsigned decimal card identifier.
    #[error("invalid card identifier: {raw:?}")]
    InvalidCard {
        /// The offending payload text.
        raw: String,
    },

    /// Control payload is neither `start` nor `stop`.
    #[error("unknown control directive: {raw:?}")]
    UnknownDirective {
        /// The offending payload text.
        raw: String,
    },
}
