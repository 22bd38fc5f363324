//! Card identifiers and scan events.
//!
//! A [`CardId`] travels on `rfid/scan` as its decimal string form. Readers
//! derive it from the raw tag UID by reading the UID bytes as an unsigned
//! little-endian integer.

use std::{fmt, str::FromStr, time::Instant};

use bytes::Bytes;

use crate::error::PayloadError;

/// Longest tag UID that still fits in a [`CardId`].
pub const MAX_UID_LEN: usize = 16;

/// Opaque card identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CardId(u128);

impl CardId {
    /// Wrap a raw numeric identifier.
    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// The numeric value.
    pub const fn get(self) -> u128 {
        self.0
    }

    /// Build an identifier from a tag UID, read as little-endian.
    ///
    /// Returns `None` for an empty UID or one longer than [`MAX_UID_LEN`].
    pub fn from_uid(uid: &[u8]) -> Option<Self> {
        if uid.is_empty() || uid.len() > MAX_UID_LEN {
            return None;
        }

        let mut buf = [0u8; MAX_UID_LEN];
        buf[..uid.len()].copy_from_slice(uid);
        Some(Self(u128::from_le_bytes(buf)))
    }

    /// Decode an `rfid/scan` payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        let text = std::str::from_utf8(payload).map_err(|_| PayloadError::NotUtf8)?;
        text.parse()
    }

    /// Encode as an `rfid/scan` payload.
    pub fn to_payload(self) -> Bytes {
        Bytes::from(self.0.to_string())
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CardId {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        // u128::from_str accepts a leading '+', the wire format does not
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PayloadError::InvalidCard { raw: s.to_string() });
        }

        digits.parse::<u128>().map(Self).map_err(|_| PayloadError::InvalidCard { raw: s.to_string() })
    }
}

impl From<u128> for CardId {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

/// One observation of a card, as held by the mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanEvent {
    card: CardId,
    observed_at: Instant,
}

impl ScanEvent {
    /// Create an event observed at `observed_at`.
    pub const fn new(card: CardId, observed_at: Instant) -> Self {
        Self { card, observed_at }
    }

    /// The scanned card.
    pub const fn card(&self) -> CardId {
        self.card
    }

    /// When the server observed the scan.
    pub const fn observed_at(&self) -> Instant {
        self.observed_at
    }
}
