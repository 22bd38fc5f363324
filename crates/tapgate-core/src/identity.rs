//! Identity store seam.
//!
//! The rendezvous core only consults the store after a card has been
//! obtained. [`MemoryIdentityStore`] is the in-memory implementation; a
//! database-backed one plugs in behind the same trait.
//!
//! # Invariants
//!
//! - A card maps to at most one username and a username to at most one card.
//! - A rejected insert leaves the store unchanged.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;

use crate::card::CardId;

/// Errors from identity store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The card is already registered.
    #[error("card {card} is already registered")]
    DuplicateCard {
        /// The card that was already mapped.
        card: CardId,
    },

    /// The username already has a card.
    #[error("username {username:?} is already registered")]
    DuplicateUsername {
        /// The username that was already mapped.
        username: String,
    },

    /// The backing store could not be reached.
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

impl IdentityError {
    /// Returns true for uniqueness violations the caller can resolve by
    /// choosing another card or username.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateCard { .. } | Self::DuplicateUsername { .. })
    }
}

/// One recorded authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// Card presented.
    pub card: CardId,
    /// Whether the attempt was granted.
    pub successful: bool,
}

/// Card → identity mapping, ban list and attempt log.
pub trait IdentityStore: Send + Sync + 'static {
    /// Username registered for `card`.
    fn username_for_card(&self, card: CardId) -> Result<Option<String>, IdentityError>;

    /// Card registered for `username`.
    fn card_for_username(&self, username: &str) -> Result<Option<CardId>, IdentityError>;

    /// Register `card` to `username`.
    fn insert_card_mapping(&self, card: CardId, username: &str) -> Result<(), IdentityError>;

    /// Whether `card` is banned.
    fn is_banned(&self, card: CardId) -> Result<bool, IdentityError>;

    /// Ban `card`. Banning twice is a no-op.
    fn ban(&self, card: CardId) -> Result<(), IdentityError>;

    /// Append to the attempt log.
    fn record_attempt(&self, card: CardId, successful: bool) -> Result<(), IdentityError>;
}

/// In-memory identity store.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    by_card: HashMap<CardId, String>,
    by_username: HashMap<String, CardId>,
    banned: HashSet<CardId>,
    attempts: Vec<Attempt>,
}

impl MemoryIdentityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the attempt log, oldest first.
    pub fn attempts(&self) -> Vec<Attempt> {
        self.lock().attempts.clone()
    }

    /// Number of registered cards.
    pub fn card_count(&self) -> usize {
        self.lock().by_card.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn username_for_card(&self, card: CardId) -> Result<Option<String>, IdentityError> {
        Ok(self.lock().by_card.get(&card).cloned())
    }

    fn card_for_username(&self, username: &str) -> Result<Option<CardId>, IdentityError> {
        Ok(self.lock().by_username.get(username).copied())
    }

    fn insert_card_mapping(&self, card: CardId, username: &str) -> Result<(), IdentityError> {
        let mut inner = self.lock();

        if inner.by_card.contains_key(&card) {
            return Err(IdentityError::DuplicateCard { card });
        }
        if inner.by_username.contains_key(username) {
            return Err(IdentityError::DuplicateUsername { username: username.to_string() });
        }

        inner.by_card.insert(card, username.to_string());
        inner.by_username.insert(username.to_string(), card);
        Ok(())
    }

    fn is_banned(&self, card: CardId) -> Result<bool, IdentityError> {
        Ok(self.lock().banned.contains(&card))
    }

    fn ban(&self, card: CardId) -> Result<(), IdentityError> {
        self.lock().banned.insert(card);
        Ok(())
    }

    fn record_attempt(&self, card: CardId, successful: bool) -> Result<(), IdentityError> {
        self.lock().attempts.push(Attempt { card, successful });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_visible_both_ways() {
        let store = MemoryIdentityStore::new();
        store.insert_card_mapping(CardId::new(1), "ada").unwrap();

        assert_eq!(store.username_for_card(CardId::new(1)).unwrap().as_deref(), Some("ada"));
        assert_eq!(store.card_for_username("ada").unwrap(), Some(CardId::new(1)));
        assert_eq!(store.card_for_username("bob").unwrap(), None);
    }

    #[test]
    fn duplicate_card_is_rejected_without_side_effects() {
        let store = MemoryIdentityStore::new();
        store.insert_card_mapping(CardId::new(1), "ada").unwrap();

        let err = store.insert_card_mapping(CardId::new(1), "bob").unwrap_err();
        assert_eq!(err, IdentityError::DuplicateCard { card: CardId::new(1) });
        assert!(err.is_duplicate());
        assert_eq!(store.card_for_username("bob").unwrap(), None);
        assert_eq!(store.card_count(), 1);
    }

    #[test]
    fn duplicate_username_is_rejected_without_side_effects() {
        let store = MemoryIdentityStore::new();
        store.insert_card_mapping(CardId::new(1), "ada").unwrap();

        let err = store.insert_card_mapping(CardId::new(2), "ada").unwrap_err();
        assert!(matches!(err, IdentityError::DuplicateUsername { .. }));
        assert_eq!(store.username_for_card(CardId::new(2)).unwrap(), None);
    }

    #[test]
    fn ban_is_idempotent() {
        let store = MemoryIdentityStore::new();
        assert!(!store.is_banned(CardId::new(9)).unwrap());

        store.ban(CardId::new(9)).unwrap();
        store.ban(CardId::new(9)).unwrap();
        assert!(store.is_banned(CardId::new(9)).unwrap());
    }

    #[test]
    fn attempts_are_logged_in_order() {
        let store = MemoryIdentityStore::new();
        store.record_attempt(CardId::new(1), false).unwrap();
        store.record_attempt(CardId::new(1), true).unwrap();

        assert_eq!(
            store.attempts(),
            vec![
                Attempt { card: CardId::new(1), successful: false },
                Attempt { card: CardId::new(1), successful: true },
            ]
        );
    }

    #[test]
    fn unavailable_is_not_a_duplicate() {
        assert!(!IdentityError::Unavailable("disk".to_string()).is_duplicate());
    }
}
