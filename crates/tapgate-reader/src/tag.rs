//! Tag reader seam.
//!
//! The physical RF driver is out of scope; the poll loop only needs "is there
//! a card in the field right now, and which one".

use std::time::{Duration, Instant};

use tapgate_core::{CardId, Environment};
use thiserror::Error;
use tokio::sync::mpsc::{Receiver, Sender, channel, error::TrySendError};

/// How long a presented card stays readable.
pub const DEFAULT_PRESENCE: Duration = Duration::from_millis(500);

/// Taps a [`ChannelTagReader`] holds before new ones are turned away.
pub const TAP_BACKLOG: usize = 16;

/// Source of tag reads, polled once per loop iteration.
pub trait TagReader: Send + 'static {
    /// Attempt one read.
    ///
    /// Returns `None` when no tag is in the field or the read failed; the loop
    /// treats both the same.
    fn poll_tag(&mut self) -> Option<CardId>;
}

/// Why a tap did not reach the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TapRejected {
    /// The reader has been dropped.
    #[error("tag reader is gone")]
    ReaderGone,
    /// Too many taps are waiting to be read.
    #[error("tap backlog is full")]
    Backlogged,
}

/// Reader fed from a channel, one read per presented card.
///
/// A tap is only readable for `presence` after it was made, the way a card
/// swiped past the antenna is only in the field for a moment. Taps that go
/// unread for longer, for instance while scanning is disabled, are dropped on
/// the next poll.
///
/// Stands in for hardware in the console binary and in tests.
pub struct ChannelTagReader<E: Environment> {
    env: E,
    presence: Duration,
    rx: Receiver<(CardId, Instant)>,
}

/// Handle for presenting cards to a [`ChannelTagReader`].
pub struct TagFeed<E: Environment> {
    env: E,
    tx: Sender<(CardId, Instant)>,
}

impl<E: Environment> ChannelTagReader<E> {
    /// Create a reader whose taps stay readable for `presence`, and the feed
    /// that drives it.
    pub fn new(env: E, presence: Duration) -> (TagFeed<E>, Self) {
        let (tx, rx) = channel(TAP_BACKLOG);
        (TagFeed { env: env.clone(), tx }, Self { env, presence, rx })
    }
}

impl<E: Environment> TagReader for ChannelTagReader<E> {
    fn poll_tag(&mut self) -> Option<CardId> {
        let now = self.env.now();

        while let Ok((card, at)) = self.rx.try_recv() {
            if now.saturating_duration_since(at) < self.presence {
                return Some(card);
            }
            tracing::trace!(card = %card, "tap left the field unread");
        }

        None
    }
}

impl<E: Environment> TagFeed<E> {
    /// Present `card` to the reader now.
    pub fn present(&self, card: CardId) -> Result<(), TapRejected> {
        self.tx.try_send((card, self.env.now())).map_err(|e| match e {
            TrySendError::Full(_) => TapRejected::Backlogged,
            TrySendError::Closed(_) => TapRejected::ReaderGone,
        })
    }
}

impl<E: Environment> Clone for TagFeed<E> {
    fn clone(&self) -> Self {
        Self { env: self.env.clone(), tx: self.tx.clone() }
    }
}

impl<E: Environment> std::fmt::Debug for ChannelTagReader<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelTagReader")
            .field("presence", &self.presence)
            .field("pending", &self.rx.len())
            .finish_non_exhaustive()
    }
}

impl<E: Environment> std::fmt::Debug for TagFeed<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagFeed").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use super::*;

    #[derive(Clone)]
    struct PausedEnv;

    impl Environment for PausedEnv {
        fn now(&self) -> Instant {
            tokio::time::Instant::now().into_std()
        }

        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
            tokio::time::sleep(duration)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn presented_cards_are_read_once_in_order() {
        let (feed, mut reader) = ChannelTagReader::new(PausedEnv, DEFAULT_PRESENCE);
        feed.present(CardId::new(1)).unwrap();
        feed.present(CardId::new(2)).unwrap();

        assert_eq!(reader.poll_tag(), Some(CardId::new(1)));
        assert_eq!(reader.poll_tag(), Some(CardId::new(2)));
        assert_eq!(reader.poll_tag(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn tap_expires_after_presence_window() {
        let (feed, mut reader) = ChannelTagReader::new(PausedEnv, DEFAULT_PRESENCE);
        feed.present(CardId::new(1)).unwrap();
        tokio::time::advance(DEFAULT_PRESENCE).await;
        feed.present(CardId::new(2)).unwrap();

        // The stale tap is skipped, the fresh one behind it is read
        assert_eq!(reader.poll_tag(), Some(CardId::new(2)));
        assert_eq!(reader.poll_tag(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn tap_inside_presence_window_is_read() {
        let (feed, mut reader) = ChannelTagReader::new(PausedEnv, DEFAULT_PRESENCE);
        feed.present(CardId::new(1)).unwrap();
        tokio::time::advance(DEFAULT_PRESENCE - Duration::from_millis(1)).await;

        assert_eq!(reader.poll_tag(), Some(CardId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn backlog_is_bounded() {
        let (feed, _reader) = ChannelTagReader::new(PausedEnv, DEFAULT_PRESENCE);
        for card in 0..TAP_BACKLOG {
            feed.present(CardId::new(u128::try_from(card).unwrap())).unwrap();
        }

        assert_eq!(feed.present(CardId::new(99)), Err(TapRejected::Backlogged));
    }

    #[tokio::test(start_paused = true)]
    async fn feed_reports_dropped_reader() {
        let (feed, reader) = ChannelTagReader::new(PausedEnv, DEFAULT_PRESENCE);
        drop(reader);
        assert_eq!(feed.present(CardId::new(1)), Err(TapRejected::ReaderGone));
    }
}
