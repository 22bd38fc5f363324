//! Scripted tag reader.
//!
//! Replays a timeline of cards resting on the antenna. Each [`Presence`] says
//! which card is in the field and for how long, measured from the moment the
//! reader was created. Every poll during a presence reads that card, so a
//! slow tap produces the burst of identical reads real hardware does.

use std::time::{Duration, Instant};

use tapgate_core::{CardId, Environment};
use tapgate_reader::TagReader;

/// One card in the field for a span of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presence {
    /// Card on the antenna.
    pub card: CardId,
    /// When it arrives, relative to reader creation.
    pub from: Duration,
    /// When it leaves (exclusive).
    pub until: Duration,
}

impl Presence {
    /// A card resting for `hold` starting at `from`.
    pub fn new(card: CardId, from: Duration, hold: Duration) -> Self {
        Self { card, from, until: from + hold }
    }

    fn covers(&self, offset: Duration) -> bool {
        self.from <= offset && offset < self.until
    }
}

/// Tag reader driven by a fixed timeline.
#[derive(Debug)]
pub struct ScriptedTagReader<E: Environment> {
    env: E,
    start: Instant,
    script: Vec<Presence>,
    polls: u64,
}

impl<E: Environment> ScriptedTagReader<E> {
    /// Start the timeline now.
    pub fn new(env: E, script: Vec<Presence>) -> Self {
        let start = env.now();
        Self { env, start, script, polls: 0 }
    }

    /// Times the reader has been polled.
    pub fn polls(&self) -> u64 {
        self.polls
    }
}

impl<E: Environment> TagReader for ScriptedTagReader<E> {
    fn poll_tag(&mut self) -> Option<CardId> {
        self.polls += 1;
        let offset = self.env.now().saturating_duration_since(self.start);
        self.script.iter().find(|presence| presence.covers(offset)).map(|presence| presence.card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimEnv;

    #[tokio::test(start_paused = true)]
    async fn reads_follow_the_timeline() {
        let card = CardId::new(3);
        let mut reader = ScriptedTagReader::new(
            SimEnv::new(),
            vec![Presence::new(card, Duration::from_secs(1), Duration::from_millis(500))],
        );

        assert_eq!(reader.poll_tag(), None);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(reader.poll_tag(), Some(card));

        tokio::time::advance(Duration::from_millis(499)).await;
        assert_eq!(reader.poll_tag(), Some(card));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(reader.poll_tag(), None);
        assert_eq!(reader.polls(), 4);
    }
}
