//! Model mailbox.

use std::collections::VecDeque;

use super::operation::{ModelCard, Operation, OperationResult};

/// Reference mailbox: a list of `(card, inserted_at_ms)` in arrival order.
#[derive(Debug, Clone)]
pub struct ModelMailbox {
    ttl_ms: u64,
    capacity: usize,
    now_ms: u64,
    entries: VecDeque<(ModelCard, u64)>,
}

impl ModelMailbox {
    /// Create an empty model.
    pub fn new(ttl_ms: u64, capacity: usize) -> Self {
        Self { ttl_ms, capacity: capacity.max(1), now_ms: 0, entries: VecDeque::new() }
    }

    /// Apply an operation and return its observable result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::Insert { card } => {
                self.expire();
                if self.entries.len() >= self.capacity {
                    self.entries.pop_front();
                }
                self.entries.push_back((card, self.now_ms));
                OperationResult::Ok
            },
            Operation::AdvanceTime { millis } => {
                self.now_ms += u64::from(millis);
                OperationResult::Ok
            },
            Operation::Take { card } => {
                self.expire();
                let index = self
                    .entries
                    .iter()
                    .position(|&(candidate, _)| card.is_none_or(|wanted| wanted == candidate));
                OperationResult::Taken(
                    index.and_then(|i| self.entries.remove(i)).map(|(card, _)| card),
                )
            },
            Operation::Count => {
                self.expire();
                OperationResult::Count(self.entries.len())
            },
        }
    }

    /// Live cards, oldest first.
    pub fn cards(&self) -> Vec<ModelCard> {
        self.entries
            .iter()
            .filter(|&&(_, at)| self.now_ms - at <= self.ttl_ms)
            .map(|&(card, _)| card)
            .collect()
    }

    /// Milliseconds since the model was created.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn expire(&mut self) {
        let (now, ttl) = (self.now_ms, self.ttl_ms);
        self.entries.retain(|&(_, at)| now - at <= ttl);
    }
}
