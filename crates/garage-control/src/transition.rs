//! Transition records and bounded history shared by the state machines.

use garage_core::constants::MAX_HISTORY_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// A single state transition with timestamp.
///
/// The `timestamp` field is not serialized as `Instant` is process-specific.
/// When deserializing, the timestamp will be set to the current time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition<S> {
    /// The state transitioned from.
    pub from: S,

    /// The state transitioned to.
    pub to: S,

    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl<S> StateTransition<S> {
    pub fn new(from: S, to: S) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    /// Time since this transition occurred.
    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Most recent transitions, oldest first, capped at [`MAX_HISTORY_SIZE`].
#[derive(Debug, Clone)]
pub struct History<S> {
    entries: VecDeque<StateTransition<S>>,
}

impl<S: Clone> History<S> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn push(&mut self, transition: StateTransition<S>) {
        self.entries.push_back(transition);
        if self.entries.len() > MAX_HISTORY_SIZE {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> &VecDeque<StateTransition<S>> {
        &self.entries
    }

    /// The last `count` transitions, oldest first.
    pub fn last(&self, count: usize) -> Vec<StateTransition<S>> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Clone> Default for History<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let mut history = History::new();
        for i in 0..(MAX_HISTORY_SIZE + 10) {
            history.push(StateTransition::new(i, i + 1));
        }
        assert_eq!(history.len(), MAX_HISTORY_SIZE);
        assert_eq!(history.entries().front().unwrap().from, 10);
    }

    #[test]
    fn test_last_returns_most_recent_in_order() {
        let mut history = History::new();
        for i in 0..5u8 {
            history.push(StateTransition::new(i, i + 1));
        }
        let last: Vec<u8> = history.last(2).iter().map(|t| t.from).collect();
        assert_eq!(last, vec![3, 4]);
        assert_eq!(history.last(10).len(), 5);
    }

    #[test]
    fn test_timestamp_not_serialized() {
        let transition = StateTransition::new("closed", "opening");
        let json = serde_json::to_value(&transition).unwrap();
        assert!(json.get("timestamp").is_none());
        assert_eq!(json["to"], "opening");
    }
}
