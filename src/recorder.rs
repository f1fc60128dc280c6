//! Event Recorder
//!
//! Append-only log of `(target, position, start)` triples with half-open
//! range queries and truncation. The looper only talks to the [`EventLog`]
//! trait; [`LoopRecorder`] is the in-memory default.

use std::collections::HashMap;

use tracing::trace;

use crate::loops::{Event, Position};

/// Storage seam for recorded performance events.
pub trait EventLog {
    /// Append an event for `target`.
    fn record(&mut self, target: &str, position: Position, start: bool);

    /// Events for `target` with `from <= position < to`, in insertion order.
    fn get_range(&self, target: &str, from: Position, to: Position) -> Vec<Event>;

    /// Drop every event positioned before `before`.
    fn truncate(&mut self, before: Position);
}

/// In-memory recorder keeping one insertion-ordered log per target.
#[derive(Debug, Clone, Default)]
pub struct LoopRecorder {
    logs: HashMap<String, Vec<Event>>,
}

impl LoopRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events held across all targets.
    pub fn len(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.values().all(Vec::is_empty)
    }
}

impl EventLog for LoopRecorder {
    fn record(&mut self, target: &str, position: Position, start: bool) {
        self.logs
            .entry(target.to_string())
            .or_default()
            .push(Event::new(position, start));
    }

    fn get_range(&self, target: &str, from: Position, to: Position) -> Vec<Event> {
        self.logs
            .get(target)
            .map(|log| {
                log.iter()
                    .filter(|e| e.position >= from && e.position < to)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn truncate(&mut self, before: Position) {
        let held = self.len();
        for log in self.logs.values_mut() {
            log.retain(|e| e.position >= before);
        }
        self.logs.retain(|_, log| !log.is_empty());
        trace!(before, dropped = held - self.len(), "truncated event log");
    }
}
