//! Loop data model
//!
//! A [`Loop`] is a finite, position-sorted list of [`Event`]s for one
//! target. A [`LoopSet`] holds one optional loop per target, in the order
//! the grid reports its targets.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Position in beats since an arbitrary epoch.
pub type Position = f64;

/// Identifier of an addressable channel on the grid.
pub type TargetId = String;

/// A single timed event inside a loop.
///
/// `start` is the payload: `true` for a note-on style trigger, `false`
/// for the matching release. Transforms carry it through untouched unless
/// they deliberately rewrite it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub position: Position,
    pub start: bool,
}

impl Event {
    pub fn new(position: Position, start: bool) -> Self {
        Self { position, start }
    }

    /// Create a start event
    pub fn start(position: Position) -> Self {
        Self::new(position, true)
    }

    /// Create a stop event
    pub fn stop(position: Position) -> Self {
        Self::new(position, false)
    }

    /// Same payload at a different position
    pub fn at(&self, position: Position) -> Self {
        Self { position, ..*self }
    }
}

/// Ascending position order, used wherever events are materialized.
pub fn by_position(a: &Event, b: &Event) -> Ordering {
    a.position.total_cmp(&b.position)
}

/// A quantized, finite-length event sequence for one target.
///
/// After normalization every event position lies in `[0, length)`.
/// A length of zero means "no loop".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Loop {
    pub events: Vec<Event>,
    pub length: f64,
}

impl Loop {
    pub fn new(events: Vec<Event>, length: f64) -> Self {
        Self { events, length }
    }

    /// True when the loop has a usable length.
    pub fn has_length(&self) -> bool {
        self.length > 0.0
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Wrap every position into `[0, length)` and re-sort.
    ///
    /// Loops without a length are left alone.
    pub fn normalize(&mut self) {
        if !self.has_length() {
            return;
        }
        let length = self.length;
        for event in &mut self.events {
            let wrapped = event.position.rem_euclid(length);
            // tiny negatives round up to `length` itself
            event.position = if wrapped >= length { 0.0 } else { wrapped };
        }
        self.events.sort_by(by_position);
    }

    /// Consuming variant of [`Loop::normalize`].
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

/// One optional loop per target.
///
/// Shared as `Arc<LoopSet>` between the base, history and published
/// output, so pointer identity tells consumers whether anything changed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoopSet {
    loops: Vec<Option<Loop>>,
}

impl LoopSet {
    pub fn new(loops: Vec<Option<Loop>>) -> Self {
        Self { loops }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Loop for the target at `index`, if that target has one.
    pub fn get(&self, index: usize) -> Option<&Loop> {
        self.loops.get(index).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Loop>> {
        self.loops.iter().map(Option::as_ref)
    }

    /// Number of targets that carry a loop.
    pub fn active_count(&self) -> usize {
        self.loops.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn loops(&self) -> &[Option<Loop>] {
        &self.loops
    }

    pub fn into_loops(self) -> Vec<Option<Loop>> {
        self.loops
    }
}

impl From<Vec<Option<Loop>>> for LoopSet {
    fn from(loops: Vec<Option<Loop>>) -> Self {
        Self::new(loops)
    }
}

impl FromIterator<Option<Loop>> for LoopSet {
    fn from_iter<I: IntoIterator<Item = Option<Loop>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_event_constructors() {
        assert!(Event::start(1.0).start);
        assert!(!Event::stop(1.0).start);
        assert_eq!(Event::stop(1.0).at(2.5), Event::stop(2.5));
    }

    #[test]
    fn test_normalize_wraps_and_sorts() {
        let looped = Loop::new(
            vec![Event::stop(5.5), Event::start(-0.5), Event::start(1.0)],
            4.0,
        )
        .normalized();

        assert_eq!(
            looped.events,
            vec![Event::start(1.0), Event::stop(1.5), Event::start(3.5)]
        );
    }

    #[test]
    fn test_normalize_keeps_tiny_negatives_in_range() {
        let looped = Loop::new(vec![Event::start(-1e-17), Event::stop(3.5)], 4.0).normalized();
        assert_eq!(looped.events, vec![Event::start(0.0), Event::stop(3.5)]);
        assert!(looped.events.iter().all(|e| e.position < looped.length));
    }

    #[test]
    fn test_normalize_skips_zero_length() {
        let looped = Loop::new(vec![Event::start(9.0)], 0.0).normalized();
        assert_eq!(looped.events, vec![Event::start(9.0)]);
        assert!(!looped.has_length());
    }

    #[test]
    fn test_loop_set_accessors() {
        let set: LoopSet = vec![None, Some(Loop::new(vec![Event::start(0.0)], 1.0)), None]
            .into_iter()
            .collect();

        assert_eq!(set.len(), 3);
        assert_eq!(set.active_count(), 1);
        assert!(set.get(0).is_none());
        assert_eq!(set.get(1).map(|l| l.length), Some(1.0));
        assert!(set.get(7).is_none());
    }
}
