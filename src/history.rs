//! Undo/Redo history
//!
//! Every committed base loop set can be stepped back to. Entries are
//! immutable snapshots sharing their loops with the live base through
//! `Arc`, so moving between stacks never copies events.

use std::sync::Arc;

use crate::loops::LoopSet;

/// A loop set plus the grid-wide loop length attached when it was captured.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub loops: Arc<LoopSet>,
    pub loop_length: Option<f64>,
}

impl Snapshot {
    pub fn new(loops: Arc<LoopSet>, loop_length: Option<f64>) -> Self {
        Self { loops, loop_length }
    }

    /// Attached length when it is usable for restoring the grid
    pub fn restorable_length(&self) -> Option<f64> {
        self.loop_length.filter(|length| *length != 0.0)
    }
}

/// Undo and redo stacks.
///
/// Committing a new base pushes onto the undo stack only; the redo stack
/// is left as it was.
#[derive(Debug, Clone, Default)]
pub struct History {
    undos: Vec<Snapshot>,
    redos: Vec<Snapshot>,
    /// Maximum undo depth, unbounded when `None`
    max_undo_levels: Option<usize>,
}

impl History {
    pub fn new(max_undo_levels: Option<usize>) -> Self {
        Self {
            max_undo_levels,
            ..Self::default()
        }
    }

    /// Record the base being replaced by a freshly committed one.
    pub fn commit(&mut self, replaced: Snapshot) {
        self.push_undo(replaced);
    }

    /// Pop the previous base, parking `current` on the redo stack.
    pub fn undo(&mut self, current: &Snapshot) -> Option<Snapshot> {
        let previous = self.undos.pop()?;
        self.redos.push(current.clone());
        Some(previous)
    }

    /// Pop the next base, parking `current` on the undo stack.
    pub fn redo(&mut self, current: &Snapshot) -> Option<Snapshot> {
        let next = self.redos.pop()?;
        self.push_undo(current.clone());
        Some(next)
    }

    fn push_undo(&mut self, snapshot: Snapshot) {
        self.undos.push(snapshot);
        self.trim_history();
    }

    /// Drop the oldest undo entries beyond the configured depth.
    fn trim_history(&mut self) {
        if let Some(max) = self.max_undo_levels {
            if self.undos.len() > max {
                let excess = self.undos.len() - max;
                self.undos.drain(..excess);
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undos.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redos.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undos.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redos.len()
    }
}
