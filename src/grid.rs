//! Grid collaborator
//!
//! The looper never owns the performance grid. It reads loop length,
//! targets, shape and transport position through [`LoopGrid`], and receives
//! live events, loop-length changes and swing changes as an ordered stream
//! of [`GridNotification`]s.
//!
//! [`ArrayGrid`] reshapes a flat per-target array into rows and columns for
//! transforms. [`MemoryGrid`] is a self-contained grid used by the CLI and
//! by tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::error::{LoopGridError, Result};
use crate::loops::{Position, TargetId};

/// Grid dimensions in rows and columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// A single row wide enough for `len` targets
    pub fn row(len: usize) -> Self {
        Self::new(1, len)
    }

    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }
}

/// Flat data viewed as a row-major 2-D grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayGrid<T> {
    pub data: Vec<T>,
    shape: GridShape,
}

impl<T> ArrayGrid<T> {
    pub fn new(data: Vec<T>, shape: GridShape) -> Self {
        Self { data, shape }
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Flat index of a cell, `None` when outside the shape.
    pub fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.shape.rows && col < self.shape.cols).then(|| row * self.shape.cols + col)
    }

    /// Row and column of a flat index.
    pub fn coords(&self, index: usize) -> (usize, usize) {
        let cols = self.shape.cols.max(1);
        (index / cols, index % cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        self.index(row, col).and_then(|i| self.data.get(i))
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        self.index(row, col).and_then(move |i| self.data.get_mut(i))
    }

    /// Replace a cell, returning false when it is out of range.
    pub fn set(&mut self, row: usize, col: usize, value: T) -> bool {
        match self.get_mut(row, col) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ArrayGrid<U> {
        ArrayGrid {
            data: self.data.into_iter().map(f).collect(),
            shape: self.shape,
        }
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }
}

impl<T: Default> ArrayGrid<T> {
    /// Every cell of `shape` filled with the default value
    pub fn filled(shape: GridShape) -> Self {
        Self {
            data: std::iter::repeat_with(T::default).take(shape.cells()).collect(),
            shape,
        }
    }
}

/// Whether a grid event opens or closes a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    Stop,
}

/// A raw output event observed on the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridEvent {
    pub id: TargetId,
    pub position: Position,
    pub event: EventKind,
}

impl GridEvent {
    pub fn new(id: impl Into<TargetId>, position: Position, event: EventKind) -> Self {
        Self {
            id: id.into(),
            position,
            event,
        }
    }

    pub fn is_start(&self) -> bool {
        self.event == EventKind::Start
    }
}

/// Upstream changes delivered to subscribers, in the order they happened
#[derive(Debug, Clone, PartialEq)]
pub enum GridNotification {
    Event(GridEvent),
    LoopLength(f64),
    Swing(f64),
}

/// Transport position source
pub trait Clock {
    fn current_position(&self) -> Position;
}

/// The performance grid as seen by the looper.
pub trait LoopGrid: Clock {
    /// Grid-wide nominal loop length, if one is set.
    fn loop_length(&self) -> Option<f64>;

    fn set_loop_length(&self, length: f64);

    /// Addressable channels in slot order.
    fn targets(&self) -> Vec<TargetId>;

    fn shape(&self) -> GridShape;

    /// Current swing amount. Grids without swing report zero.
    fn swing(&self) -> f64 {
        0.0
    }

    /// Open a new notification stream. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> Receiver<GridNotification>;
}

#[derive(Debug, Default)]
struct MemoryGridState {
    loop_length: Option<f64>,
    swing: f64,
    position: Position,
    subscribers: Vec<Sender<GridNotification>>,
}

/// Self-contained grid with a manually driven clock.
#[derive(Debug)]
pub struct MemoryGrid {
    targets: Vec<TargetId>,
    shape: GridShape,
    state: Mutex<MemoryGridState>,
}

impl MemoryGrid {
    /// A single-row grid over `targets`
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TargetId>,
    {
        let targets: Vec<TargetId> = targets.into_iter().map(Into::into).collect();
        let shape = GridShape::row(targets.len());
        Self {
            targets,
            shape,
            state: Mutex::new(MemoryGridState::default()),
        }
    }

    /// A grid with explicit dimensions, which must hold every target.
    pub fn with_shape<I, S>(targets: I, shape: GridShape) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<TargetId>,
    {
        let mut grid = Self::new(targets);
        if shape.cells() < grid.targets.len() {
            return Err(LoopGridError::InvalidShape {
                rows: shape.rows,
                cols: shape.cols,
                targets: grid.targets.len(),
            });
        }
        grid.shape = shape;
        Ok(grid)
    }

    fn state(&self) -> MutexGuard<'_, MemoryGridState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(state: &mut MemoryGridState, notification: GridNotification) {
        state
            .subscribers
            .retain(|tx| tx.send(notification.clone()).is_ok());
    }

    /// Move the transport
    pub fn set_position(&self, position: Position) {
        self.state().position = position;
    }

    pub fn set_swing(&self, amount: f64) {
        let mut state = self.state();
        state.swing = amount;
        Self::notify(&mut state, GridNotification::Swing(amount));
    }

    /// Emit a live event and advance the transport to it.
    pub fn emit(&self, event: GridEvent) {
        let mut state = self.state();
        state.position = state.position.max(event.position);
        Self::notify(&mut state, GridNotification::Event(event));
    }

    /// Number of subscriptions still open as of the last notification.
    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }
}

impl Clock for MemoryGrid {
    fn current_position(&self) -> Position {
        self.state().position
    }
}

impl LoopGrid for MemoryGrid {
    fn loop_length(&self) -> Option<f64> {
        self.state().loop_length
    }

    fn set_loop_length(&self, length: f64) {
        let mut state = self.state();
        state.loop_length = Some(length);
        Self::notify(&mut state, GridNotification::LoopLength(length));
    }

    fn targets(&self) -> Vec<TargetId> {
        self.targets.clone()
    }

    fn shape(&self) -> GridShape {
        self.shape
    }

    fn swing(&self) -> f64 {
        self.state().swing
    }

    fn subscribe(&self) -> Receiver<GridNotification> {
        let (tx, rx) = unbounded();
        self.state().subscribers.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_array_grid_indexing() {
        let mut grid = ArrayGrid::new(vec![0, 1, 2, 3, 4, 5], GridShape::new(2, 3));

        assert_eq!(grid.get(0, 2), Some(&2));
        assert_eq!(grid.get(1, 0), Some(&3));
        assert_eq!(grid.get(2, 0), None);
        assert_eq!(grid.get(0, 3), None);
        assert_eq!(grid.coords(4), (1, 1));

        assert!(grid.set(1, 2, 50));
        assert!(!grid.set(5, 5, 0));
        assert_eq!(grid.into_data(), vec![0, 1, 2, 3, 4, 50]);
    }

    #[test]
    fn test_array_grid_filled_and_map() {
        let grid: ArrayGrid<Option<u8>> = ArrayGrid::filled(GridShape::new(2, 2));
        assert_eq!(grid.data.len(), 4);

        let mapped = grid.map(|cell| cell.is_none());
        assert_eq!(mapped.shape(), GridShape::new(2, 2));
        assert!(mapped.data.iter().all(|&empty| empty));
    }

    #[test]
    fn test_memory_grid_notifies_in_order() {
        let grid = MemoryGrid::new(["kick", "snare"]);
        let rx = grid.subscribe();

        grid.emit(GridEvent::new("kick", 1.0, EventKind::Start));
        grid.set_loop_length(4.0);
        grid.set_swing(0.5);

        let received: Vec<GridNotification> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                GridNotification::Event(GridEvent::new("kick", 1.0, EventKind::Start)),
                GridNotification::LoopLength(4.0),
                GridNotification::Swing(0.5),
            ]
        );
        assert_eq!(grid.current_position(), 1.0);
        assert_eq!(grid.loop_length(), Some(4.0));
    }

    #[test]
    fn test_memory_grid_drops_closed_subscribers() {
        let grid = MemoryGrid::new(["kick"]);
        let rx = grid.subscribe();
        assert_eq!(grid.subscriber_count(), 1);

        drop(rx);
        grid.set_swing(0.0);
        assert_eq!(grid.subscriber_count(), 0);
    }

    #[test]
    fn test_memory_grid_shape_must_fit_targets() {
        let err = MemoryGrid::with_shape(["a", "b", "c"], GridShape::new(1, 2)).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SHAPE");

        let grid = MemoryGrid::with_shape(["a", "b", "c"], GridShape::new(2, 2)).unwrap();
        assert_eq!(grid.shape().cells(), 4);
        assert_eq!(grid.swing(), 0.0);
    }
}
