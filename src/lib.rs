//! Loopgrid - Loop construction engine for a live step sequencer
//!
//! Loopgrid records a live performance, turns any window of it into a
//! quantized loop per target, and derives new loops through a chain of
//! transforms.
//!
//! # Architecture
//!
//! - Recording: grid events are unswung and appended to an event log
//! - Store: a window of the log becomes the base loop set
//! - Transforms: a priority-ordered pipeline derives a new loop set
//! - Output: the transformed set is swung for playback
//!
//! Every committed base can be undone and redone.

pub mod cli;
pub mod config;
pub mod error;
pub mod grid;
pub mod history;
pub mod looper;
pub mod loops;
pub mod quantize;
pub mod recorder;
pub mod signal;
pub mod transform;
pub mod transforms;

pub use config::LooperConfig;
pub use error::{LoopGridError, Result};
pub use grid::{ArrayGrid, EventKind, GridEvent, GridShape, LoopGrid, MemoryGrid};
pub use history::Snapshot;
pub use looper::Looper;
pub use loops::{Event, Loop, LoopSet};
pub use recorder::{EventLog, LoopRecorder};
pub use transform::{LoopGridData, Priority, Transform, TransformRelease, Transforms};
