//! Transform Pipeline
//!
//! Transforms are applied in priority order (index 0 first):
//! 1. `Normal` transforms, in the order they were registered
//! 2. `Top` transforms, in the order they were registered
//!
//! Each transform receives the previous stage's output as a grid-shaped
//! set of loops and returns a new one. The chain is shared between the
//! looper and the release handles, so registering or releasing a transform
//! marks the pipeline stale without touching the looper directly.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use crate::grid::{ArrayGrid, GridShape};
use crate::loops::{Loop, LoopSet};
use crate::signal::{Source, Version};

/// Loops laid out on the grid, as seen by a transform
pub type LoopGridData = ArrayGrid<Option<Loop>>;

/// A pure stage of the pipeline.
///
/// Returning `None` means "no events". Any extra parameters are captured
/// by the implementor when it is built.
pub trait Transform: Send + Sync {
    fn apply(&self, input: LoopGridData) -> Option<LoopGridData>;

    /// Short label used in logs
    fn name(&self) -> &str {
        "transform"
    }
}

impl<F> Transform for F
where
    F: Fn(LoopGridData) -> Option<LoopGridData> + Send + Sync,
{
    fn apply(&self, input: LoopGridData) -> Option<LoopGridData> {
        self(input)
    }
}

/// Pipeline tier of a transform
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal = 0,
    /// Applied after every `Normal` transform
    Top = 1,
}

/// Identity of one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformId(Uuid);

impl TransformId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TransformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered transform
#[derive(Clone)]
pub struct TransformEntry {
    pub id: TransformId,
    pub priority: Priority,
    pub transform: Arc<dyn Transform>,
}

impl fmt::Debug for TransformEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformEntry")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("name", &self.transform.name())
            .finish()
    }
}

/// Registered transforms in insertion order
#[derive(Debug, Clone, Default)]
pub struct TransformChain {
    entries: Vec<TransformEntry>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, priority: Priority, transform: Arc<dyn Transform>) -> TransformId {
        let id = TransformId::new();
        self.entries.push(TransformEntry {
            id,
            priority,
            transform,
        });
        id
    }

    /// Remove a registration by identity
    pub fn remove(&mut self, id: TransformId) -> Option<TransformEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn contains(&self, id: TransformId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in application order. The sort is stable, so insertion order
    /// holds within a tier.
    pub fn ordered(&self) -> Vec<TransformEntry> {
        let mut ordered = self.entries.clone();
        ordered.sort_by_key(|e| e.priority);
        ordered
    }
}

type SharedChain = Arc<Mutex<Source<TransformChain>>>;

fn lock(chain: &Mutex<Source<TransformChain>>) -> MutexGuard<'_, Source<TransformChain>> {
    chain.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared, versioned handle on the active transform chain.
///
/// Cloning the handle shares the chain. Every mutation bumps the version the
/// looper uses to decide whether the pipeline output is stale.
#[derive(Debug, Clone)]
pub struct Transforms {
    chain: SharedChain,
}

impl Transforms {
    pub fn new() -> Self {
        Self {
            chain: Arc::new(Mutex::new(Source::new(TransformChain::new()))),
        }
    }

    /// Register a transform at the end of its priority tier.
    pub fn push(&self, priority: Priority, transform: Arc<dyn Transform>) -> TransformRelease {
        let mut chain = lock(&self.chain);
        let id = chain.update(|c| c.push(priority, transform));
        trace!(%id, ?priority, count = chain.get().len(), "transform registered");
        TransformRelease {
            id,
            chain: Arc::downgrade(&self.chain),
        }
    }

    /// Remove one registration. Unknown ids are ignored.
    pub fn remove(&self, id: TransformId) -> bool {
        remove_from(&self.chain, id)
    }

    /// Drop every registration
    pub fn clear(&self) {
        let mut chain = lock(&self.chain);
        if !chain.get().is_empty() {
            chain.update(TransformChain::clear);
        }
    }

    pub fn contains(&self, id: TransformId) -> bool {
        lock(&self.chain).get().contains(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.chain).get().len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.chain).get().is_empty()
    }

    pub fn version(&self) -> Version {
        lock(&self.chain).version()
    }

    /// Priorities in application order
    pub fn priorities(&self) -> Vec<Priority> {
        self.ordered().iter().map(|e| e.priority).collect()
    }

    /// Entries in application order, cloned out of the lock.
    pub fn ordered(&self) -> Vec<TransformEntry> {
        lock(&self.chain).get().ordered()
    }

    /// Version and ordered entries read under one lock.
    pub fn snapshot(&self) -> (Version, Vec<TransformEntry>) {
        let chain = lock(&self.chain);
        (chain.version(), chain.get().ordered())
    }
}

impl Default for Transforms {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_from(chain: &Mutex<Source<TransformChain>>, id: TransformId) -> bool {
    let mut chain = lock(chain);
    if !chain.get().contains(id) {
        return false;
    }
    chain.update(|c| c.remove(id));
    trace!(%id, count = chain.get().len(), "transform released");
    true
}

/// Handle returned on registration that removes exactly that transform.
#[derive(Debug, Clone)]
#[must_use = "the transform stays registered until release() is called"]
pub struct TransformRelease {
    id: TransformId,
    chain: Weak<Mutex<Source<TransformChain>>>,
}

impl TransformRelease {
    pub fn id(&self) -> TransformId {
        self.id
    }

    /// Remove the transform. Later calls do nothing.
    pub fn release(&self) {
        if let Some(chain) = self.chain.upgrade() {
            remove_from(&chain, self.id);
        }
    }
}

/// Fold `base` through `entries`.
///
/// With no entries the base is handed back as-is, keeping its identity.
/// Otherwise each stage receives owned clones laid out in `shape`; a stage
/// returning `None` hands the next one an empty grid.
pub fn run_pipeline(
    base: &Arc<LoopSet>,
    shape: GridShape,
    entries: &[TransformEntry],
) -> Arc<LoopSet> {
    if entries.is_empty() {
        return Arc::clone(base);
    }

    let width = base.len();
    let input = ArrayGrid::new(base.loops().to_vec(), shape);
    let result = entries.iter().fold(Some(input), |acc, entry| {
        let input = acc.unwrap_or_else(|| ArrayGrid::new(vec![None; width], shape));
        trace!(name = entry.transform.name(), priority = ?entry.priority, "applying transform");
        entry.transform.apply(input)
    });

    Arc::new(result.map(|grid| LoopSet::new(grid.into_data())).unwrap_or_default())
}
