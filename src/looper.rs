//! Looper
//!
//! Owns the current loop set and everything derived from it:
//!
//! ```text
//! grid events --unswing--> recorder --store()--> base ---+
//!                                                         +--> transformed --+
//!                                      transforms -------+                   +--> output
//!                                                               swing -------+
//! ```
//!
//! `transformed` is deferred: registering several transforms in one turn
//! costs a single pipeline run at the next flush. `output` is immediate: it
//! follows swing changes as soon as they are observed. Every read flushes,
//! so callers never see a half-updated pipeline.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, trace};

use crate::config::LooperConfig;
use crate::grid::{GridEvent, GridNotification, LoopGrid};
use crate::history::{History, Snapshot};
use crate::loops::{Loop, LoopSet, Position};
use crate::quantize::{swing_loop, swing_ratio, unswing_position, NEUTRAL_CENTER};
use crate::recorder::{EventLog, LoopRecorder};
use crate::signal::{Derived, Schedule, Source};
use crate::transform::{run_pipeline, Priority, Transform, TransformRelease, Transforms};

/// Loop construction engine bound to one grid.
pub struct Looper<G: LoopGrid + ?Sized, R: EventLog = LoopRecorder> {
    grid: Arc<G>,
    recorder: R,
    config: LooperConfig,

    base: Source<Snapshot>,
    transforms: Transforms,
    swing: Source<f64>,
    transformed: Derived<Arc<LoopSet>>,
    output: Derived<Arc<LoopSet>>,

    history: History,
    notifications: Option<Receiver<GridNotification>>,
    watchers: Vec<Sender<Arc<LoopSet>>>,
    last_truncate_at: Position,
}

impl<G: LoopGrid + ?Sized> Looper<G> {
    /// Create a looper with the default config and an in-memory recorder.
    pub fn new(grid: Arc<G>) -> Self {
        Self::with_config(grid, LooperConfig::default())
    }

    pub fn with_config(grid: Arc<G>, config: LooperConfig) -> Self {
        Self::with_recorder(grid, LoopRecorder::new(), config)
    }
}

impl<G: LoopGrid + ?Sized, R: EventLog> Looper<G, R> {
    pub fn with_recorder(grid: Arc<G>, recorder: R, config: LooperConfig) -> Self {
        let notifications = grid.subscribe();
        let swing = grid.swing();
        let empty = Arc::new(LoopSet::empty());

        let mut looper = Self {
            grid,
            recorder,
            history: History::new(config.max_undo_levels),
            config,
            base: Source::new(Snapshot::default()),
            transforms: Transforms::new(),
            swing: Source::new(swing),
            transformed: Derived::new(Arc::clone(&empty), Schedule::Deferred),
            output: Derived::new(empty, Schedule::Immediate),
            notifications: Some(notifications),
            watchers: Vec::new(),
            last_truncate_at: 0.0,
        };
        looper.flush();
        looper
    }

    // ========================================================================
    // Reactive graph
    // ========================================================================

    /// Drain upstream notifications and run every pending recomputation.
    pub fn tick(&mut self) {
        self.pump();
        self.flush();
    }

    /// Current published loop set: transformed, then swung.
    pub fn output(&mut self) -> Arc<LoopSet> {
        self.tick();
        Arc::clone(self.output.get())
    }

    /// Pipeline output before swing is applied.
    pub fn transformed(&mut self) -> Arc<LoopSet> {
        self.tick();
        Arc::clone(self.transformed.get())
    }

    /// The committed base together with its attached loop length.
    pub fn base(&mut self) -> Snapshot {
        self.pump();
        self.base.get().clone()
    }

    /// Receive every newly published output.
    pub fn watch(&mut self) -> Receiver<Arc<LoopSet>> {
        let (tx, rx) = unbounded();
        self.watchers.push(tx);
        rx
    }

    /// Number of times the transform pipeline has been evaluated
    pub fn pipeline_evaluations(&self) -> u64 {
        self.transformed.evaluations()
    }

    /// Swing amount currently applied to recording and output
    pub fn swing(&self) -> f64 {
        *self.swing.get()
    }

    fn pump(&mut self) {
        let pending: Vec<GridNotification> = match &self.notifications {
            Some(rx) => rx.try_iter().collect(),
            None => return,
        };

        for notification in pending {
            match notification {
                GridNotification::Event(event) => self.record(event),
                GridNotification::LoopLength(length) => {
                    self.base.get_mut_untracked().loop_length = Some(length);
                }
                GridNotification::Swing(amount) => {
                    if self.swing.set_if_changed(amount) {
                        trace!(amount, "swing changed");
                        self.settle(Schedule::Immediate);
                    }
                }
            }
        }
    }

    fn flush(&mut self) {
        self.settle(Schedule::Deferred);
        self.settle(Schedule::Immediate);
    }

    /// Refresh every node driven by `schedule`, upstream first.
    fn settle(&mut self, schedule: Schedule) {
        if self.transformed.schedule() == schedule {
            self.refresh_transformed();
        }
        if self.output.schedule() == schedule {
            self.refresh_output();
        }
    }

    fn refresh_transformed(&mut self) {
        let inputs = [self.base.version(), self.transforms.version()];
        if !self.transformed.is_stale(&inputs) {
            return;
        }

        let (version, entries) = self.transforms.snapshot();
        let inputs = [self.base.version(), version];
        let base = &self.base.get().loops;
        let shape = self.grid.shape();
        self.transformed
            .refresh(&inputs, || run_pipeline(base, shape, &entries));
        trace!(
            transforms = entries.len(),
            evaluations = self.transformed.evaluations(),
            "pipeline evaluated"
        );
    }

    fn refresh_output(&mut self) {
        let inputs = [self.transformed.version(), self.swing.version()];
        let previous = Arc::clone(self.output.get());
        let input = self.transformed.get();
        let amount = *self.swing.get();
        let config = &self.config;

        self.output
            .refresh(&inputs, || swing_loops(input, amount, config));

        let current = self.output.get();
        if !Arc::ptr_eq(&previous, current) {
            self.watchers.retain(|tx| tx.send(Arc::clone(current)).is_ok());
        }
    }

    // ========================================================================
    // Live recording
    // ========================================================================

    fn record(&mut self, event: GridEvent) {
        let amount = *self.swing.get();
        let position = if amount != 0.0 {
            unswing_position(event.position, swing_ratio(amount), self.config.swing_grid)
        } else {
            event.position
        };
        self.recorder.record(&event.id, position, event.is_start());
        trace!(target_id = %event.id, position, start = event.is_start(), "recorded event");

        if event.position - self.last_truncate_at > self.config.truncate_interval {
            self.last_truncate_at = event.position;
            let before = event.position - self.config.retention_window;
            self.recorder.truncate(before);
            debug!(before, "truncated recording");
        }
    }

    // ========================================================================
    // Store & history
    // ========================================================================

    /// Capture the last `length` beats before `position` as the new base.
    ///
    /// `length` falls back to the grid loop length, then to the configured
    /// default; `position` falls back to the transport position.
    pub fn store(&mut self, position: Option<Position>, length: Option<f64>) {
        self.pump();

        let grid_length = self.grid.loop_length();
        let length = length
            .filter(|l| *l > 0.0)
            .or(grid_length.filter(|l| *l > 0.0))
            .unwrap_or(self.config.default_loop_length);
        let position = position.unwrap_or_else(|| self.grid.current_position());
        let from = position - length;

        let loops: LoopSet = self
            .grid
            .targets()
            .iter()
            .map(|target| {
                let events = self.recorder.get_range(target, from, position);
                let looped = Loop::new(events, length).normalized();
                match looped.events.as_slice() {
                    [] => None,
                    [only] if !only.start => None,
                    _ => Some(looped),
                }
            })
            .collect();

        debug!(
            position,
            length,
            active = loops.active_count(),
            "stored loop set"
        );
        self.commit(Snapshot::new(Arc::new(loops), grid_length));
    }

    /// Bake the transform pipeline into the base and drop every transform.
    pub fn flatten(&mut self) {
        self.pump();
        self.refresh_transformed();

        let baked = Arc::clone(self.transformed.get());
        let loop_length = self.grid.loop_length();
        self.commit(Snapshot::new(baked, loop_length));
        self.transforms.clear();
        debug!("flattened transforms into base");
    }

    fn commit(&mut self, snapshot: Snapshot) {
        let replaced = self.base.set(snapshot);
        self.history.commit(replaced);
    }

    /// Step back to the previous base. Returns false when there is none.
    pub fn undo(&mut self) -> bool {
        self.pump();
        let Some(previous) = self.history.undo(self.base.get()) else {
            return false;
        };
        self.base.set(previous);
        self.restore_grid_length();
        debug!(undos = self.history.undo_count(), "undo");
        true
    }

    /// Step forward again. Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        self.pump();
        let Some(next) = self.history.redo(self.base.get()) else {
            return false;
        };
        self.base.set(next);
        self.restore_grid_length();
        debug!(redos = self.history.redo_count(), "redo");
        true
    }

    fn restore_grid_length(&self) {
        if let Some(length) = self.base.get().restorable_length() {
            self.grid.set_loop_length(length);
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_count(&self) -> usize {
        self.history.undo_count()
    }

    pub fn redo_count(&self) -> usize {
        self.history.redo_count()
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    /// Register a transform in the normal tier.
    pub fn transform(&self, transform: impl Transform + 'static) -> TransformRelease {
        self.transforms.push(Priority::Normal, Arc::new(transform))
    }

    /// Register a transform that runs after every normal one.
    pub fn transform_top(&self, transform: impl Transform + 'static) -> TransformRelease {
        self.transforms.push(Priority::Top, Arc::new(transform))
    }

    pub fn is_transforming(&self) -> bool {
        !self.transforms.is_empty()
    }

    /// Shared handle on the active transforms
    pub fn transforms(&self) -> &Transforms {
        &self.transforms
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Release the upstream subscription. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.notifications.take().is_some() {
            debug!("looper destroyed");
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.notifications.is_none()
    }
}

/// Swing every loop of `input`; a neutral swing keeps the input's identity.
fn swing_loops(input: &Arc<LoopSet>, amount: f64, config: &LooperConfig) -> Arc<LoopSet> {
    let center = swing_ratio(amount);
    if center == NEUTRAL_CENTER {
        return Arc::clone(input);
    }
    Arc::new(
        input
            .iter()
            .map(|slot| {
                slot.map(|looped| {
                    swing_loop(looped, center, config.swing_grid, config.min_swing_length)
                })
            })
            .collect(),
    )
}
