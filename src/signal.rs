//! Reactive building blocks
//!
//! Sources carry a value plus a version that bumps on every write. Derived
//! nodes remember the input versions they were last computed from, so
//! staleness is a cheap comparison and recomputation happens at most once
//! per distinct set of inputs, however many writes preceded it.
//!
//! The graph itself is wired by its owner (see `Looper`), which decides
//! when each [`Schedule`] gets flushed.

/// Monotonic write counter of a node
pub type Version = u64;

/// A writable node
#[derive(Debug, Clone)]
pub struct Source<T> {
    value: T,
    version: Version,
}

impl<T> Source<T> {
    pub fn new(value: T) -> Self {
        Self { value, version: 1 }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Replace the value, returning the old one.
    pub fn set(&mut self, value: T) -> T {
        self.version += 1;
        std::mem::replace(&mut self.value, value)
    }

    /// Edit in place; always counts as a change.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        self.version += 1;
        f(&mut self.value)
    }

    /// Edit in place without notifying dependents.
    ///
    /// For side-channel data that derived nodes never read.
    pub fn get_mut_untracked(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: PartialEq> Source<T> {
    /// Write only when the value differs. Returns whether it changed.
    pub fn set_if_changed(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.set(value);
        true
    }
}

/// When a derived node recomputes after an input changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// On the next flush, so writes made in one turn are batched
    Deferred,
    /// As soon as the owner observes the input change
    Immediate,
}

/// A cached computation over other nodes
#[derive(Debug, Clone)]
pub struct Derived<T> {
    value: T,
    inputs: Vec<Version>,
    version: Version,
    schedule: Schedule,
    evaluations: u64,
}

impl<T> Derived<T> {
    /// A node holding `initial` that is stale until its first refresh.
    pub fn new(initial: T, schedule: Schedule) -> Self {
        Self {
            value: initial,
            inputs: Vec::new(),
            version: 1,
            schedule,
            evaluations: 0,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// How many times the computation has run
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn is_stale(&self, inputs: &[Version]) -> bool {
        self.inputs != inputs
    }

    /// Recompute if `inputs` differ from the last run. Returns whether the
    /// computation ran.
    pub fn refresh(&mut self, inputs: &[Version], compute: impl FnOnce() -> T) -> bool {
        if !self.is_stale(inputs) {
            return false;
        }
        self.value = compute();
        self.inputs = inputs.to_vec();
        self.version += 1;
        self.evaluations += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_versions() {
        let mut source = Source::new(1);
        let v0 = source.version();

        assert_eq!(source.set(2), 1);
        assert!(source.version() > v0);

        let v1 = source.version();
        assert!(!source.set_if_changed(2));
        assert_eq!(source.version(), v1);

        *source.get_mut_untracked() = 3;
        assert_eq!(*source.get(), 3);
        assert_eq!(source.version(), v1);

        source.update(|v| *v += 1);
        assert_eq!(*source.get(), 4);
        assert!(source.version() > v1);
    }

    #[test]
    fn test_derived_batches_writes() {
        let mut a = Source::new(1);
        let mut b = Source::new(10);
        let mut sum = Derived::new(0, Schedule::Deferred);

        a.set(2);
        a.set(3);
        b.set(20);

        let inputs = [a.version(), b.version()];
        assert!(sum.refresh(&inputs, || a.get() + b.get()));
        assert_eq!(*sum.get(), 23);
        assert_eq!(sum.evaluations(), 1);

        // no new writes: nothing to do
        assert!(!sum.refresh(&[a.version(), b.version()], || unreachable!()));
        assert_eq!(sum.evaluations(), 1);
    }

    #[test]
    fn test_derived_version_tracks_recomputes() {
        let mut source = Source::new("a");
        let mut upper = Derived::new(String::new(), Schedule::Immediate);
        assert_eq!(upper.schedule(), Schedule::Immediate);

        upper.refresh(&[source.version()], || source.get().to_uppercase());
        let first = upper.version();

        source.set("b");
        assert!(upper.is_stale(&[source.version()]));
        upper.refresh(&[source.version()], || source.get().to_uppercase());

        assert_eq!(upper.get(), "B");
        assert!(upper.version() > first);
    }
}
