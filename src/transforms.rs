//! Built-in transforms
//!
//! Ready-made pipeline stages. Each works target by target and leaves
//! targets without a loop alone.

use crate::loops::Loop;
use crate::quantize::ensure_length;
use crate::transform::{LoopGridData, Transform};

fn map_loops(input: LoopGridData, mut f: impl FnMut(Loop) -> Loop) -> LoopGridData {
    input.map(|slot| slot.map(&mut f))
}

/// Play every loop backwards.
///
/// Starts and stops swap roles so each note keeps its duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reverse;

impl Transform for Reverse {
    fn apply(&self, input: LoopGridData) -> Option<LoopGridData> {
        Some(map_loops(input, |looped| {
            if !looped.has_length() {
                return looped;
            }
            let length = looped.length;
            let events = looped
                .events
                .iter()
                .map(|e| {
                    let mut reversed = e.at(length - e.position);
                    reversed.start = !e.start;
                    reversed
                })
                .collect();
            Loop::new(events, length).normalized()
        }))
    }

    fn name(&self) -> &str {
        "reverse"
    }
}

/// Rotate every loop by a number of beats, wrapping at the loop end.
#[derive(Debug, Clone, Copy)]
pub struct Shift {
    pub offset: f64,
}

impl Shift {
    pub fn new(offset: f64) -> Self {
        Self { offset }
    }
}

impl Transform for Shift {
    fn apply(&self, input: LoopGridData) -> Option<LoopGridData> {
        Some(map_loops(input, |looped| {
            let length = looped.length;
            let events = looped
                .events
                .iter()
                .map(|e| e.at(e.position + self.offset))
                .collect();
            Loop::new(events, length).normalized()
        }))
    }

    fn name(&self) -> &str {
        "shift"
    }
}

/// Repeat every loop once so it runs twice as long.
#[derive(Debug, Clone, Copy, Default)]
pub struct Double;

impl Transform for Double {
    fn apply(&self, input: LoopGridData) -> Option<LoopGridData> {
        Some(map_loops(input, |looped| {
            let target = looped.length * 2.0;
            ensure_length(&looped, target).into_owned()
        }))
    }

    fn name(&self) -> &str {
        "double"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{ArrayGrid, GridShape};
    use crate::loops::Event;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    fn input() -> LoopGridData {
        ArrayGrid::new(
            vec![
                Some(Loop::new(vec![Event::start(1.0), Event::stop(1.5)], 4.0)),
                None,
            ],
            GridShape::row(2),
        )
    }

    fn back_to_zero() -> LoopGridData {
        ArrayGrid::new(
            vec![Some(Loop::new(vec![Event::start(0.0)], 4.0))],
            GridShape::row(1),
        )
    }

    fn first(output: Option<LoopGridData>) -> Loop {
        output.unwrap().data[0].clone().unwrap()
    }

    #[test]
    fn test_reverse_keeps_note_durations() {
        let reversed = first(Reverse.apply(input()));
        assert_eq!(reversed.events, vec![Event::start(2.5), Event::stop(3.0)]);
        assert_eq!(reversed.length, 4.0);
    }

    #[test]
    fn test_reverse_twice_is_identity() {
        let grid = Reverse.apply(input()).unwrap();
        let back = first(Reverse.apply(grid));
        assert_eq!(back, input().data[0].clone().unwrap());
    }

    #[test]
    fn test_shift_wraps() {
        let shifted = first(Shift::new(2.75).apply(input()));
        assert_eq!(shifted.events, vec![Event::stop(0.25), Event::start(3.75)]);

        let back = first(Shift::new(-1.0).apply(input()));
        assert_eq!(back.events, vec![Event::start(0.0), Event::stop(0.5)]);

        // a hair before zero wraps to the loop start, never to its end
        let nudged = first(Shift::new(-1e-17).apply(back_to_zero()));
        assert_eq!(nudged.events[0], Event::start(0.0));
        assert!(nudged.events.iter().all(|e| e.position < nudged.length));
    }

    #[test]
    fn test_double_tiles_once() {
        let doubled = first(Double.apply(input()));
        assert_abs_diff_eq!(doubled.length, 8.0);
        let positions: Vec<f64> = doubled.events.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1.0, 1.5, 5.0, 5.5]);
    }

    #[test]
    fn test_empty_slots_untouched() {
        for output in [
            Reverse.apply(input()),
            Shift::new(1.0).apply(input()),
            Double.apply(input()),
        ] {
            let output = output.unwrap();
            assert_eq!(output.shape(), GridShape::row(2));
            assert!(output.data[1].is_none());
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(Reverse.name(), "reverse");
        assert_eq!(Shift::new(0.0).name(), "shift");
        assert_eq!(Double.name(), "double");
    }
}
