//! Quantization Math
//!
//! Swing is a piecewise-linear reparameterization of each grid cell: the
//! first half of the cell is stretched to end at `center`, the second half
//! is squeezed into what remains. The cell index itself never moves, which
//! is what makes [`unswing_position`] an exact inverse.

use std::borrow::Cow;

use crate::loops::{Loop, Position};

/// Swing amount that leaves positions untouched.
pub const NEUTRAL_CENTER: f64 = 0.5;

/// Break-point of the swing curve for a swing amount in roughly `[-1, 1]`.
pub fn swing_ratio(amount: f64) -> f64 {
    NEUTRAL_CENTER + amount / 6.0
}

/// Map a straight position onto the swung timeline.
///
/// `grid` is the number of cells per beat. Within a cell, `[0, 0.5)` maps to
/// `[0, center)` and `[0.5, 1)` maps to `[center, 1)`.
pub fn swing_position(position: Position, center: f64, grid: f64) -> Position {
    let scaled = position * grid;
    let root = scaled.floor();
    let offset = (scaled - root) * 2.0 - 1.0;
    let swung = if offset < 0.0 {
        (1.0 + offset) * center
    } else {
        center + offset * (1.0 - center)
    };
    (root + swung) / grid
}

/// Inverse of [`swing_position`] for the same `center` and `grid`.
pub fn unswing_position(position: Position, center: f64, grid: f64) -> Position {
    let scaled = position * grid;
    let root = scaled.floor();
    let offset = scaled - root;
    let straight = if offset < center {
        offset / center * 0.5
    } else {
        0.5 + (offset - center) / (1.0 - center) * 0.5
    };
    (root + straight) / grid
}

/// Tile a short loop until it is at least `min_length` beats long.
///
/// Loops without a length, or already long enough, are returned borrowed.
/// Each round appends a copy of the original events shifted by the length
/// accumulated so far.
pub fn ensure_length(looped: &Loop, min_length: f64) -> Cow<'_, Loop> {
    if !looped.has_length() || looped.length >= min_length {
        return Cow::Borrowed(looped);
    }

    let mut result = looped.clone();
    while result.length < min_length {
        let offset = result.length;
        result
            .events
            .extend(looped.events.iter().map(|e| e.at(e.position + offset)));
        result.length += looped.length;
    }
    Cow::Owned(result)
}

/// Apply swing to every event of a loop, tiling it first when it is
/// shorter than `min_length`.
pub fn swing_loop(looped: &Loop, center: f64, grid: f64, min_length: f64) -> Loop {
    let tiled = ensure_length(looped, min_length);
    Loop {
        events: tiled
            .events
            .iter()
            .map(|e| e.at(swing_position(e.position, center, grid)))
            .collect(),
        length: tiled.length,
    }
}
