//! Threshold crossings around a peak, located by linear interpolation

use std::ops::Range;

use crate::time::time_of;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which side of the peak to search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    /// Towards earlier samples (rising phase)
    Left,
    /// Towards later samples (decay phase)
    Right,
}

/// Time at which `values` crosses `fraction * values[peak_index]`
///
/// The search walks away from the peak in `direction`, staying inside
/// `search`: leftward it considers `[search.start, peak_index)` and takes the
/// last sample below the level, rightward `[peak_index, search.end)` and the
/// first one. The crossing is interpolated between that sample and its
/// neighbour on the peak side. Times are `index * dt_ms`. Returns NaN when no
/// sample falls below the level.
pub fn find_crossing(
    values: &[f64],
    dt_ms: f64,
    peak_index: usize,
    fraction: f64,
    direction: Direction,
    search: Range<usize>,
) -> f64 {
    let Some(&peak) = values.get(peak_index) else {
        return f64::NAN;
    };
    let level = fraction * peak;
    let end = search.end.min(values.len());

    let below = match direction {
        Direction::Left => (search.start..peak_index.min(end))
            .rev()
            .find(|&j| values[j] < level)
            .map(|j| (j, j + 1)),
        Direction::Right => (peak_index.max(search.start)..end)
            .find(|&j| values[j] < level)
            .filter(|&j| j > 0)
            .map(|j| (j - 1, j)),
    };

    match below {
        Some((a, b)) => interpolate(a, values[a], b, values[b], level, dt_ms),
        None => f64::NAN,
    }
}

fn interpolate(a: usize, ya: f64, b: usize, yb: f64, level: f64, dt_ms: f64) -> f64 {
    let (ta, tb) = (time_of(a, dt_ms), time_of(b, dt_ms));
    let dy = yb - ya;
    if dy == 0.0 {
        return tb;
    }
    ta + (level - ya) * (tb - ta) / dy
}
