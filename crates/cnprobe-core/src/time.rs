//! Conversions between milliseconds and sample indices on a uniform time base

/// Slack added before flooring so that e.g. `10.0 / 0.025` lands on 400, not 399
pub const TIME_EPSILON: f64 = 1e-9;

/// Number of whole samples of width `dt_ms` that fit in `duration_ms`
///
/// Negative or non-finite durations give zero.
pub fn samples_in(duration_ms: f64, dt_ms: f64) -> usize {
    let n = duration_ms / dt_ms + TIME_EPSILON;
    if n.is_finite() && n > 0.0 {
        n.floor() as usize
    } else {
        0
    }
}

/// Time (ms) of sample `index`
pub fn time_of(index: usize, dt_ms: f64) -> f64 {
    index as f64 * dt_ms
}
