//! Per-pulse postsynaptic event features
//!
//! The recorded current is cut into one analysis window per stimulus pulse.
//! Each window starts at the pulse onset and runs for one inter-pulse interval
//! plus a short look-ahead, so a response that spills into the next interval
//! is still measured. Within the window the peak of `|I|` is located and the
//! 20%, 50% and 80% crossings around it give latency, rise time and
//! half-width. A pulse whose window shows no rise above its first searched
//! sample is reported with undefined (NaN) features rather than an error.

use crate::crossing::{find_crossing, Direction};
use crate::error::{ensure_non_negative, ProbeError, Result};
use crate::stimulus::StimulusSpec;
use crate::time::samples_in;
use crate::trace::ResponseTrace;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Features of the response to one stimulus pulse
///
/// Latencies and crossing times are relative to the pulse onset (ms).
/// Undefined values are NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventRecord {
    /// Pulse onset (ms)
    pub pulse_time_ms: f64,
    /// Peak of the rectified response
    pub peak_amplitude: f64,
    /// Window sample holding the peak
    pub peak_index: Option<usize>,
    /// Time of the 20% crossing on the rising phase
    pub latency_20pct: f64,
    /// Time of the 80% crossing on the rising phase
    pub latency_80pct: f64,
    /// Duration above half the peak
    pub half_width_ms: f64,
    /// Half-peak crossing on the rising phase
    pub half_left_ms: f64,
    /// Half-peak crossing on the decay phase
    pub half_right_ms: f64,
    /// 20% to 80% rise time
    pub rise_time_ms: f64,
}

impl EventRecord {
    /// Record for a pulse with no detected event
    pub fn undetected(pulse_time_ms: f64) -> Self {
        Self {
            pulse_time_ms,
            peak_amplitude: f64::NAN,
            peak_index: None,
            latency_20pct: f64::NAN,
            latency_80pct: f64::NAN,
            half_width_ms: f64::NAN,
            half_left_ms: f64::NAN,
            half_right_ms: f64::NAN,
            rise_time_ms: f64::NAN,
        }
    }

    /// True if a peak was found for this pulse
    pub fn is_detected(&self) -> bool {
        self.peak_index.is_some()
    }
}

/// Tunables of the window analysis
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtractionParams {
    /// Look-ahead past the next pulse onset (ms)
    pub extend_ms: f64,
    /// Earliest peak position after the pulse onset (ms)
    pub min_latency_ms: f64,
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            extend_ms: 0.25,
            min_latency_ms: 0.0,
        }
    }
}

impl ExtractionParams {
    /// Create validated parameters
    pub fn new(extend_ms: f64, min_latency_ms: f64) -> Result<Self> {
        let params = Self {
            extend_ms,
            min_latency_ms,
        };
        params.validate()?;
        Ok(params)
    }

    /// Set the minimum latency
    pub fn with_min_latency(mut self, min_latency_ms: f64) -> Self {
        self.min_latency_ms = min_latency_ms;
        self
    }

    /// Check that both durations are non-negative
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("extend_ms", self.extend_ms)?;
        ensure_non_negative("min_latency_ms", self.min_latency_ms)
    }
}

/// Window analysis of one trace against the pulse train that evoked it
#[derive(Debug, Clone)]
pub struct EventExtractor<'a> {
    trace: &'a ResponseTrace,
    spec: &'a StimulusSpec,
    ipi_ms: f64,
    extend_samples: usize,
    window_samples: usize,
    min_start: usize,
    crossing_end: usize,
}

impl<'a> EventExtractor<'a> {
    /// Validate inputs and derive window geometry
    pub fn new(
        trace: &'a ResponseTrace,
        spec: &'a StimulusSpec,
        params: &ExtractionParams,
    ) -> Result<Self> {
        spec.validate()?;
        params.validate()?;
        if !trace.same_time_base(spec.time_step_ms) {
            return Err(ProbeError::invalid_spec(
                "time_step_ms",
                format!("{} (trace sampled at {})", spec.time_step_ms, trace.time_step_ms()),
                "equal to the trace sampling interval",
            ));
        }

        let dt = spec.time_step_ms;
        let ipi_ms = spec.interpulse_interval_ms();
        let extend_samples = samples_in(params.extend_ms, dt);

        Ok(Self {
            trace,
            spec,
            ipi_ms,
            extend_samples,
            window_samples: samples_in(ipi_ms, dt) + extend_samples,
            min_start: samples_in(params.min_latency_ms, dt),
            crossing_end: samples_in(ipi_ms + params.extend_ms, dt),
        })
    }

    /// Samples per analysis window
    pub fn window_samples(&self) -> usize {
        self.window_samples
    }

    /// Onset of pulse `pulse_index` (ms)
    pub fn pulse_time_ms(&self, pulse_index: usize) -> f64 {
        self.spec.delay_ms + pulse_index as f64 * self.ipi_ms
    }

    /// Rectified response following pulse `pulse_index`
    pub fn pulse_window(&self, pulse_index: usize) -> Vec<f64> {
        let start = self.trace.index_of(self.pulse_time_ms(pulse_index));
        self.trace.abs_window(start, self.window_samples)
    }

    /// Analyse a single pulse, independent of every other pulse
    pub fn analyze_pulse(&self, pulse_index: usize) -> EventRecord {
        let pulse_time_ms = self.pulse_time_ms(pulse_index);
        let window = self.pulse_window(pulse_index);

        let search_end = (self.window_samples - self.extend_samples).min(window.len());
        let Some(peak_index) = argmax(&window, self.min_start..search_end) else {
            log::debug!("Pulse {} at {} ms: window too short", pulse_index, pulse_time_ms);
            return EventRecord::undetected(pulse_time_ms);
        };
        if peak_index == self.min_start {
            log::debug!("Pulse {} at {} ms: no event detected", pulse_index, pulse_time_ms);
            return EventRecord::undetected(pulse_time_ms);
        }

        let dt = self.spec.time_step_ms;
        let search = self.min_start..self.crossing_end;
        let crossing = |fraction, direction| {
            find_crossing(&window, dt, peak_index, fraction, direction, search.clone())
        };

        let latency_20pct = crossing(0.2, Direction::Left);
        let latency_80pct = crossing(0.8, Direction::Left);
        let half_left_ms = crossing(0.5, Direction::Left);
        let half_right_ms = crossing(0.5, Direction::Right);

        EventRecord {
            pulse_time_ms,
            peak_amplitude: window[peak_index],
            peak_index: Some(peak_index),
            latency_20pct,
            latency_80pct,
            half_width_ms: defined_difference(half_right_ms, half_left_ms),
            half_left_ms,
            half_right_ms,
            rise_time_ms: defined_difference(latency_80pct, latency_20pct),
        }
    }

    /// Analyse every pulse in order
    pub fn run(&self) -> Vec<EventRecord> {
        let events: Vec<EventRecord> = (0..self.spec.pulse_count)
            .map(|i| self.analyze_pulse(i))
            .collect();
        log::debug!(
            "Detected {} of {} events",
            events.iter().filter(|e| e.is_detected()).count(),
            events.len()
        );
        events
    }
}

/// First index of the largest value in `range`, ignoring NaN
fn argmax(values: &[f64], range: std::ops::Range<usize>) -> Option<usize> {
    if range.start >= range.end || range.end > values.len() {
        return None;
    }
    let mut best = range.start;
    for i in range {
        if values[i] > values[best] || (values[best].is_nan() && !values[i].is_nan()) {
            best = i;
        }
    }
    Some(best)
}

fn defined_difference(later: f64, earlier: f64) -> f64 {
    if later.is_nan() || earlier.is_nan() {
        f64::NAN
    } else {
        later - earlier
    }
}

/// Extract one record per pulse with default parameters
pub fn extract_events(trace: &ResponseTrace, spec: &StimulusSpec) -> Result<Vec<EventRecord>> {
    extract_events_with(trace, spec, &ExtractionParams::default())
}

/// Extract one record per pulse
pub fn extract_events_with(
    trace: &ResponseTrace,
    spec: &StimulusSpec,
    params: &ExtractionParams,
) -> Result<Vec<EventRecord>> {
    Ok(EventExtractor::new(trace, spec, params)?.run())
}

/// Analyse many independent recordings of the same pulse train
#[cfg(feature = "parallel")]
pub fn extract_events_batch(
    traces: &[ResponseTrace],
    spec: &StimulusSpec,
    params: &ExtractionParams,
) -> Result<Vec<Vec<EventRecord>>> {
    traces
        .par_iter()
        .map(|trace| extract_events_with(trace, spec, params))
        .collect()
}

/// Analyse many independent recordings of the same pulse train
#[cfg(not(feature = "parallel"))]
pub fn extract_events_batch(
    traces: &[ResponseTrace],
    spec: &StimulusSpec,
    params: &ExtractionParams,
) -> Result<Vec<Vec<EventRecord>>> {
    traces
        .iter()
        .map(|trace| extract_events_with(trace, spec, params))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_pulse(dt: f64) -> StimulusSpec {
        StimulusSpec::new(1, 100.0, 1.0, 0.1, 1.0, dt).unwrap()
    }

    #[test]
    fn test_params_validation() {
        assert!(ExtractionParams::default().validate().is_ok());
        assert!(ExtractionParams::new(-0.1, 0.0).is_err());
        assert!(ExtractionParams::new(0.25, -1.0).is_err());
    }

    #[test]
    fn test_argmax_first_maximum() {
        let values = [0.0, 3.0, 1.0, 3.0];
        assert_eq!(argmax(&values, 0..4), Some(1));
        assert_eq!(argmax(&values, 2..4), Some(3));
        assert_eq!(argmax(&values, 2..2), None);
        assert_eq!(argmax(&values, 0..9), None);
        assert_eq!(argmax(&[f64::NAN, 1.0], 0..2), Some(1));
    }

    #[test]
    fn test_window_geometry() {
        let spec = one_pulse(0.025);
        let trace = ResponseTrace::zeros(0.025, 2000).unwrap();
        let extractor = EventExtractor::new(&trace, &spec, &ExtractionParams::default()).unwrap();
        assert_eq!(extractor.window_samples(), 410);
        assert_eq!(extractor.pulse_window(0).len(), 410);
        assert_eq!(extractor.pulse_time_ms(0), 1.0);
    }

    #[test]
    fn test_triangle_event() {
        // dt = 1 ms, pulse at 1 ms, 100 Hz -> 10-sample window plus no look-ahead
        let spec = one_pulse(1.0);
        let mut samples = vec![0.0; 20];
        samples[2] = -5.0;
        samples[3] = -10.0;
        samples[4] = -5.0;
        let trace = ResponseTrace::new(1.0, samples).unwrap();

        let events = extract_events(&trace, &spec).unwrap();
        assert_eq!(events.len(), 1);
        let event = events[0];
        assert_eq!(event.peak_amplitude, 10.0);
        assert_eq!(event.peak_index, Some(2));
        assert_eq!(event.half_left_ms, 1.0);
        assert_eq!(event.half_right_ms, 3.0);
        assert_eq!(event.half_width_ms, 2.0);
        assert!((event.latency_20pct - 0.4).abs() < 1e-12);
        assert!((event.latency_80pct - 1.6).abs() < 1e-12);
        assert!((event.rise_time_ms - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_mismatched_time_base() {
        let spec = one_pulse(0.025);
        let trace = ResponseTrace::zeros(0.05, 100).unwrap();
        let err = extract_events(&trace, &spec).unwrap_err();
        assert!(err.is_invalid_spec());
    }

    #[test]
    fn test_short_trace_yields_undetected() {
        let spec = one_pulse(0.025);
        let trace = ResponseTrace::zeros(0.025, 10).unwrap();
        let events = extract_events(&trace, &spec).unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_detected());
        assert_eq!(events[0].pulse_time_ms, 1.0);
    }

    #[test]
    fn test_batch_matches_single() {
        let spec = one_pulse(1.0);
        let mut samples = vec![0.0; 20];
        samples[3] = 4.0;
        let traces = vec![
            ResponseTrace::new(1.0, samples).unwrap(),
            ResponseTrace::zeros(1.0, 20).unwrap(),
        ];
        let params = ExtractionParams::default();
        let batch = extract_events_batch(&traces, &spec, &params).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0][0].peak_index, Some(2));
        assert!(!batch[1][0].is_detected());
    }
}
