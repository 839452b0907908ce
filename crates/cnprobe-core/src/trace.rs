//! Recorded responses handed over by the simulator boundary

use crate::error::{ensure_positive, ProbeError, Result};
use crate::time::{samples_in, time_of};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Relative tolerance when comparing sampling intervals
const DT_TOLERANCE: f64 = 1e-9;

/// Uniformly sampled recording (current in nA or voltage in mV) starting at t = 0
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResponseTrace {
    time_step_ms: f64,
    samples: Vec<f64>,
}

impl ResponseTrace {
    /// Wrap a snapshot of recorded samples
    pub fn new(time_step_ms: f64, samples: Vec<f64>) -> Result<Self> {
        if !(time_step_ms.is_finite() && time_step_ms > 0.0) {
            return Err(ProbeError::invalid_trace(format!(
                "time step must be > 0, got {}",
                time_step_ms
            )));
        }
        Ok(Self {
            time_step_ms,
            samples,
        })
    }

    /// Sample `f(t)` on `[0, duration_ms]`
    pub fn from_fn(time_step_ms: f64, duration_ms: f64, f: impl Fn(f64) -> f64) -> Result<Self> {
        ensure_positive("time_step_ms", time_step_ms)?;
        let n = samples_in(duration_ms, time_step_ms) + 1;
        let samples = (0..n).map(|i| f(time_of(i, time_step_ms))).collect();
        Self::new(time_step_ms, samples)
    }

    /// All-zero trace of `len` samples
    pub fn zeros(time_step_ms: f64, len: usize) -> Result<Self> {
        Self::new(time_step_ms, vec![0.0; len])
    }

    /// Sampling interval (ms)
    pub fn time_step_ms(&self) -> f64 {
        self.time_step_ms
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Recorded values
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Time of the last sample (ms)
    pub fn duration_ms(&self) -> f64 {
        time_of(self.samples.len().saturating_sub(1), self.time_step_ms)
    }

    /// Time of sample `index` (ms)
    pub fn time_at(&self, index: usize) -> f64 {
        time_of(index, self.time_step_ms)
    }

    /// Index of the sample at or just before `time_ms`
    pub fn index_of(&self, time_ms: f64) -> usize {
        samples_in(time_ms, self.time_step_ms)
    }

    /// `(time_ms, value)` pairs in time order
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        let dt = self.time_step_ms;
        self.samples
            .iter()
            .enumerate()
            .map(move |(i, &v)| (time_of(i, dt), v))
    }

    /// True if both traces share a sampling interval
    pub fn same_time_base(&self, time_step_ms: f64) -> bool {
        (self.time_step_ms - time_step_ms).abs() <= DT_TOLERANCE * self.time_step_ms.max(time_step_ms)
    }

    /// Absolute values of `len` samples from `start`, cut short at the end of the trace
    pub fn abs_window(&self, start: usize, len: usize) -> Vec<f64> {
        let start = start.min(self.samples.len());
        let end = start.saturating_add(len).min(self.samples.len());
        self.samples[start..end].iter().map(|v| v.abs()).collect()
    }

    /// Largest absolute value, or zero for an empty trace
    pub fn max_abs(&self) -> f64 {
        self.samples.iter().fold(0.0, |acc: f64, v| acc.max(v.abs()))
    }

    /// Mean of the samples with times in `[from_ms, to_ms)`, NaN if none
    pub fn mean_between(&self, from_ms: f64, to_ms: f64) -> f64 {
        let start = self.index_of(from_ms).min(self.samples.len());
        let end = self.index_of(to_ms).min(self.samples.len());
        if start >= end {
            return f64::NAN;
        }
        let window = &self.samples[start..end];
        window.iter().sum::<f64>() / window.len() as f64
    }

    /// Element-wise sum of traces recorded on the same time base
    pub fn sum(traces: &[ResponseTrace]) -> Result<ResponseTrace> {
        let first = traces
            .first()
            .ok_or_else(|| ProbeError::invalid_trace("cannot sum an empty set of traces"))?;

        let mut total = vec![0.0; first.len()];
        for (k, trace) in traces.iter().enumerate() {
            if !trace.same_time_base(first.time_step_ms) {
                return Err(ProbeError::trace_mismatch(format!(
                    "trace {} sampled at {} ms, expected {} ms",
                    k, trace.time_step_ms, first.time_step_ms
                )));
            }
            if trace.len() != first.len() {
                return Err(ProbeError::trace_mismatch(format!(
                    "trace {} has {} samples, expected {}",
                    k,
                    trace.len(),
                    first.len()
                )));
            }
            for (acc, v) in total.iter_mut().zip(&trace.samples) {
                *acc += v;
            }
        }

        ResponseTrace::new(first.time_step_ms, total)
    }

    /// Consume the trace, returning its samples
    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }
}
