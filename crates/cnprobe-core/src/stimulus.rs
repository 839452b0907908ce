//! Command waveforms for current and voltage clamp devices
//!
//! A [`StimulusSpec`] describes a train of equally spaced rectangular pulses,
//! optionally followed by a single recovery pulse. [`build_waveform`] samples
//! it on the simulation time base so the external simulator can play it into a
//! clamp electrode. [`StepCommand`] covers the piecewise-constant holding
//! commands used for voltage clamp and I/V current steps, and [`LevelRange`]
//! produces the families of step levels those protocols sweep through.

use crate::error::{ensure_non_negative, ensure_positive, ProbeError, Result};
use crate::time::{samples_in, time_of};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance used when merging step levels
const LEVEL_EPSILON: f64 = 1e-9;

/// Declarative description of a pulse train
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StimulusSpec {
    /// Number of pulses in the train (>= 1)
    pub pulse_count: usize,
    /// Pulse repetition frequency (Hz)
    pub frequency_hz: f64,
    /// Time before the first pulse (ms)
    pub delay_ms: f64,
    /// Width of each pulse (ms)
    pub duration_ms: f64,
    /// Pulse amplitude (nA for current clamp, mV for voltage clamp)
    pub amplitude: f64,
    /// Sampling interval of the command and of the recorded response (ms)
    pub time_step_ms: f64,
    /// Delay from the last train pulse to a recovery test pulse (ms, 0 = none)
    #[cfg_attr(feature = "serde", serde(default))]
    pub post_test_ms: f64,
}

impl Default for StimulusSpec {
    fn default() -> Self {
        Self {
            pulse_count: 10,
            frequency_hz: 100.0,
            delay_ms: 10.0,
            duration_ms: 0.5,
            amplitude: 10.0,
            time_step_ms: 0.025,
            post_test_ms: 0.0,
        }
    }
}

impl StimulusSpec {
    /// Create a validated pulse train without a recovery pulse
    pub fn new(
        pulse_count: usize,
        frequency_hz: f64,
        delay_ms: f64,
        duration_ms: f64,
        amplitude: f64,
        time_step_ms: f64,
    ) -> Result<Self> {
        let spec = Self {
            pulse_count,
            frequency_hz,
            delay_ms,
            duration_ms,
            amplitude,
            time_step_ms,
            post_test_ms: 0.0,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Add a recovery pulse `post_test_ms` after the start of the last pulse
    pub fn with_post_test(mut self, post_test_ms: f64) -> Self {
        self.post_test_ms = post_test_ms;
        self
    }

    /// Resample the command on a different time base
    pub fn with_time_step(mut self, time_step_ms: f64) -> Self {
        self.time_step_ms = time_step_ms;
        self
    }

    /// Scale every pulse to `amplitude`
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Check the constraints every spec must satisfy
    pub fn validate(&self) -> Result<()> {
        if self.pulse_count < 1 {
            return Err(ProbeError::invalid_spec(
                "pulse_count",
                self.pulse_count,
                ">= 1",
            ));
        }
        ensure_positive("frequency_hz", self.frequency_hz)?;
        ensure_positive("time_step_ms", self.time_step_ms)?;
        ensure_positive("duration_ms", self.duration_ms)?;
        ensure_non_negative("delay_ms", self.delay_ms)?;
        ensure_non_negative("post_test_ms", self.post_test_ms)?;
        if !self.amplitude.is_finite() {
            return Err(ProbeError::invalid_spec(
                "amplitude",
                self.amplitude,
                "finite",
            ));
        }
        Ok(())
    }

    /// Interval between pulse onsets (ms)
    pub fn interpulse_interval_ms(&self) -> f64 {
        1000.0 / self.frequency_hz
    }

    /// Onset time of every train pulse (ms), in ascending order
    pub fn pulse_times_ms(&self) -> Vec<f64> {
        let ipi = self.interpulse_interval_ms();
        (0..self.pulse_count)
            .map(|i| self.delay_ms + i as f64 * ipi)
            .collect()
    }

    /// Onset of the recovery pulse, if one is requested
    pub fn post_test_time_ms(&self) -> Option<f64> {
        if self.post_test_ms > 0.0 {
            self.pulse_times_ms()
                .last()
                .map(|last| last + self.post_test_ms)
        } else {
            None
        }
    }

    /// Length of the simulated window covered by the command (ms)
    ///
    /// Three extra inter-pulse intervals follow the train so the response to
    /// the last pulse can decay; a recovery pulse adds its delay plus five
    /// pulse widths.
    pub fn total_duration_ms(&self) -> f64 {
        let tail_widths = if self.post_test_ms > 0.0 { 5.0 } else { 1.0 };
        self.delay_ms
            + self.interpulse_interval_ms() * (self.pulse_count as f64 + 3.0)
            + self.post_test_ms
            + self.duration_ms * tail_widths
    }

    /// Number of samples in the built waveform
    pub fn sample_count(&self) -> usize {
        samples_in(self.total_duration_ms(), self.time_step_ms) + 1
    }
}

/// A command sampled on a uniform time base starting at t = 0
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Waveform {
    time_step_ms: f64,
    samples: Vec<f64>,
}

impl Waveform {
    /// Wrap already sampled values
    pub fn from_samples(time_step_ms: f64, samples: Vec<f64>) -> Result<Self> {
        ensure_positive("time_step_ms", time_step_ms)?;
        Ok(Self {
            time_step_ms,
            samples,
        })
    }

    /// Sampling interval (ms)
    pub fn time_step_ms(&self) -> f64 {
        self.time_step_ms
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if the waveform holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample values
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Value of sample `index`
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.samples.get(index).copied()
    }

    /// Time of the last sample (ms)
    pub fn duration_ms(&self) -> f64 {
        time_of(self.samples.len().saturating_sub(1), self.time_step_ms)
    }

    /// `(time_ms, value)` pairs in time order
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        let dt = self.time_step_ms;
        self.samples
            .iter()
            .enumerate()
            .map(move |(i, &v)| (time_of(i, dt), v))
    }

    /// Consume the waveform, returning its samples
    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }
}

fn fill_pulse(samples: &mut [f64], start: usize, width: usize, amplitude: f64) {
    let end = start.saturating_add(width).min(samples.len());
    if start < end {
        samples[start..end].fill(amplitude);
    }
}

/// Sample a pulse train into a command waveform
///
/// The waveform carries `pulse_count` pulses of `amplitude` spaced
/// `1000 / frequency_hz` ms apart, and is zero elsewhere except for the
/// optional recovery pulse. Each pulse starts on the sample at or just before
/// its onset, `floor(onset / dt)`, so an onset between samples begins up to one
/// sample early.
pub fn build_waveform(spec: &StimulusSpec) -> Result<Waveform> {
    spec.validate()?;

    let dt = spec.time_step_ms;
    let mut samples = vec![0.0; spec.sample_count()];
    let width = samples_in(spec.duration_ms, dt).max(1);

    for onset in spec.pulse_times_ms() {
        fill_pulse(&mut samples, samples_in(onset, dt), width, spec.amplitude);
    }
    if let Some(onset) = spec.post_test_time_ms() {
        fill_pulse(&mut samples, samples_in(onset, dt), width, spec.amplitude);
    }

    log::debug!(
        "Built pulse train: {} pulses at {} Hz, {} samples",
        spec.pulse_count,
        spec.frequency_hz,
        samples.len()
    );

    Waveform::from_samples(dt, samples)
}

/// One constant level held for a fixed duration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepSegment {
    /// How long the level is held (ms)
    pub duration_ms: f64,
    /// Command level (mV or nA)
    pub level: f64,
}

/// Piecewise-constant clamp command
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepCommand {
    segments: Vec<StepSegment>,
}

impl StepCommand {
    /// Create a command from consecutive segments
    pub fn new(segments: Vec<StepSegment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(ProbeError::invalid_spec("segments", 0, "at least one segment"));
        }
        for segment in &segments {
            ensure_positive("duration_ms", segment.duration_ms)?;
            if !segment.level.is_finite() {
                return Err(ProbeError::invalid_spec("level", segment.level, "finite"));
            }
        }
        Ok(Self { segments })
    }

    /// Hold a single level through every duration
    pub fn holding(level: f64, durations_ms: &[f64]) -> Result<Self> {
        Self::new(
            durations_ms
                .iter()
                .map(|&duration_ms| StepSegment { duration_ms, level })
                .collect(),
        )
    }

    /// Baseline, step to `level`, back to baseline
    pub fn pulse(durations_ms: [f64; 3], baseline: f64, level: f64) -> Result<Self> {
        Self::new(vec![
            StepSegment { duration_ms: durations_ms[0], level: baseline },
            StepSegment { duration_ms: durations_ms[1], level },
            StepSegment { duration_ms: durations_ms[2], level: baseline },
        ])
    }

    /// Segments in time order
    pub fn segments(&self) -> &[StepSegment] {
        &self.segments
    }

    /// Sum of all segment durations (ms)
    pub fn total_duration_ms(&self) -> f64 {
        self.segments.iter().map(|s| s.duration_ms).sum()
    }

    /// Sample the command; the final sample holds the last level
    pub fn build(&self, time_step_ms: f64) -> Result<Waveform> {
        ensure_positive("time_step_ms", time_step_ms)?;

        let n = samples_in(self.total_duration_ms(), time_step_ms) + 1;
        let mut samples = Vec::with_capacity(n);
        let mut elapsed = 0.0;
        for segment in &self.segments {
            elapsed += segment.duration_ms;
            let end = samples_in(elapsed, time_step_ms).min(n);
            samples.resize(end.max(samples.len()), segment.level);
        }
        if let Some(last) = self.segments.last() {
            samples.resize(n, last.level);
        }

        Waveform::from_samples(time_step_ms, samples)
    }
}

/// Inclusive, evenly spaced range of step levels
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LevelRange {
    /// First level
    pub start: f64,
    /// Last level (included when it falls on the grid)
    pub stop: f64,
    /// Spacing between levels
    pub step: f64,
}

impl LevelRange {
    /// Create a validated range
    pub fn new(start: f64, stop: f64, step: f64) -> Result<Self> {
        let range = Self { start, stop, step };
        range.validate()?;
        Ok(range)
    }

    /// `count` levels evenly spread over `[start, stop]`
    pub fn linspace(start: f64, stop: f64, count: usize) -> Result<Self> {
        match count {
            0 => Err(ProbeError::invalid_spec("count", count, ">= 1")),
            1 => Self::new(start, start, 1.0),
            _ => Self::new(start, stop, (stop - start) / (count - 1) as f64),
        }
    }

    /// Check ordering and spacing
    pub fn validate(&self) -> Result<()> {
        if !self.start.is_finite() || !self.stop.is_finite() {
            return Err(ProbeError::invalid_spec(
                "range",
                format!("({}, {})", self.start, self.stop),
                "finite bounds",
            ));
        }
        if self.start > self.stop {
            return Err(ProbeError::invalid_spec(
                "start",
                format!("{} (with stop={})", self.start, self.stop),
                "<= stop",
            ));
        }
        ensure_positive("step", self.step)
    }

    /// Levels on the grid, in ascending order
    pub fn levels(&self) -> Vec<f64> {
        let n = samples_in(self.stop - self.start, self.step) + 1;
        (0..n)
            .map(|k| {
                let level = self.start + k as f64 * self.step;
                if level.abs() < LEVEL_EPSILON {
                    0.0
                } else {
                    level
                }
            })
            .collect()
    }
}

/// Merge several ranges into one sorted list without near-duplicates
pub fn levels_from_ranges(ranges: &[LevelRange]) -> Result<Vec<f64>> {
    if ranges.is_empty() {
        return Err(ProbeError::invalid_spec("ranges", 0, "at least one range"));
    }

    let mut levels = Vec::new();
    for range in ranges {
        range.validate()?;
        levels.extend(range.levels());
    }
    levels.sort_by(|a, b| a.total_cmp(b));
    levels.dedup_by(|a, b| (*a - *b).abs() < LEVEL_EPSILON);
    Ok(levels)
}
