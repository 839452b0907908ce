//! Current-clamp I/V and F/I curves
//!
//! One run per current level: the cell rests, current is injected, and the
//! cell rests again. The injection is either a single step or a train of
//! short repeated pulses at the same level, optionally preceded by a
//! conditioning prepulse. Each run is reduced to a handful of numbers
//! (resting potential, steady-state and peak response, spikes) from which
//! input resistance, membrane time constant and the firing-rate relation are
//! derived.

use cnprobe_core::{
    build_waveform, levels_from_ranges, nan_mean, LevelRange, ResponseTrace, StepCommand,
    StepSegment, StimulusSpec, Waveform,
};
use serde::{Deserialize, Serialize};

use crate::cells::{CellType, ModelSpec};
use crate::config::{ConfigFile, RunConfig};
use crate::error::{ProtocolError, Result};
use crate::simulator::{ensure_time_base, Simulator};

/// Fraction of the step, counted from its end, averaged for the steady state
pub(crate) const STEADY_STATE_FRACTION: f64 = 0.2;

/// Fraction of the steady-state deflection reached after one time constant
const CHARGING_FRACTION: f64 = 1.0 - 1.0 / std::f64::consts::E;

const REPEATED_PULSE_COUNT: usize = 10;
const REPEATED_PULSE_HZ: f64 = 50.0;
const REPEATED_PULSE_MS: f64 = 3.0;

/// Shape of the current injected at each level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PulseMode {
    /// One step lasting the middle duration
    #[default]
    Step,
    /// Ten 3 ms pulses at 50 Hz starting after the first duration
    Pulses,
}

/// I/V protocol settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IvConfig {
    /// Pre-step, step and post-step durations (ms)
    pub durations_ms: [f64; 3],
    /// Single step or repeated pulses
    pub pulse_mode: PulseMode,
    /// Conditioning current held between rest and the step (nA)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepulse_na: Option<f64>,
    /// Duration of the conditioning current (ms)
    pub prepulse_ms: f64,
    /// Upward crossings of this potential count as spikes (mV)
    pub spike_threshold_mv: f64,
    /// Current levels (nA)
    pub ranges: Vec<LevelRange>,
    /// Temperature and time step; the run duration follows the command
    pub run: RunConfig,
}

impl Default for IvConfig {
    fn default() -> Self {
        Self {
            durations_ms: [10.0, 100.0, 20.0],
            pulse_mode: PulseMode::Step,
            prepulse_na: None,
            prepulse_ms: 25.0,
            spike_threshold_mv: -20.0,
            ranges: CellType::Bushy.default_iv_ranges(),
            run: RunConfig::default().with_temperature(22.0),
        }
    }
}

impl IvConfig {
    /// Default settings with the step ranges and prepulse suited to `cell_type`
    pub fn for_cell(cell_type: CellType) -> Self {
        Self {
            ranges: cell_type.default_iv_ranges(),
            prepulse_na: cell_type.default_prepulse_na(),
            ..Self::default()
        }
    }

    /// Set the run configuration
    pub fn with_run(mut self, run: RunConfig) -> Self {
        self.run = run;
        self
    }

    /// Set the current ranges
    pub fn with_ranges(mut self, ranges: Vec<LevelRange>) -> Self {
        self.ranges = ranges;
        self
    }

    /// Set the injection shape
    pub fn with_pulse_mode(mut self, pulse_mode: PulseMode) -> Self {
        self.pulse_mode = pulse_mode;
        self
    }

    /// Hold `prepulse_na` for `prepulse_ms` before every step
    pub fn with_prepulse(mut self, prepulse_na: f64, prepulse_ms: f64) -> Self {
        self.prepulse_na = Some(prepulse_na);
        self.prepulse_ms = prepulse_ms;
        self
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.durations_ms.iter().any(|d| !(d.is_finite() && *d > 0.0)) {
            return Err(ProtocolError::config(format!(
                "step durations must be positive, got {:?}",
                self.durations_ms
            )));
        }
        if !self.spike_threshold_mv.is_finite() {
            return Err(ProtocolError::config("spike threshold must be finite"));
        }
        if let Some(prepulse) = self.prepulse_na {
            if self.pulse_mode == PulseMode::Pulses {
                return Err(ProtocolError::config(
                    "a prepulse can only precede a single step",
                ));
            }
            if !prepulse.is_finite() || !(self.prepulse_ms.is_finite() && self.prepulse_ms > 0.0) {
                return Err(ProtocolError::config(format!(
                    "prepulse needs a finite level and positive duration, got {} nA for {} ms",
                    prepulse, self.prepulse_ms
                )));
            }
        }
        self.run.validate()?;
        levels_from_ranges(&self.ranges)?;
        Ok(())
    }

    /// Every current level, ascending
    pub fn levels(&self) -> Result<Vec<f64>> {
        Ok(levels_from_ranges(&self.ranges)?)
    }

    /// Command for one level and the part of it that is analysed
    fn command(&self, level: f64) -> Result<(Waveform, InjectionWindow)> {
        let [pre, pulse, post] = self.durations_ms;
        let dt = self.run.time_step_ms;

        match self.pulse_mode {
            PulseMode::Step => {
                let mut segments = vec![StepSegment { duration_ms: pre, level: 0.0 }];
                let mut onset_ms = pre;
                if let Some(prepulse) = self.prepulse_na {
                    segments.push(StepSegment {
                        duration_ms: self.prepulse_ms,
                        level: prepulse,
                    });
                    onset_ms += self.prepulse_ms;
                }
                segments.push(StepSegment { duration_ms: pulse, level });
                segments.push(StepSegment { duration_ms: post, level: 0.0 });

                let command = StepCommand::new(segments)?;
                let window = InjectionWindow {
                    rest_end_ms: pre,
                    onset_ms,
                    duration_ms: pulse,
                    tstop_ms: command.total_duration_ms(),
                };
                Ok((command.build(dt)?, window))
            }
            PulseMode::Pulses => {
                let train = StimulusSpec::new(
                    REPEATED_PULSE_COUNT,
                    REPEATED_PULSE_HZ,
                    pre,
                    REPEATED_PULSE_MS,
                    level,
                    dt,
                )?;
                let window = InjectionWindow {
                    rest_end_ms: pre,
                    onset_ms: pre,
                    duration_ms: REPEATED_PULSE_COUNT as f64 * train.interpulse_interval_ms(),
                    tstop_ms: train.total_duration_ms(),
                };
                Ok((build_waveform(&train)?, window))
            }
        }
    }
}

impl ConfigFile for IvConfig {
    fn validate(&self) -> Result<()> {
        IvConfig::validate(self)
    }
}

/// Timing of the injection within one run (ms)
#[derive(Debug, Clone, Copy)]
struct InjectionWindow {
    rest_end_ms: f64,
    onset_ms: f64,
    duration_ms: f64,
    tstop_ms: f64,
}

/// Response to one current step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IvLevel {
    /// Injected current (nA)
    pub current_na: f64,
    /// Mean potential before the step (mV)
    pub rest_mv: f64,
    /// Mean potential over the end of the step (mV)
    pub steady_state_mv: f64,
    /// Potential furthest from rest during the step (mV)
    pub peak_mv: f64,
    /// Spikes during the step
    pub spike_count: usize,
    /// First threshold crossing after step onset (ms), NaN without spikes
    pub first_spike_latency_ms: f64,
    /// Time to reach 63% of the steady-state deflection (ms), NaN if never reached
    pub charging_time_ms: f64,
}

/// Results of a full I/V run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IvResult {
    /// One entry per level, ascending current
    pub levels: Vec<IvLevel>,
    /// Membrane potential recorded at each level (mV)
    pub traces: Vec<ResponseTrace>,
    /// Duration of the analysed injection (ms)
    pub pulse_duration_ms: f64,
}

impl IvResult {
    /// Least-squares line through steady state against current at levels <= 0
    ///
    /// Returns `(slope_mohm, intercept_mv)`; `None` with fewer than two
    /// usable levels.
    pub fn input_resistance(&self) -> Option<(f64, f64)> {
        let points: Vec<(f64, f64)> = self
            .levels
            .iter()
            .filter(|l| l.current_na <= 0.0 && l.steady_state_mv.is_finite())
            .map(|l| (l.current_na, l.steady_state_mv))
            .collect();
        least_squares(&points)
    }

    /// Mean charging time over hyperpolarizing levels without spikes (ms)
    pub fn membrane_tau_ms(&self) -> f64 {
        let taus: Vec<f64> = self
            .levels
            .iter()
            .filter(|l| l.current_na < 0.0 && l.spike_count == 0)
            .map(|l| l.charging_time_ms)
            .collect();
        nan_mean(&taus)
    }

    /// Mean resting potential over all levels (mV)
    pub fn resting_potential_mv(&self) -> f64 {
        let rests: Vec<f64> = self.levels.iter().map(|l| l.rest_mv).collect();
        nan_mean(&rests)
    }

    /// `(current_na, rate_hz)` for every level
    pub fn firing_rates_hz(&self) -> Vec<(f64, f64)> {
        let seconds = self.pulse_duration_ms / 1000.0;
        self.levels
            .iter()
            .map(|l| (l.current_na, l.spike_count as f64 / seconds))
            .collect()
    }
}

/// I/V protocol runner
#[derive(Debug, Clone)]
pub struct IvCurve {
    config: IvConfig,
}

impl IvCurve {
    /// Create a runner with validated settings
    pub fn new(config: IvConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Settings in use
    pub fn config(&self) -> &IvConfig {
        &self.config
    }

    /// Step through every level on `model`
    pub fn run<S: Simulator + ?Sized>(&self, sim: &mut S, model: &ModelSpec) -> Result<IvResult> {
        model.validate()?;

        let dt = self.config.run.time_step_ms;
        let levels = self.config.levels()?;

        log::info!(
            "Starting I/V ({:?}) on {}: {} levels from {} to {} nA at {} C",
            self.config.pulse_mode,
            model,
            levels.len(),
            levels.first().copied().unwrap_or(0.0),
            levels.last().copied().unwrap_or(0.0),
            self.config.run.temperature_c
        );

        let mut results = Vec::with_capacity(levels.len());
        let mut traces = Vec::with_capacity(levels.len());
        let mut pulse_duration_ms = self.config.durations_ms[1];
        for level in levels {
            let (command, window) = self.config.command(level)?;
            let run = self.config.run.clone().with_tstop(window.tstop_ms);
            let trace = sim.run_current_clamp(model, &command, &run)?;
            ensure_time_base(&trace, dt, "membrane potential")?;

            let analysed = analyze_level(&trace, level, &window, self.config.spike_threshold_mv);
            log::debug!(
                "{:7.3} nA: rest {:.2} mV, steady {:.2} mV, {} spikes",
                level,
                analysed.rest_mv,
                analysed.steady_state_mv,
                analysed.spike_count
            );
            pulse_duration_ms = window.duration_ms;
            results.push(analysed);
            traces.push(trace);
        }

        let result = IvResult {
            levels: results,
            traces,
            pulse_duration_ms,
        };
        if let Some((slope, intercept)) = result.input_resistance() {
            log::info!(
                "Rin = {:7.1} MOhm  Tau = {:7.1} ms  Vm = {:7.1} mV",
                slope,
                result.membrane_tau_ms(),
                intercept
            );
        }
        Ok(result)
    }
}

/// Samples of `trace` between `from_ms` and `to_ms`, clipped to the recording
pub(crate) fn samples_between(trace: &ResponseTrace, from_ms: f64, to_ms: f64) -> &[f64] {
    let start = trace.index_of(from_ms).min(trace.len());
    let end = trace.index_of(to_ms).min(trace.len()).max(start);
    &trace.samples()[start..end]
}

/// First sample furthest from `reference`, NaN for no samples
pub(crate) fn furthest_from(samples: &[f64], reference: f64) -> f64 {
    samples.iter().copied().fold(f64::NAN, |best: f64, v| {
        if best.is_nan() || (v - reference).abs() > (best - reference).abs() {
            v
        } else {
            best
        }
    })
}

/// `(slope, intercept)` of the least-squares line through `points`
pub(crate) fn least_squares(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    let sxy: f64 = points.iter().map(|p| (p.0 - mean_x) * (p.1 - mean_y)).sum();
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

/// Reduce one current-clamp recording
fn analyze_level(
    trace: &ResponseTrace,
    current_na: f64,
    window: &InjectionWindow,
    threshold_mv: f64,
) -> IvLevel {
    let onset = window.onset_ms;
    let offset = onset + window.duration_ms;
    let rest_mv = trace.mean_between(0.0, window.rest_end_ms);
    let steady_state_mv =
        trace.mean_between(offset - STEADY_STATE_FRACTION * window.duration_ms, offset);

    let step = samples_between(trace, onset, offset);
    let dt = trace.time_step_ms();
    let peak_mv = furthest_from(step, rest_mv);

    let crossings: Vec<f64> = step
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] < threshold_mv && w[1] >= threshold_mv)
        .map(|(k, w)| (k as f64 + (threshold_mv - w[0]) / (w[1] - w[0])) * dt)
        .collect();

    let target = rest_mv + CHARGING_FRACTION * (steady_state_mv - rest_mv);
    let reached = if steady_state_mv < rest_mv {
        step.iter().position(|&v| v <= target)
    } else if steady_state_mv > rest_mv {
        step.iter().position(|&v| v >= target)
    } else {
        None
    };
    let charging_time_ms = reached.map_or(f64::NAN, |k| k as f64 * dt);

    IvLevel {
        current_na,
        rest_mv,
        steady_state_mv,
        peak_mv,
        spike_count: crossings.len(),
        first_spike_latency_ms: crossings.first().copied().unwrap_or(f64::NAN),
        charging_time_ms,
    }
}
