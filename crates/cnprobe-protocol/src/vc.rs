//! Voltage-clamp I/V curves
//!
//! The soma is held at a fixed potential, stepped to each command level and
//! returned to holding. Each clamp current recording is reduced to its
//! holding, peak and steady-state values.

use cnprobe_core::{levels_from_ranges, LevelRange, ResponseTrace, StepCommand};
use serde::{Deserialize, Serialize};

use crate::cells::ModelSpec;
use crate::config::{ConfigFile, RunConfig};
use crate::error::{ProtocolError, Result};
use crate::iv::{furthest_from, least_squares, samples_between, STEADY_STATE_FRACTION};
use crate::simulator::{ensure_time_base, Simulator};

/// Voltage-clamp protocol settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcConfig {
    /// Potential held before and after each step (mV)
    pub holding_mv: f64,
    /// Pre-step, step and post-step durations (ms)
    pub durations_ms: [f64; 3],
    /// Command levels (mV)
    pub ranges: Vec<LevelRange>,
    /// Temperature and time step; the run duration follows the durations
    pub run: RunConfig,
}

impl Default for VcConfig {
    fn default() -> Self {
        Self {
            holding_mv: -60.0,
            durations_ms: [10.0, 100.0, 20.0],
            ranges: vec![LevelRange {
                start: -120.0,
                stop: 40.0,
                step: 5.0,
            }],
            run: RunConfig::default().with_temperature(22.0),
        }
    }
}

impl VcConfig {
    /// Set the holding potential
    pub fn with_holding(mut self, holding_mv: f64) -> Self {
        self.holding_mv = holding_mv;
        self
    }

    /// Set the command ranges
    pub fn with_ranges(mut self, ranges: Vec<LevelRange>) -> Self {
        self.ranges = ranges;
        self
    }

    /// Set the run configuration
    pub fn with_run(mut self, run: RunConfig) -> Self {
        self.run = run;
        self
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if !self.holding_mv.is_finite() {
            return Err(ProtocolError::config("holding potential must be finite"));
        }
        if self.durations_ms.iter().any(|d| !(d.is_finite() && *d > 0.0)) {
            return Err(ProtocolError::config(format!(
                "step durations must be positive, got {:?}",
                self.durations_ms
            )));
        }
        self.run.validate()?;
        levels_from_ranges(&self.ranges)?;
        Ok(())
    }

    /// Every command level, ascending
    pub fn levels(&self) -> Result<Vec<f64>> {
        Ok(levels_from_ranges(&self.ranges)?)
    }
}

impl ConfigFile for VcConfig {
    fn validate(&self) -> Result<()> {
        VcConfig::validate(self)
    }
}

/// Clamp current at one command level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VcLevel {
    /// Command potential during the step (mV)
    pub command_mv: f64,
    /// Mean current before the step (nA)
    pub holding_current_na: f64,
    /// Current furthest from the holding current during the step (nA)
    pub peak_current_na: f64,
    /// Mean current over the end of the step (nA)
    pub steady_state_current_na: f64,
}

/// Results of a full voltage-clamp run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VcResult {
    /// One entry per level, ascending command
    pub levels: Vec<VcLevel>,
    /// Clamp current recorded at each level (nA)
    pub traces: Vec<ResponseTrace>,
    /// Duration of the step (ms)
    pub step_duration_ms: f64,
}

impl VcResult {
    /// `(command_mv, steady_state_current_na)` for every level
    pub fn steady_state_iv(&self) -> Vec<(f64, f64)> {
        self.levels
            .iter()
            .map(|l| (l.command_mv, l.steady_state_current_na))
            .collect()
    }

    /// `(command_mv, peak_current_na)` for every level
    pub fn peak_iv(&self) -> Vec<(f64, f64)> {
        self.levels
            .iter()
            .map(|l| (l.command_mv, l.peak_current_na))
            .collect()
    }

    /// Slope of the steady-state I/V over all levels (nS)
    pub fn conductance_ns(&self) -> Option<f64> {
        let points: Vec<(f64, f64)> = self
            .steady_state_iv()
            .into_iter()
            .filter(|(_, i)| i.is_finite())
            .collect();
        least_squares(&points).map(|(slope, _)| slope * 1000.0)
    }
}

/// Voltage-clamp protocol runner
#[derive(Debug, Clone)]
pub struct VcCurve {
    config: VcConfig,
}

impl VcCurve {
    /// Create a runner with validated settings
    pub fn new(config: VcConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Settings in use
    pub fn config(&self) -> &VcConfig {
        &self.config
    }

    /// Step the clamp through every level on `model`
    pub fn run<S: Simulator + ?Sized>(&self, sim: &mut S, model: &ModelSpec) -> Result<VcResult> {
        model.validate()?;

        let durations = self.config.durations_ms;
        let [pre, step, post] = durations;
        let dt = self.config.run.time_step_ms;
        let run = self.config.run.clone().with_tstop(pre + step + post);
        let levels = self.config.levels()?;

        log::info!(
            "Starting VC on {}: {} levels from {} to {} mV, holding {} mV",
            model,
            levels.len(),
            levels.first().copied().unwrap_or(0.0),
            levels.last().copied().unwrap_or(0.0),
            self.config.holding_mv
        );

        let mut results = Vec::with_capacity(levels.len());
        let mut traces = Vec::with_capacity(levels.len());
        for level in levels {
            let command = StepCommand::pulse(durations, self.config.holding_mv, level)?.build(dt)?;
            let trace = sim.run_voltage_clamp(model, &command, &run)?;
            ensure_time_base(&trace, dt, "clamp current")?;

            let analysed = analyze_level(&trace, level, pre, step);
            log::debug!(
                "{:7.1} mV: peak {:.3} nA, steady {:.3} nA",
                level,
                analysed.peak_current_na,
                analysed.steady_state_current_na
            );
            results.push(analysed);
            traces.push(trace);
        }

        let result = VcResult {
            levels: results,
            traces,
            step_duration_ms: step,
        };
        if let Some(g) = result.conductance_ns() {
            log::info!("Steady-state conductance = {:7.2} nS", g);
        }
        Ok(result)
    }
}

fn analyze_level(trace: &ResponseTrace, command_mv: f64, onset_ms: f64, step_ms: f64) -> VcLevel {
    let offset = onset_ms + step_ms;
    let holding_current_na = trace.mean_between(0.0, onset_ms);
    let steady_state_current_na =
        trace.mean_between(offset - STEADY_STATE_FRACTION * step_ms, offset);
    let peak_current_na = furthest_from(samples_between(trace, onset_ms, offset), holding_current_na);

    VcLevel {
        command_mv,
        holding_current_na,
        peak_current_na,
        steady_state_current_na,
    }
}
