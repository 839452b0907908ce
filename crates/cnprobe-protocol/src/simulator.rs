//! Boundary to the external compartmental simulator
//!
//! Protocols never touch simulator state directly. They hand a [`Simulator`]
//! fully sampled command waveforms plus an explicit [`RunConfig`], and get
//! back owned recordings once the run has finished.

use cnprobe_core::{ReleaseEvent, ResponseTrace, SynapseRelease, Waveform};
use serde::{Deserialize, Serialize};

use crate::cells::ModelSpec;
use crate::config::RunConfig;
use crate::error::{ProtocolError, Result};
use crate::psd::PsdRecording;

/// Everything needed to run one synapse test
#[derive(Debug, Clone, PartialEq)]
pub struct SynapseTestRequest {
    /// Presynaptic cell
    pub pre: ModelSpec,
    /// Postsynaptic cell
    pub post: ModelSpec,
    /// Synapses connecting the two cells
    pub n_synapses: usize,
    /// Current command played into the presynaptic soma (nA)
    pub presynaptic_command: Waveform,
    /// Voltage clamp command for the postsynaptic soma (mV)
    pub postsynaptic_clamp: Waveform,
    /// Temperature, time step and duration
    pub run: RunConfig,
}

/// Snapshot of everything recorded during a synapse test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseRecording {
    /// Presynaptic somatic membrane potential (mV)
    pub presynaptic_voltage: ResponseTrace,
    /// One recording per postsynaptic density, across all synapses
    pub psds: Vec<PsdRecording>,
    /// Release counters, one per synapse
    pub release: Vec<SynapseRelease>,
    /// Release timings, one list per synapse
    pub release_events: Vec<Vec<ReleaseEvent>>,
    /// Release probability of the first terminal at the end of the run, if the
    /// release model exposes its depression and facilitation state
    #[serde(default)]
    pub final_release_probability: Option<f64>,
}

/// An engine that builds cell models and integrates them
pub trait Simulator {
    /// Connect `pre` to `post`, drive the presynaptic cell and clamp the
    /// postsynaptic one
    fn run_synapse_test(&mut self, request: &SynapseTestRequest) -> Result<SynapseRecording>;

    /// Inject `command` (nA) into the soma of `model` and record its membrane
    /// potential (mV)
    fn run_current_clamp(
        &mut self,
        model: &ModelSpec,
        command: &Waveform,
        run: &RunConfig,
    ) -> Result<ResponseTrace>;

    /// Clamp the soma of `model` to `command` (mV) and record the clamp
    /// current (nA)
    fn run_voltage_clamp(
        &mut self,
        model: &ModelSpec,
        command: &Waveform,
        run: &RunConfig,
    ) -> Result<ResponseTrace>;
}

/// Reject a recording the simulator sampled on another time base
pub(crate) fn ensure_time_base(trace: &ResponseTrace, time_step_ms: f64, what: &str) -> Result<()> {
    if trace.same_time_base(time_step_ms) {
        Ok(())
    } else {
        Err(ProtocolError::simulator(format!(
            "{} sampled at {} ms, expected {} ms",
            what,
            trace.time_step_ms(),
            time_step_ms
        )))
    }
}
