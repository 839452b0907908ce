//! Postsynaptic density recordings and their aggregation

use cnprobe_core::ResponseTrace;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Receptor population of one postsynaptic density
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Receptor {
    /// Glutamatergic, AMPA receptors
    Ampa,
    /// Glutamatergic, NMDA receptors
    Nmda,
    /// Glycinergic
    Glycine,
}

/// Current and open probability recorded from one postsynaptic density
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsdRecording {
    /// Receptor population
    pub receptor: Receptor,
    /// Current through the receptors (nA)
    pub current: ResponseTrace,
    /// Fraction of receptors in an open state
    pub open_probability: ResponseTrace,
}

/// Total postsynaptic current, summed over every recorded density
pub fn total_current(psds: &[PsdRecording]) -> Result<ResponseTrace> {
    if psds.is_empty() {
        return Err(ProtocolError::missing_recording("postsynaptic density currents"));
    }
    let currents: Vec<ResponseTrace> = psds.iter().map(|p| p.current.clone()).collect();
    Ok(ResponseTrace::sum(&currents)?)
}

/// Largest current and open probability seen at one receptor population
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceptorPeak {
    /// Peak absolute current (nA)
    pub current_max: f64,
    /// Peak open probability
    pub open_max: f64,
}

impl ReceptorPeak {
    fn of(psd: &PsdRecording) -> Self {
        Self {
            current_max: psd.current.max_abs(),
            open_max: psd.open_probability.max_abs(),
        }
    }
}

/// Peak receptor activation at a synapse
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OpenProbability {
    /// AMPA and NMDA peaks from the first density pair that carried current
    Glutamatergic {
        /// AMPA receptor peaks
        ampa: ReceptorPeak,
        /// NMDA receptor peaks
        nmda: ReceptorPeak,
    },
    /// Peaks over all glycine receptor densities
    Glycinergic {
        /// Glycine receptor peaks
        glycine: ReceptorPeak,
    },
}

impl OpenProbability {
    /// NMDA share of the peak glutamatergic current, `N / (N + A)`
    ///
    /// `None` for glycinergic synapses or when no current flowed.
    pub fn nmda_fraction(&self) -> Option<f64> {
        match self {
            OpenProbability::Glutamatergic { ampa, nmda } => {
                let total = nmda.current_max + ampa.current_max;
                (total != 0.0).then(|| nmda.current_max / total)
            }
            OpenProbability::Glycinergic { .. } => None,
        }
    }
}

/// Peak receptor activation, if the densities allow one to be reported
///
/// Glutamatergic synapses pair AMPA and NMDA densities in recording order
/// and report the first pair with non-zero current; all-zero pairs (release
/// failures) report zero peaks. Synapses without NMDA densities report
/// glycine receptors if there are any, and `None` otherwise.
pub fn open_probability(psds: &[PsdRecording]) -> Option<OpenProbability> {
    let of = |receptor: Receptor| psds.iter().filter(move |p| p.receptor == receptor);

    if of(Receptor::Nmda).next().is_some() {
        let (ampa, nmda) = of(Receptor::Ampa)
            .zip(of(Receptor::Nmda))
            .map(|(a, n)| (ReceptorPeak::of(a), ReceptorPeak::of(n)))
            .find(|(a, n)| a.current_max != 0.0 || n.current_max != 0.0)
            .unwrap_or_default();
        return Some(OpenProbability::Glutamatergic { ampa, nmda });
    }

    let mut glycine = of(Receptor::Glycine).map(ReceptorPeak::of).peekable();
    glycine.peek()?;
    let glycine = glycine.fold(ReceptorPeak::default(), |acc, p| ReceptorPeak {
        current_max: acc.current_max.max(p.current_max),
        open_max: acc.open_max.max(p.open_max),
    });
    Some(OpenProbability::Glycinergic { glycine })
}
