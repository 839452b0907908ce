//! Transmitter release statistics pooled across release sites

use crate::error::{ProbeError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Release attempts and successes at one site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SiteCounts {
    /// Stimulation-triggered release attempts
    pub requested_events: u64,
    /// Attempts that released transmitter
    pub released_events: u64,
}

/// Pooled release probability, `sum(released) / sum(requested)`
///
/// NaN when nothing was requested.
pub fn pooled_release_probability(sites: &[SiteCounts]) -> f64 {
    let requested: u64 = sites.iter().map(|s| s.requested_events).sum();
    let released: u64 = sites.iter().map(|s| s.released_events).sum();
    ratio(released, requested)
}

fn ratio(released: u64, requested: u64) -> f64 {
    if requested == 0 {
        f64::NAN
    } else {
        released as f64 / requested as f64
    }
}

/// Counters reported by one presynaptic terminal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SynapseRelease {
    /// Release zones in the terminal
    pub zones: u32,
    /// Presynaptic spikes that reached the terminal
    pub spikes: u32,
    /// Release events across all zones
    pub releases: u32,
}

impl SynapseRelease {
    /// Each spike requests release once per zone
    pub fn requests(&self) -> u64 {
        u64::from(self.spikes) * u64::from(self.zones)
    }

    /// Counts in the pooled form
    pub fn site_counts(&self) -> SiteCounts {
        SiteCounts {
            requested_events: self.requests(),
            released_events: u64::from(self.releases),
        }
    }
}

/// Release counts per synapse and in total
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReleaseSummary {
    /// Per-synapse counters, in input order
    pub synapses: Vec<SynapseRelease>,
    /// Release requests summed over synapses
    pub total_requests: u64,
    /// Releases summed over synapses
    pub total_releases: u64,
    /// `total_releases / total_requests`, NaN when nothing was requested
    pub release_probability: f64,
}

impl ReleaseSummary {
    /// Pool the counters of every synapse
    pub fn from_synapses(synapses: &[SynapseRelease]) -> Self {
        let sites: Vec<SiteCounts> = synapses.iter().map(SynapseRelease::site_counts).collect();
        let total_requests = sites.iter().map(|s| s.requested_events).sum();
        let total_releases = sites.iter().map(|s| s.released_events).sum();

        Self {
            synapses: synapses.to_vec(),
            total_requests,
            total_releases,
            release_probability: pooled_release_probability(&sites),
        }
    }
}

/// One release event at a terminal
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReleaseEvent {
    /// Time of release (ms)
    pub time_ms: f64,
    /// Delay from the presynaptic spike to release (ms)
    pub latency_ms: f64,
}

/// Counts over equal-width bins
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Histogram {
    /// `counts.len() + 1` bin edges in ascending order
    pub edges: Vec<f64>,
    /// Values per bin; the last bin includes its upper edge
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width bins spanning their range
    ///
    /// Non-finite values are skipped. A single distinct value is centred in
    /// a range of width one, and no values give the range `[0, 1]`.
    pub fn from_values(values: &[f64], bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(ProbeError::invalid_spec("bins", bins, ">= 1"));
        }

        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        let (mut lo, mut hi) = finite
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if finite.is_empty() {
            lo = 0.0;
            hi = 1.0;
        } else if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|k| lo + k as f64 * width).collect();
        let mut counts = vec![0; bins];
        for v in finite {
            let k = (((v - lo) / width).floor() as usize).min(bins - 1);
            counts[k] += 1;
        }

        Ok(Self { edges, counts })
    }

    /// Number of values binned
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Histogram of release latencies pooled over synapses
pub fn latency_histogram(timings: &[Vec<ReleaseEvent>], bins: usize) -> Result<Histogram> {
    let latencies: Vec<f64> = timings
        .iter()
        .flat_map(|events| events.iter().map(|e| e.latency_ms))
        .collect();
    Histogram::from_values(&latencies, bins)
}
