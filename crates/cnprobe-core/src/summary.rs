//! NaN-aware descriptive statistics over event features

use std::ops::Range;

use crate::events::EventRecord;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mean of the non-NaN values, NaN if there are none
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Population standard deviation of the non-NaN values, NaN if there are none
pub fn nan_std(values: &[f64]) -> f64 {
    let mean = nan_mean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let (sq, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sq, n), v| (sq + (v - mean).powi(2), n + 1));
    (sq / n as f64).sqrt()
}

/// Mean and spread of one feature
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureStats {
    /// NaN-aware mean
    pub mean: f64,
    /// NaN-aware population standard deviation
    pub std: f64,
}

impl FeatureStats {
    fn of(values: &[f64]) -> Self {
        Self {
            mean: nan_mean(values),
            std: nan_std(values),
        }
    }
}

/// Rise time, latency and half-width statistics over a group of pulses
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindowStats {
    /// 20-80% rise time (ms)
    pub rise_time: FeatureStats,
    /// 20% latency (ms)
    pub latency_20pct: FeatureStats,
    /// Half-width (ms)
    pub half_width: FeatureStats,
}

impl WindowStats {
    /// Statistics over `events`
    pub fn from_events(events: &[EventRecord]) -> Self {
        let column = |f: fn(&EventRecord) -> f64| events.iter().map(f).collect::<Vec<_>>();
        Self {
            rise_time: FeatureStats::of(&column(|e| e.rise_time_ms)),
            latency_20pct: FeatureStats::of(&column(|e| e.latency_20pct)),
            half_width: FeatureStats::of(&column(|e| e.half_width_ms)),
        }
    }
}

/// Which pulses count as early and late in a train
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SummaryWindows {
    /// Pulses from the start of the train
    pub early_pulses: usize,
    /// Pulses from the end of the train
    pub late_pulses: usize,
}

impl Default for SummaryWindows {
    fn default() -> Self {
        Self {
            early_pulses: 2,
            late_pulses: 10,
        }
    }
}

impl SummaryWindows {
    fn early(&self, n: usize) -> Range<usize> {
        0..self.early_pulses.min(n)
    }

    fn late(&self, n: usize) -> Range<usize> {
        n.saturating_sub(self.late_pulses)..n
    }
}

/// Feature statistics at the start and at the end of a pulse train
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventSummary {
    /// Statistics over the first pulses
    pub early: WindowStats,
    /// Statistics over the last pulses
    pub late: WindowStats,
}

impl EventSummary {
    /// Summarise a train's events; windows are clipped to the train length
    pub fn from_events(events: &[EventRecord], windows: &SummaryWindows) -> Self {
        let n = events.len();
        Self {
            early: WindowStats::from_events(&events[windows.early(n)]),
            late: WindowStats::from_events(&events[windows.late(n)]),
        }
    }
}
