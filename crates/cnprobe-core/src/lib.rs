//! Stimulus construction and postsynaptic event analysis for neuron model protocols
//!
//! This crate holds the simulator-independent part of a synapse test: turning
//! a declarative pulse train into a sampled command waveform, and turning the
//! recorded postsynaptic current back into per-pulse event features and
//! release statistics. Everything here is a pure function over owned
//! snapshots; the simulator itself lives behind the boundary defined in
//! `cnprobe-protocol`.

#![deny(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod crossing;
pub mod error;
pub mod events;
pub mod release;
pub mod stimulus;
pub mod summary;
pub mod time;
pub mod trace;

// Re-export essential types
pub use crossing::{find_crossing, Direction};
pub use error::{ProbeError, Result};
pub use events::{
    extract_events, extract_events_batch, extract_events_with, EventExtractor, EventRecord,
    ExtractionParams,
};
pub use release::{
    latency_histogram, pooled_release_probability, Histogram, ReleaseEvent, ReleaseSummary,
    SiteCounts, SynapseRelease,
};
pub use stimulus::{
    build_waveform, levels_from_ranges, LevelRange, StepCommand, StepSegment, StimulusSpec,
    Waveform,
};
pub use summary::{nan_mean, nan_std, EventSummary, FeatureStats, SummaryWindows, WindowStats};
pub use trace::ResponseTrace;

/// Default simulation time step (ms)
pub const DEFAULT_TIME_STEP_MS: f64 = 0.025;
