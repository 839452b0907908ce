//! Simulator-driven protocols for cochlear nucleus cell models
//!
//! The protocols here decide what to play into a cell and how to read the
//! answer, while an external compartmental simulator does the integration
//! behind the [`Simulator`] trait. Settings are plain serde structs that can
//! be kept in TOML files; every run takes its temperature and time step from
//! an explicit [`RunConfig`].

#![deny(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod cells;
pub mod config;
pub mod error;
pub mod iv;
pub mod psd;
pub mod simulator;
pub mod vc;

// Re-export essential types
pub use cells::{catalog, AxonConfig, CatalogEntry, CellType, ModelSpec, SodiumChannel, Species};
pub use config::{ConfigFile, RunConfig};
pub use error::{ProtocolError, Result};
pub use iv::{IvConfig, IvCurve, IvLevel, IvResult, PulseMode};
pub use psd::{open_probability, total_current, OpenProbability, PsdRecording, Receptor, ReceptorPeak};
pub use simulator::{Simulator, SynapseRecording, SynapseTestRequest};
pub use synapse_test::{SynapseTest, SynapseTestConfig, SynapseTestResult};
pub use vc::{VcConfig, VcCurve, VcLevel, VcResult};
