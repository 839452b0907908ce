//! Error handling for simulator-driven protocols

use cnprobe_core::ProbeError;
use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Protocol-level errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Stimulus or analysis error from the core
    #[error("Analysis error: {0}")]
    Probe(#[from] ProbeError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration file
    #[error("Serialization error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Cell type name not in the registry
    #[error("Unknown cell type: {0}")]
    UnknownCellType(String),

    /// Species name not in the registry
    #[error("Unknown species: {0}")]
    UnknownSpecies(String),

    /// Axon configuration or sodium channel name not in the registry
    #[error("Unknown {kind}: {name}")]
    UnknownOption {
        /// Which option was being parsed
        kind: &'static str,
        /// Name that failed to parse
        name: String,
    },

    /// Failure reported by the simulator
    #[error("Simulator error: {reason}")]
    Simulator {
        /// Reason given by the simulator
        reason: String,
    },

    /// A recording the protocol needs was not returned
    #[error("Missing recording: {what}")]
    MissingRecording {
        /// Description of the missing data
        what: String,
    },
}

impl ProtocolError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a simulator error
    pub fn simulator(reason: impl Into<String>) -> Self {
        Self::Simulator {
            reason: reason.into(),
        }
    }

    /// Create a missing recording error
    pub fn missing_recording(what: impl Into<String>) -> Self {
        Self::MissingRecording { what: what.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_error_conversion() {
        let err: ProtocolError = ProbeError::invalid_spec("frequency_hz", 0.0, "> 0").into();
        assert!(matches!(err, ProtocolError::Probe(_)));
        assert!(err.to_string().contains("frequency_hz"));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ProtocolError::missing_recording("release counts").to_string(),
            "Missing recording: release counts"
        );
        assert_eq!(
            ProtocolError::UnknownOption { kind: "axon configuration", name: "tail".into() }.to_string(),
            "Unknown axon configuration: tail"
        );
    }
}
