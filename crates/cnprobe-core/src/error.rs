//! Error types for the analysis core

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors that can occur while building stimuli or analysing traces
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// Malformed stimulus or analysis parameters
    #[error("Invalid spec parameter {parameter}: {value} (expected {constraint})")]
    InvalidSpec {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Malformed response trace
    #[error("Invalid trace: {reason}")]
    InvalidTrace {
        /// Reason the trace was rejected
        reason: String,
    },

    /// Traces that cannot be combined
    #[error("Trace mismatch: {reason}")]
    TraceMismatch {
        /// Reason for the mismatch
        reason: String,
    },
}

impl ProbeError {
    /// Create an invalid spec error
    pub fn invalid_spec(
        parameter: impl Into<String>,
        value: impl ToString,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidSpec {
            parameter: parameter.into(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    /// Create an invalid trace error
    pub fn invalid_trace(reason: impl Into<String>) -> Self {
        Self::InvalidTrace {
            reason: reason.into(),
        }
    }

    /// Create a trace mismatch error
    pub fn trace_mismatch(reason: impl Into<String>) -> Self {
        Self::TraceMismatch {
            reason: reason.into(),
        }
    }

    /// True for malformed stimulus or analysis parameters
    pub fn is_invalid_spec(&self) -> bool {
        matches!(self, Self::InvalidSpec { .. })
    }
}

/// Reject values that are not strictly positive and finite
pub(crate) fn ensure_positive(parameter: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ProbeError::invalid_spec(parameter, value, "> 0"))
    }
}

/// Reject values that are negative or not finite
pub(crate) fn ensure_non_negative(parameter: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ProbeError::invalid_spec(parameter, value, ">= 0"))
    }
}
