//! Run configuration and TOML persistence for protocol settings

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Settings shared by every simulator run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Bath temperature (degrees C)
    pub temperature_c: f64,

    /// Integration and sampling interval (ms)
    pub time_step_ms: f64,

    /// Simulated duration of one run (ms)
    pub tstop_ms: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            temperature_c: 34.0,
            time_step_ms: cnprobe_core::DEFAULT_TIME_STEP_MS,
            tstop_ms: 200.0,
        }
    }
}

impl RunConfig {
    /// Create a validated run configuration
    pub fn new(temperature_c: f64, time_step_ms: f64, tstop_ms: f64) -> Result<Self> {
        let config = Self {
            temperature_c,
            time_step_ms,
            tstop_ms,
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature_c: f64) -> Self {
        self.temperature_c = temperature_c;
        self
    }

    /// Set the time step
    pub fn with_time_step(mut self, time_step_ms: f64) -> Self {
        self.time_step_ms = time_step_ms;
        self
    }

    /// Set the run duration
    pub fn with_tstop(mut self, tstop_ms: f64) -> Self {
        self.tstop_ms = tstop_ms;
        self
    }

    /// Validate run settings
    pub fn validate(&self) -> Result<()> {
        if !self.temperature_c.is_finite() || self.temperature_c < -273.15 {
            return Err(ProtocolError::config(format!(
                "temperature must be a finite value above absolute zero, got {}",
                self.temperature_c
            )));
        }
        if !(self.time_step_ms.is_finite() && self.time_step_ms > 0.0) {
            return Err(ProtocolError::config(format!(
                "time step must be positive, got {}",
                self.time_step_ms
            )));
        }
        if !(self.tstop_ms.is_finite() && self.tstop_ms > 0.0) {
            return Err(ProtocolError::config(format!(
                "run duration must be positive, got {}",
                self.tstop_ms
            )));
        }
        Ok(())
    }

    /// Number of integration steps in one run
    pub fn steps(&self) -> usize {
        cnprobe_core::time::samples_in(self.tstop_ms, self.time_step_ms)
    }
}

/// Protocol settings stored as TOML
pub trait ConfigFile: Serialize + DeserializeOwned + Default {
    /// Check the loaded settings
    fn validate(&self) -> Result<()>;

    /// Load settings from `path`, or the defaults if it does not exist
    fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        ConfigFile::validate(&config)?;
        Ok(config)
    }

    /// Save settings to `path`, creating parent directories
    fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

impl ConfigFile for RunConfig {
    fn validate(&self) -> Result<()> {
        RunConfig::validate(self)
    }
}
