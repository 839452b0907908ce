//! Registry of the cochlear nucleus cell models a simulator can build
//!
//! Names parse from and print to the short lowercase identifiers used in
//! model configuration files (`"bushy"`, `"guineapig"`, `"waxon"`, ...).
//! Construction itself belongs to the simulator; this module only describes
//! which cell is wanted and checks that the combination is one the models
//! provide.

use std::fmt;
use std::str::FromStr;

use cnprobe_core::LevelRange;
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::{ProtocolError, Result};
use crate::iv::IvConfig;

/// Cell model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    /// Bushy cell
    Bushy,
    /// T-stellate cell
    Stellate,
    /// T-stellate cell with Nav1.1 sodium channels
    StellateNav11,
    /// T-stellate cell with dendrites
    StelDend,
    /// D-stellate cell
    DStellate,
    /// D-stellate cell, eager variant
    DStellateEager,
    /// Spiral ganglion cell
    Sgc,
    /// DCN cartwheel cell
    Cartwheel,
    /// DCN pyramidal cell
    Pyramidal,
    /// Octopus cell
    Octopus,
    /// DCN tuberculoventral cell
    Tuberculoventral,
}

impl CellType {
    /// Every registered cell type
    pub const ALL: [CellType; 11] = [
        CellType::Bushy,
        CellType::Stellate,
        CellType::StellateNav11,
        CellType::StelDend,
        CellType::DStellate,
        CellType::DStellateEager,
        CellType::Sgc,
        CellType::Cartwheel,
        CellType::Pyramidal,
        CellType::Octopus,
        CellType::Tuberculoventral,
    ];

    /// Configuration name
    pub fn name(&self) -> &'static str {
        match self {
            CellType::Bushy => "bushy",
            CellType::Stellate => "stellate",
            CellType::StellateNav11 => "stellatenav11",
            CellType::StelDend => "steldend",
            CellType::DStellate => "dstellate",
            CellType::DStellateEager => "dstellateeager",
            CellType::Sgc => "sgc",
            CellType::Cartwheel => "cartwheel",
            CellType::Pyramidal => "pyramidal",
            CellType::Octopus => "octopus",
            CellType::Tuberculoventral => "tuberculoventral",
        }
    }

    /// Current-clamp step ranges (nA) suited to the cell's input resistance
    ///
    /// Several ranges give finer steps near rest.
    pub fn default_iv_ranges(&self) -> Vec<LevelRange> {
        let ranges: &[(f64, f64, f64)] = match self {
            CellType::Bushy => &[(-0.5, 0.5, 0.025)],
            CellType::Stellate => &[(-0.2, 0.2, 0.02), (-0.015, 0.0, 0.005)],
            CellType::StellateNav11 => &[(-0.5, 1.0, 0.1)],
            CellType::StelDend => &[(-1.0, 1.0, 0.1)],
            CellType::DStellate => &[(-0.2, 0.2, 0.0125)],
            CellType::DStellateEager => &[(-0.6, 1.0, 0.025)],
            CellType::Sgc => &[(-0.3, 0.3, 0.01)],
            CellType::Cartwheel => &[(-0.2, 0.1, 0.02)],
            CellType::Pyramidal => &[(-0.3, 0.3, 0.025), (-0.040, 0.025, 0.005)],
            CellType::Tuberculoventral => &[(-0.35, 0.6, 0.02)],
            CellType::Octopus => &[(-3.0, 3.0, 0.2)],
        };
        ranges
            .iter()
            .map(|&(start, stop, step)| LevelRange { start, stop, step })
            .collect()
    }

    /// Sodium channel the model is always built with, if it has no choice
    pub fn fixed_sodium_channel(&self) -> Option<SodiumChannel> {
        match self {
            CellType::Octopus => Some(SodiumChannel::Jsrna),
            CellType::StellateNav11 => Some(SodiumChannel::Nav11),
            _ => None,
        }
    }

    /// Species the model is only available for, if any
    pub fn fixed_species(&self) -> Option<Species> {
        match self {
            CellType::Tuberculoventral => Some(Species::Mouse),
            _ => None,
        }
    }

    /// Axon configurations the model can be built with
    pub fn axon_configs(&self) -> &'static [AxonConfig] {
        match self {
            CellType::Bushy | CellType::Octopus => &[AxonConfig::Std, AxonConfig::Waxon],
            CellType::StelDend => &[AxonConfig::Std, AxonConfig::Dendrite],
            _ => &[AxonConfig::Std],
        }
    }

    /// Conditioning current (nA) held before each I/V step, for models
    /// characterised with one
    pub fn default_prepulse_na(&self) -> Option<f64> {
        match self {
            CellType::Pyramidal => Some(-0.25),
            _ => None,
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CellType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        CellType::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProtocolError::UnknownCellType(s.to_string()))
    }
}

/// Species whose channel kinetics parameterise a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    /// Guinea pig
    #[default]
    GuineaPig,
    /// Cat
    Cat,
    /// Rat
    Rat,
    /// Mouse
    Mouse,
}

impl Species {
    /// Every registered species
    pub const ALL: [Species; 4] = [Species::GuineaPig, Species::Cat, Species::Rat, Species::Mouse];

    /// Configuration name
    pub fn name(&self) -> &'static str {
        match self {
            Species::GuineaPig => "guineapig",
            Species::Cat => "cat",
            Species::Rat => "rat",
            Species::Mouse => "mouse",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Species {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Species::ALL
            .iter()
            .copied()
            .find(|sp| sp.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProtocolError::UnknownSpecies(s.to_string()))
    }
}

/// Axon and dendrite morphology options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxonConfig {
    /// Soma only
    #[default]
    Std,
    /// Soma with an axon
    Waxon,
    /// Soma with dendrites
    Dendrite,
}

impl AxonConfig {
    /// Configuration name
    pub fn name(&self) -> &'static str {
        match self {
            AxonConfig::Std => "std",
            AxonConfig::Waxon => "waxon",
            AxonConfig::Dendrite => "dendrite",
        }
    }
}

impl fmt::Display for AxonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AxonConfig {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        [AxonConfig::Std, AxonConfig::Waxon, AxonConfig::Dendrite]
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProtocolError::UnknownOption {
                kind: "axon configuration",
                name: s.to_string(),
            })
    }
}

/// Sodium channel kinetics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SodiumChannel {
    /// Model default
    #[default]
    Std,
    /// Jason Rothman's sodium channel
    Jsrna,
    /// Nav1.1
    Nav11,
}

impl SodiumChannel {
    /// Configuration name
    pub fn name(&self) -> &'static str {
        match self {
            SodiumChannel::Std => "std",
            SodiumChannel::Jsrna => "jsrna",
            SodiumChannel::Nav11 => "nav11",
        }
    }
}

impl fmt::Display for SodiumChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SodiumChannel {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        [SodiumChannel::Std, SodiumChannel::Jsrna, SodiumChannel::Nav11]
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProtocolError::UnknownOption {
                kind: "sodium channel",
                name: s.to_string(),
            })
    }
}

/// Everything a simulator needs to build one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Cell model family
    pub cell_type: CellType,
    /// Species parameter set
    pub species: Species,
    /// Model variant within the family (e.g. `"II"`, `"I-c"`), model default if unset
    pub model_type: Option<String>,
    /// Morphology option
    pub axon: AxonConfig,
    /// Sodium channel kinetics
    pub sodium: SodiumChannel,
    /// Block sodium channels
    pub ttx: bool,
}

impl ModelSpec {
    /// Default configuration of `cell_type`
    pub fn new(cell_type: CellType) -> Self {
        Self {
            cell_type,
            species: cell_type.fixed_species().unwrap_or_default(),
            model_type: None,
            axon: AxonConfig::Std,
            sodium: cell_type.fixed_sodium_channel().unwrap_or_default(),
            ttx: false,
        }
    }

    /// Set the species
    pub fn with_species(mut self, species: Species) -> Self {
        self.species = species;
        self
    }

    /// Set the model variant
    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = Some(model_type.into());
        self
    }

    /// Set the morphology option
    pub fn with_axon(mut self, axon: AxonConfig) -> Self {
        self.axon = axon;
        self
    }

    /// Set the sodium channel
    pub fn with_sodium(mut self, sodium: SodiumChannel) -> Self {
        self.sodium = sodium;
        self
    }

    /// Block or unblock sodium channels
    pub fn with_ttx(mut self, ttx: bool) -> Self {
        self.ttx = ttx;
        self
    }

    /// Reject combinations no model provides
    pub fn validate(&self) -> Result<()> {
        if !self.cell_type.axon_configs().contains(&self.axon) {
            return Err(ProtocolError::config(format!(
                "cell type {} is not available with axon configuration {}",
                self.cell_type, self.axon
            )));
        }
        if let Some(species) = self.cell_type.fixed_species() {
            if species != self.species {
                return Err(ProtocolError::config(format!(
                    "cell type {} is only available for {}",
                    self.cell_type, species
                )));
            }
        }
        if let Some(sodium) = self.cell_type.fixed_sodium_channel() {
            if sodium != self.sodium {
                return Err(ProtocolError::config(format!(
                    "cell type {} always uses the {} sodium channel",
                    self.cell_type, sodium
                )));
            }
        }
        if matches!(self.model_type.as_deref(), Some(t) if t.trim().is_empty()) {
            return Err(ProtocolError::config("model type must not be empty"));
        }
        Ok(())
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cell_type)?;
        if let Some(model_type) = &self.model_type {
            write!(f, ", {}", model_type)?;
        }
        write!(f, " ({})", self.species)
    }
}

/// A reference cell configuration for excitability surveys
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Display label
    pub label: &'static str,
    /// Cell to build
    pub model: ModelSpec,
    /// Current injection levels (nA)
    pub injections: LevelRange,
    /// Temperature the model was characterised at (degrees C)
    pub temperature_c: f64,
}

impl CatalogEntry {
    /// Current-clamp settings reproducing this entry
    pub fn iv_config(&self) -> IvConfig {
        IvConfig {
            ranges: vec![self.injections],
            run: RunConfig::default().with_temperature(self.temperature_c),
            ..IvConfig::for_cell(self.model.cell_type)
        }
    }
}

/// Standard model configurations with their injection ranges and temperatures
///
/// Rothman and Manis models are characterised at 22 degrees C, the rest at 34.
pub fn catalog() -> Vec<CatalogEntry> {
    use CellType::*;
    use Species::*;

    let entry = |label: &'static str,
                 cell_type: CellType,
                 model_type: &str,
                 species: Species,
                 (lo, hi, n): (f64, f64, usize),
                 temperature_c: f64| {
        let model = ModelSpec::new(cell_type)
            .with_species(species)
            .with_model_type(model_type);
        CatalogEntry {
            label,
            model,
            injections: LevelRange {
                start: lo,
                stop: hi,
                step: (hi - lo) / (n - 1) as f64,
            },
            temperature_c,
        }
    };

    vec![
        entry("Bushy, II", Bushy, "II", GuineaPig, (-0.5, 0.5, 11), 22.0),
        entry("Bushy, II-I", Bushy, "II-I", GuineaPig, (-0.5, 0.5, 11), 22.0),
        entry("DStellate, I-II", DStellate, "I-II", GuineaPig, (-0.3, 0.3, 9), 22.0),
        entry("TStellate, I-c", Stellate, "I-c", GuineaPig, (-0.15, 0.15, 9), 22.0),
        entry("TStellate, I-t", Stellate, "I-t", GuineaPig, (-0.15, 0.15, 9), 22.0),
        entry("Octopus, II-o", Octopus, "II-o", GuineaPig, (-2.5, 2.5, 11), 22.0),
        entry("Bushy, II, Mouse", Bushy, "II", Mouse, (-1.0, 1.2, 13), 34.0),
        entry("TStellate, I-c, Mouse", Stellate, "I-c", Mouse, (-1.0, 1.0, 9), 34.0),
        entry("DStellate, I-II, Mouse", DStellate, "I-II", Mouse, (-0.5, 0.5, 9), 34.0),
        entry("Pyramidal, I, Rat", Pyramidal, "I", Rat, (-0.3, 0.4, 11), 34.0),
        entry("Cartwheel, I, Mouse", Cartwheel, "I", Mouse, (-0.5, 0.5, 9), 34.0),
        entry("Tuberculoventral, I, Mouse", Tuberculoventral, "I", Mouse, (-0.35, 1.0, 11), 34.0),
        entry("SGC, bm, Mouse", Sgc, "bm", Mouse, (-0.2, 0.6, 9), 34.0),
        entry("SGC, a, Mouse", Sgc, "a", Mouse, (-0.2, 0.6, 9), 34.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_type_names_round_trip() {
        for cell in CellType::ALL {
            assert_eq!(cell.to_string().parse::<CellType>().unwrap(), cell);
        }
        assert_eq!("Bushy".parse::<CellType>().unwrap(), CellType::Bushy);
        assert!(matches!(
            "purkinje".parse::<CellType>(),
            Err(ProtocolError::UnknownCellType(name)) if name == "purkinje"
        ));
    }

    #[test]
    fn test_species_and_options_parse() {
        assert_eq!("guineapig".parse::<Species>().unwrap(), Species::GuineaPig);
        assert!(matches!("human".parse::<Species>(), Err(ProtocolError::UnknownSpecies(_))));
        assert_eq!("waxon".parse::<AxonConfig>().unwrap(), AxonConfig::Waxon);
        assert_eq!("nav11".parse::<SodiumChannel>().unwrap(), SodiumChannel::Nav11);
        assert!("na".parse::<SodiumChannel>().is_err());
    }

    #[test]
    fn test_default_iv_ranges_are_valid() {
        for cell in CellType::ALL {
            let ranges = cell.default_iv_ranges();
            assert!(!ranges.is_empty());
            assert!(cnprobe_core::levels_from_ranges(&ranges).is_ok(), "{}", cell);
        }
        let bushy = cnprobe_core::levels_from_ranges(&CellType::Bushy.default_iv_ranges()).unwrap();
        assert_eq!(bushy.len(), 41);
    }

    #[test]
    fn test_model_spec_defaults_follow_fixed_choices() {
        let octopus = ModelSpec::new(CellType::Octopus);
        assert_eq!(octopus.sodium, SodiumChannel::Jsrna);
        assert!(octopus.validate().is_ok());

        let tv = ModelSpec::new(CellType::Tuberculoventral);
        assert_eq!(tv.species, Species::Mouse);
        assert!(tv.clone().with_species(Species::Cat).validate().is_err());
    }

    #[test]
    fn test_model_spec_axon_configs() {
        assert!(ModelSpec::new(CellType::Bushy).with_axon(AxonConfig::Waxon).validate().is_ok());
        assert!(ModelSpec::new(CellType::Bushy).with_axon(AxonConfig::Dendrite).validate().is_err());
        assert!(ModelSpec::new(CellType::Sgc).with_axon(AxonConfig::Waxon).validate().is_err());
        assert!(ModelSpec::new(CellType::StelDend)
            .with_axon(AxonConfig::Dendrite)
            .validate()
            .is_ok());
        assert!(ModelSpec::new(CellType::Octopus)
            .with_sodium(SodiumChannel::Std)
            .validate()
            .is_err());
    }

    #[test]
    fn test_every_axon_config_has_a_model() {
        for axon in [AxonConfig::Std, AxonConfig::Waxon, AxonConfig::Dendrite] {
            assert!(
                CellType::ALL.iter().any(|c| c.axon_configs().contains(&axon)),
                "{}",
                axon
            );
        }
    }

    #[test]
    fn test_prepulse_only_for_pyramidal() {
        assert_eq!(CellType::Pyramidal.default_prepulse_na(), Some(-0.25));
        assert!(CellType::ALL
            .iter()
            .filter(|&&c| c != CellType::Pyramidal)
            .all(|c| c.default_prepulse_na().is_none()));
    }

    #[test]
    fn test_model_spec_display() {
        let spec = ModelSpec::new(CellType::Bushy).with_model_type("II");
        assert_eq!(spec.to_string(), "bushy, II (guineapig)");
    }

    #[test]
    fn test_catalog_entries_are_valid() {
        let entries = catalog();
        assert_eq!(entries.len(), 14);
        for entry in &entries {
            assert!(entry.model.validate().is_ok(), "{}", entry.label);
            assert!(entry.iv_config().validate().is_ok(), "{}", entry.label);
        }

        let bushy = &entries[0];
        let levels = bushy.injections.levels();
        assert_eq!(levels.len(), 11);
        assert_eq!(bushy.iv_config().run.temperature_c, 22.0);
    }
}
