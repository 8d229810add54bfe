//! YAML control file describing one simulation.
//!
//! ```yaml
//! sim_type: MMC
//! random_seed: 42
//! config:
//!   file: input.xyz
//!   type: sc
//!   box: [8, 8, 8]
//!   pbc: [1, 1, 1]
//! hamilton:
//!   type: heisenberg
//!   params: { Temp: 1.5, J: 1.0, H: [0.0, 0.0, 0.0] }
//! moves:
//!   spin_flip_3d: 1.0
//! time_control:
//!   total: 100000
//!   print: 1000
//! ```
//!
//! Unknown keys are rejected when parsing; semantic problems are collected
//! by [`ControlFile::validate`] and reported together.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::hamiltonian::HamiltonianKind;
use crate::lattice::LatticeType;
use crate::moves::MoveKind;
use crate::sampling::{TimeControl, DEFAULT_PERIOD};

pub const CONTROL_VERSION: u32 = 1;

/// Simulation flavors named in control files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimType {
    Metropolis,
    KineticMonteCarlo,
}

impl FromStr for SimType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MMC" => Ok(SimType::Metropolis),
            "KMC" => Ok(SimType::KineticMonteCarlo),
            other => Err(SimError::UnsupportedSimType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlFile {
    #[serde(default = "default_version")]
    pub version: u32,
    pub sim_type: String,
    #[serde(default = "default_seed")]
    pub random_seed: u64,
    pub config: ConfigSection,
    pub hamilton: HamiltonSection,
    pub moves: BTreeMap<String, f64>,
    pub time_control: TimeControlSection,
    #[serde(default)]
    pub output: OutputSection,
}

/// Starting configuration: read from `file`, or drawn at random when no file
/// is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(rename = "type")]
    pub lattice_type: String,
    #[serde(rename = "box")]
    pub dims: [usize; 3],
    #[serde(default = "default_pbc")]
    pub pbc: [u8; 3],
    #[serde(default = "default_n_vector")]
    pub n_vector: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HamiltonSection {
    #[serde(rename = "type")]
    pub kind: String,
    pub params: HamiltonParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HamiltonParams {
    #[serde(rename = "Temp")]
    pub temperature: f64,
    #[serde(rename = "J")]
    pub coupling: f64,
    #[serde(rename = "H", default)]
    pub field: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeControlSection {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default = "default_period")]
    pub print: u64,
    #[serde(default = "default_period")]
    pub save: u64,
    #[serde(default = "default_period")]
    pub measure: u64,
    #[serde(default)]
    pub verify: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
    #[serde(rename = "final", default)]
    pub final_config: Option<PathBuf>,
}

fn default_version() -> u32 {
    CONTROL_VERSION
}

fn default_seed() -> u64 {
    42
}

fn default_pbc() -> [u8; 3] {
    [1, 1, 1]
}

fn default_n_vector() -> usize {
    3
}

fn default_period() -> u64 {
    DEFAULT_PERIOD
}

pub fn read_control<P: AsRef<Path>>(path: P) -> Result<ControlFile> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let control: ControlFile = serde_yaml::from_reader(reader)?;
    Ok(control)
}

pub fn parse_control(text: &str) -> Result<ControlFile> {
    Ok(serde_yaml::from_str(text)?)
}

impl ControlFile {
    /// Check every field, returning all problems at once.
    ///
    /// A missing `time_control.total` is reported on its own as
    /// `MissingParameter`.
    pub fn validate(&self) -> Result<()> {
        if self.time_control.total.is_none() {
            return Err(SimError::MissingParameter("time_control.total"));
        }

        let mut problems = Vec::new();
        if self.version != CONTROL_VERSION {
            problems.push(format!(
                "unsupported control file version {}, expected {CONTROL_VERSION}",
                self.version
            ));
        }
        match self.sim_type.parse::<SimType>() {
            Ok(SimType::Metropolis) => {}
            Ok(SimType::KineticMonteCarlo) => {
                problems.push(SimError::UnsupportedSimType(self.sim_type.clone()).to_string())
            }
            Err(e) => problems.push(e.to_string()),
        }
        if let Err(e) = self.config.lattice_type.parse::<LatticeType>() {
            problems.push(e.to_string());
        }
        if self.config.dims.iter().any(|&d| d == 0) {
            problems.push(format!("config.box must be positive, got {:?}", self.config.dims));
        }
        if self.config.pbc.iter().any(|&p| p > 1) {
            problems.push(format!("config.pbc flags must be 0 or 1, got {:?}", self.config.pbc));
        }
        if !(1..=3).contains(&self.config.n_vector) {
            problems.push(SimError::InvalidNVector(self.config.n_vector).to_string());
        }

        if let Err(e) = self.hamilton.kind.parse::<HamiltonianKind>() {
            problems.push(e.to_string());
        }
        let params = &self.hamilton.params;
        if !(params.temperature.is_finite() && params.temperature > 0.0) {
            problems.push(format!(
                "hamilton.params.Temp must be positive and finite, got {}",
                params.temperature
            ));
        }
        if !params.coupling.is_finite() {
            problems.push(format!("hamilton.params.J must be finite, got {}", params.coupling));
        }
        if params.field.iter().any(|h| !h.is_finite()) {
            problems.push("hamilton.params.H entries must be finite".to_string());
        }

        if self.moves.is_empty() {
            problems.push("moves: at least one move type is required".to_string());
        }
        for (name, &weight) in &self.moves {
            if let Err(e) = name.parse::<MoveKind>() {
                problems.push(e.to_string());
            }
            if !weight.is_finite() || weight <= 0.0 {
                problems.push(format!("moves.{name} probability must be positive, got {weight}"));
            }
        }

        let tc = &self.time_control;
        for (name, period) in [("print", tc.print), ("save", tc.save), ("measure", tc.measure)] {
            if period == 0 {
                problems.push(format!("time_control.{name} must be at least 1"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SimError::InvalidControl(problems))
        }
    }

    pub fn time_control(&self) -> Result<TimeControl> {
        let tc = &self.time_control;
        let total = tc.total.ok_or(SimError::MissingParameter("time_control.total"))?;
        let time = TimeControl {
            total,
            print: tc.print,
            save: tc.save,
            measure: tc.measure,
            verify: tc.verify,
        };
        time.validate()?;
        Ok(time)
    }

    pub fn lattice_type(&self) -> Result<LatticeType> {
        self.config.lattice_type.parse()
    }

    pub fn boundary(&self) -> [bool; 3] {
        self.config.pbc.map(|p| p == 1)
    }
}
