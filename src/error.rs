//! Error type shared by every layer of the simulation.
//!
//! Nothing in here is recovered automatically: construction and setup
//! routines return these errors before the Metropolis loop starts, and the
//! loop itself only fails on I/O or on a broken energy invariant.

use crate::lattice::{LatticeType, Site};

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(thiserror::Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cannot parse control file")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed or truncated extended-XYZ input.
    #[error("xyz line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Every problem found while validating a control file.
    #[error("invalid control file:\n  - {}", .0.join("\n  - "))]
    InvalidControl(Vec<String>),

    #[error("{field} mismatch: declared {expected}, found {found}")]
    ConfigMismatch {
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("lattice type `{lattice}` is not supported by {component}")]
    UnsupportedLattice {
        lattice: LatticeType,
        component: &'static str,
    },

    #[error("non-periodic boundaries {0:?} are not supported, every axis must be periodic")]
    UnsupportedBoundary([bool; 3]),

    #[error("unsupported move type `{0}`")]
    UnsupportedMove(String),

    #[error("unsupported hamiltonian `{0}`")]
    UnsupportedHamiltonian(String),

    #[error("unsupported simulation type `{0}`")]
    UnsupportedSimType(String),

    #[error("n_vector must be 1, 2 or 3, got {0}")]
    InvalidNVector(usize),

    #[error("spin at {site:?} has magnitude {magnitude}, expected 1")]
    SpinNotNormalized { site: Site, magnitude: f64 },

    #[error("site {site:?} outside box {dims:?}")]
    OutOfBounds { site: [usize; 3], dims: [usize; 3] },

    /// `accept` was handed a proposal that is not the one last passed to
    /// `energy_delta`.
    #[error("accepted proposal does not match the last evaluated proposal")]
    ProposalMismatch,

    #[error("energy drift: cached {cached}, recomputed {recomputed}")]
    EnergyDrift { cached: f64, recomputed: f64 },

    #[error("invalid driver state: {0}")]
    InvalidState(String),

    #[error("snapshot writer: {0}")]
    Snapshot(String),
}
