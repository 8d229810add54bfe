//! Rust SpinMC - Metropolis Monte Carlo for classical spin lattices
//!
//! This crate samples Ising (n = 1), XY (n = 2) and Heisenberg (n = 3)
//! spin models on periodic simple cubic boxes. Energies are cached per site
//! and updated incrementally after every accepted single-site move.

pub mod error;
pub mod hamiltonian;
pub mod io;
pub mod lattice;
pub mod moves;
pub mod sampling;
pub mod setup;

// Re-export commonly used types at crate root
pub use error::{Result, SimError};
pub use hamiltonian::{EnergyDecomposition, HamiltonianKind, Heisenberg, Magnetization, SpinHamiltonian};
pub use io::{parse_control, read_control, read_xyz, write_xyz, ControlFile};
pub use lattice::{random_config, uniform_config, LatticeConfig, LatticeType, Site};
pub use moves::{random_orientation, MoveKind, MoveProposal, MoveSet};
pub use sampling::{DriverState, MetropolisDriver, Report, RunSummary, Statistics, StatsSummary, TimeControl};
pub use setup::build_simulation;
