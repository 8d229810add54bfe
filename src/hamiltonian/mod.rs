//! Hamiltonian module - energy models for classical spin lattices.

mod heisenberg;
mod traits;

use std::str::FromStr;

use crate::error::{Result, SimError};

pub use heisenberg::{Heisenberg, SIMPLE_CUBIC_OFFSETS};
pub use traits::{EnergyDecomposition, Magnetization, SpinHamiltonian, ENERGY_TOLERANCE, SC_NEIGHBORS};

/// Hamiltonians selectable from a control file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HamiltonianKind {
    Heisenberg,
}

impl FromStr for HamiltonianKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "heisenberg" => Ok(HamiltonianKind::Heisenberg),
            _ => Err(SimError::UnsupportedHamiltonian(s.to_string())),
        }
    }
}
