//! Energy model interface used by moves and the Metropolis driver.

use approx::relative_eq;
use nalgebra::Vector3;

use crate::error::{Result, SimError};
use crate::lattice::{LatticeConfig, LatticeType, Site};
use crate::moves::MoveProposal;

/// Nearest neighbors per site on a simple cubic lattice.
pub const SC_NEIGHBORS: usize = 6;

/// Tolerance for cached-vs-recomputed energy comparisons.
pub const ENERGY_TOLERANCE: f64 = 1e-9;

/// Per-term energy change of one proposed move, in energy units (not
/// multiplied by β).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyDecomposition {
    pub site: Site,
    /// Linear index of `site`.
    pub index: usize,
    pub old: Vector3<f64>,
    pub trial: Vector3<f64>,
    /// `H·(s_trial − s_old)`
    pub field_term: f64,
    /// Linear index of each neighbor, in neighbor-offset order.
    pub neighbors: [usize; SC_NEIGHBORS],
    /// `J·(s_trial − s_old)·s_j` for each neighbor.
    pub pair_terms: [f64; SC_NEIGHBORS],
}

impl EnergyDecomposition {
    pub fn pair_sum(&self) -> f64 {
        self.pair_terms.iter().sum()
    }

    /// Full energy change of the move.
    pub fn total(&self) -> f64 {
        self.field_term + self.pair_sum()
    }
}

/// Total spin `M = Σ s_i` and its norm. Components past `n_vector` are zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Magnetization {
    pub norm: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Magnetization {
    pub fn from_sum(m: Vector3<f64>) -> Self {
        Self {
            norm: m.norm(),
            x: m.x,
            y: m.y,
            z: m.z,
        }
    }
}

/// Spin Hamiltonian with cached per-site and total energies.
///
/// The hot path is `energy_delta` followed, on acceptance, by
/// `take_decomposition` + `site_energy_update`. Full recomputation
/// (`energy_total`, `reset_caches`, `verify`) is only for setup and checks.
pub trait SpinHamiltonian {
    fn lattice_type(&self) -> LatticeType;

    /// Box the energy caches describe.
    fn dims(&self) -> [usize; 3];

    fn n_vector(&self) -> usize;

    /// Inverse temperature.
    fn beta(&self) -> f64;

    /// β·ΔE of `proposal`. Remembers the per-term decomposition until the
    /// next call.
    fn energy_delta(&mut self, config: &LatticeConfig, proposal: &MoveProposal) -> f64;

    /// Hand out the decomposition cached by the last `energy_delta` call.
    ///
    /// Fails with `ProposalMismatch` when `proposal` is not the one that was
    /// evaluated. The cached decomposition is consumed either way.
    fn take_decomposition(
        &mut self,
        config: &LatticeConfig,
        proposal: &MoveProposal,
    ) -> Result<EnergyDecomposition>;

    /// Apply an accepted move to the site and total energy caches.
    fn site_energy_update(&mut self, decomposition: &EnergyDecomposition);

    /// Total energy recomputed from scratch, O(N).
    fn energy_total(&self, config: &LatticeConfig) -> f64;

    /// Rebuild both caches from `config`.
    fn reset_caches(&mut self, config: &LatticeConfig);

    fn site_energies(&self) -> &[f64];

    /// Cached total energy.
    fn total_energy(&self) -> f64;

    fn magnetization(&self, config: &LatticeConfig) -> Magnetization {
        Magnetization::from_sum(config.spin_sum())
    }

    /// Check the caches against a full recomputation.
    fn verify(&self, config: &LatticeConfig) -> Result<()> {
        let cached = self.total_energy();
        let recomputed = self.energy_total(config);
        if !relative_eq!(
            cached,
            recomputed,
            epsilon = ENERGY_TOLERANCE,
            max_relative = ENERGY_TOLERANCE
        ) {
            return Err(SimError::EnergyDrift { cached, recomputed });
        }

        let site_sum: f64 = self.site_energies().iter().sum();
        if !relative_eq!(
            cached,
            site_sum,
            epsilon = ENERGY_TOLERANCE,
            max_relative = ENERGY_TOLERANCE
        ) {
            return Err(SimError::EnergyDrift {
                cached,
                recomputed: site_sum,
            });
        }
        Ok(())
    }
}
