//! Classical n-vector Hamiltonian on a simple cubic lattice.
//!
//! U = Σᵢ H·sᵢ + ½ Σᵢ Σⱼ∈nbr(i) J sᵢ·sⱼ
//!
//! With `n_vector` 1, 2 or 3 this is the Ising, XY or Heisenberg model. Each
//! site's cached energy is its field term plus half of its bond energies, so
//! the site energies sum to U.

use nalgebra::Vector3;

use super::traits::{EnergyDecomposition, SpinHamiltonian, SC_NEIGHBORS};
use crate::error::{Result, SimError};
use crate::lattice::{LatticeConfig, LatticeType, Offset};
use crate::moves::MoveProposal;

/// Nearest-neighbor offsets of the simple cubic lattice.
pub const SIMPLE_CUBIC_OFFSETS: [Offset; SC_NEIGHBORS] = [
    [1, 0, 0],
    [-1, 0, 0],
    [0, 1, 0],
    [0, -1, 0],
    [0, 0, 1],
    [0, 0, -1],
];

#[derive(Debug, Clone)]
pub struct Heisenberg {
    lattice_type: LatticeType,
    /// Box the caches were built for
    dims: [usize; 3],
    n_vector: usize,
    /// Spin-spin coupling J
    coupling: f64,
    /// External field H, zero past `n_vector`
    field: Vector3<f64>,
    temperature: f64,
    beta: f64,
    neighbor_offsets: [Offset; SC_NEIGHBORS],
    site_energy: Vec<f64>,
    total_energy: f64,
    /// Decomposition of the last evaluated proposal
    pending: Option<EnergyDecomposition>,
}

impl Heisenberg {
    /// Build the Hamiltonian for `config` and fill its energy caches.
    ///
    /// `field` is either empty (no field) or has exactly `n_vector` entries.
    pub fn new(config: &LatticeConfig, temperature: f64, coupling: f64, field: &[f64]) -> Result<Self> {
        if config.lattice_type() != LatticeType::SimpleCubic {
            return Err(SimError::UnsupportedLattice {
                lattice: config.lattice_type(),
                component: "the heisenberg hamiltonian",
            });
        }
        if !config.is_periodic() {
            return Err(SimError::UnsupportedBoundary(config.boundary()));
        }
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(SimError::InvalidParameter {
                name: "Temp",
                reason: format!("temperature must be positive and finite, got {temperature}"),
            });
        }
        if !coupling.is_finite() {
            return Err(SimError::InvalidParameter {
                name: "J",
                reason: format!("coupling must be finite, got {coupling}"),
            });
        }

        let n_vector = config.n_vector();
        if !field.is_empty() && field.len() != n_vector {
            return Err(SimError::InvalidParameter {
                name: "H",
                reason: format!("expected {n_vector} field components, got {}", field.len()),
            });
        }
        let mut h = Vector3::zeros();
        for (k, &value) in field.iter().enumerate() {
            h[k] = value;
        }

        let mut ham = Self {
            lattice_type: LatticeType::SimpleCubic,
            dims: config.dims(),
            n_vector,
            coupling,
            field: h,
            temperature,
            beta: 1.0 / temperature,
            neighbor_offsets: SIMPLE_CUBIC_OFFSETS,
            site_energy: Vec::new(),
            total_energy: 0.0,
            pending: None,
        };
        ham.reset_caches(config);
        Ok(ham)
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn coupling(&self) -> f64 {
        self.coupling
    }

    pub fn field(&self) -> Vector3<f64> {
        self.field
    }

    pub fn neighbor_offsets(&self) -> &[Offset; SC_NEIGHBORS] {
        &self.neighbor_offsets
    }

    /// Field term and half-counted bond energy of site `index`.
    fn site_energy_from_scratch(&self, config: &LatticeConfig, index: usize) -> f64 {
        let site = config.site_coord(index);
        let si = config.spin_at(index);
        let bonds: f64 = self
            .neighbor_offsets
            .iter()
            .map(|&off| {
                let j = config.site_index(config.neighbor(site, off));
                self.coupling * si.dot(&config.spin_at(j))
            })
            .sum();
        self.field.dot(&si) + 0.5 * bonds
    }
}

impl SpinHamiltonian for Heisenberg {
    fn lattice_type(&self) -> LatticeType {
        self.lattice_type
    }

    fn dims(&self) -> [usize; 3] {
        self.dims
    }

    fn n_vector(&self) -> usize {
        self.n_vector
    }

    fn beta(&self) -> f64 {
        self.beta
    }

    fn energy_delta(&mut self, config: &LatticeConfig, proposal: &MoveProposal) -> f64 {
        let index = config.site_index(proposal.site);
        let ds = proposal.trial - proposal.old;

        let mut neighbors = [0usize; SC_NEIGHBORS];
        let mut pair_terms = [0.0; SC_NEIGHBORS];
        for (k, &off) in self.neighbor_offsets.iter().enumerate() {
            let j = config.site_index(config.neighbor(proposal.site, off));
            neighbors[k] = j;
            // a site that is its own neighbor (box length 1) only sees |s|² = 1
            if j != index {
                pair_terms[k] = self.coupling * ds.dot(&config.spin_at(j));
            }
        }

        let decomposition = EnergyDecomposition {
            site: proposal.site,
            index,
            old: proposal.old,
            trial: proposal.trial,
            field_term: self.field.dot(&ds),
            neighbors,
            pair_terms,
        };
        let du = decomposition.total();
        self.pending = Some(decomposition);
        self.beta * du
    }

    fn take_decomposition(
        &mut self,
        config: &LatticeConfig,
        proposal: &MoveProposal,
    ) -> Result<EnergyDecomposition> {
        match self.pending.take() {
            Some(d)
                if d.index == config.site_index(proposal.site)
                    && d.old == proposal.old
                    && d.trial == proposal.trial =>
            {
                Ok(d)
            }
            _ => Err(SimError::ProposalMismatch),
        }
    }

    fn site_energy_update(&mut self, decomposition: &EnergyDecomposition) {
        let pair_sum = decomposition.pair_sum();
        self.site_energy[decomposition.index] += decomposition.field_term + 0.5 * pair_sum;
        for (&j, &du) in decomposition.neighbors.iter().zip(decomposition.pair_terms.iter()) {
            self.site_energy[j] += 0.5 * du;
        }
        self.total_energy += decomposition.field_term + pair_sum;
    }

    fn energy_total(&self, config: &LatticeConfig) -> f64 {
        (0..config.n_sites())
            .map(|i| self.site_energy_from_scratch(config, i))
            .sum()
    }

    fn reset_caches(&mut self, config: &LatticeConfig) {
        self.dims = config.dims();
        self.site_energy = (0..config.n_sites())
            .map(|i| self.site_energy_from_scratch(config, i))
            .collect();
        self.total_energy = self.site_energy.iter().sum();
        self.pending = None;
    }

    fn site_energies(&self) -> &[f64] {
        &self.site_energy
    }

    fn total_energy(&self) -> f64 {
        self.total_energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{random_config, uniform_config};
    use crate::moves::MoveKind;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    fn flip_proposal(config: &LatticeConfig, site: [usize; 3], trial: Vector3<f64>) -> MoveProposal {
        MoveProposal {
            kind: MoveKind::SpinFlip3d,
            site,
            old: config.get(site).unwrap(),
            trial,
        }
    }

    #[test]
    fn test_aligned_cube_energy() {
        // 8 sites, 6 bonds each, every bond s·s = 1, half counted
        let config = uniform_config([2, 2, 2], 3, Vector3::z()).unwrap();
        let ham = Heisenberg::new(&config, 1.0, 1.0, &[0.0, 0.0, 0.5]).unwrap();
        assert_relative_eq!(ham.total_energy(), 8.0 * 3.0 + 8.0 * 0.5, epsilon = 1e-12);
        assert_relative_eq!(ham.energy_total(&config), ham.total_energy(), epsilon = 1e-12);
        for &e in ham.site_energies() {
            assert_relative_eq!(e, 3.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_flip_in_aligned_cube() {
        let config = uniform_config([2, 2, 2], 3, Vector3::z()).unwrap();
        for &temperature in &[0.5, 2.0] {
            let mut ham = Heisenberg::new(&config, temperature, 1.0, &[]).unwrap();
            for site in config.sites() {
                let p = flip_proposal(&config, site, -Vector3::z());
                let beta_du = ham.energy_delta(&config, &p);
                assert_relative_eq!(beta_du, -12.0 / temperature, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_delta_matches_full_recomputation() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(9);
        for n_vector in 1..=3 {
            let field = vec![0.3; n_vector];
            let mut config = random_config([3, 4, 2], [true; 3], n_vector, &mut rng).unwrap();
            let mut ham = Heisenberg::new(&config, 1.7, -0.8, &field).unwrap();

            let site = [1, 3, 0];
            let trial = crate::moves::random_orientation(n_vector, &mut rng);
            let p = flip_proposal(&config, site, trial);
            let before = ham.energy_total(&config);
            let beta_du = ham.energy_delta(&config, &p);

            let d = ham.take_decomposition(&config, &p).unwrap();
            config.set(site, trial).unwrap();
            ham.site_energy_update(&d);

            let after = ham.energy_total(&config);
            assert_relative_eq!(beta_du, ham.beta() * (after - before), epsilon = 1e-10);
            assert!(ham.verify(&config).is_ok());
        }
    }

    #[test]
    fn test_length_one_axis_has_no_self_coupling_change() {
        let mut config = uniform_config([1, 3, 3], 3, Vector3::x()).unwrap();
        let mut ham = Heisenberg::new(&config, 1.0, 1.0, &[]).unwrap();
        let p = flip_proposal(&config, [0, 1, 1], Vector3::y());
        let before = ham.energy_total(&config);
        let beta_du = ham.energy_delta(&config, &p);
        let d = ham.take_decomposition(&config, &p).unwrap();
        config.set(p.site, p.trial).unwrap();
        ham.site_energy_update(&d);
        assert_relative_eq!(beta_du, ham.energy_total(&config) - before, epsilon = 1e-12);
        assert!(ham.verify(&config).is_ok());
    }

    #[test]
    fn test_magnetization() {
        let mut config = uniform_config([2, 2, 2], 3, Vector3::z()).unwrap();
        config.set([0, 0, 0], Vector3::x()).unwrap();
        let ham = Heisenberg::new(&config, 1.0, 1.0, &[]).unwrap();
        let m = ham.magnetization(&config);
        assert_relative_eq!(m.x, 1.0);
        assert_relative_eq!(m.z, 7.0);
        assert_relative_eq!(m.norm, 50f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_construction_errors() {
        let config = uniform_config([2, 2, 2], 3, Vector3::z()).unwrap();
        assert!(Heisenberg::new(&config, 0.0, 1.0, &[]).is_err());
        assert!(Heisenberg::new(&config, f64::NAN, 1.0, &[]).is_err());
        assert!(matches!(
            Heisenberg::new(&config, 1.0, 1.0, &[1.0]),
            Err(SimError::InvalidParameter { name: "H", .. })
        ));

        let fcc = LatticeConfig::new(LatticeType::FaceCenteredCubic, [2, 2, 2], [true; 3], 3).unwrap();
        assert!(matches!(
            Heisenberg::new(&fcc, 1.0, 1.0, &[]),
            Err(SimError::UnsupportedLattice { .. })
        ));

        let open = LatticeConfig::new(LatticeType::SimpleCubic, [2, 2, 2], [true, false, true], 3).unwrap();
        assert!(matches!(
            Heisenberg::new(&open, 1.0, 1.0, &[]),
            Err(SimError::UnsupportedBoundary(_))
        ));
    }
}
