//! Single-site spin moves for Metropolis sampling.
//!
//! A [`MoveSet`] picks one of its configured move kinds from a cumulative
//! distribution and produces a [`MoveProposal`]. The driver evaluates the
//! proposal with the Hamiltonian and, if it passes the Metropolis test,
//! hands it back to [`MoveSet::accept`].

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::str::FromStr;

use nalgebra::Vector3;
use rand::Rng;

use crate::error::{Result, SimError};
use crate::hamiltonian::SpinHamiltonian;
use crate::lattice::{LatticeConfig, LatticeType, Site};

/// Move kinds a [`MoveSet`] can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// Pick a random site and give it a fresh random orientation.
    SpinFlip3d,
}

impl MoveKind {
    pub fn name(&self) -> &'static str {
        match self {
            MoveKind::SpinFlip3d => "spin_flip_3d",
        }
    }

    /// Site coordinates are drawn from the whole box, which is only a valid
    /// site set for simple cubic lattices.
    pub fn supports(&self, lattice: LatticeType) -> bool {
        match self {
            MoveKind::SpinFlip3d => lattice == LatticeType::SimpleCubic,
        }
    }
}

impl FromStr for MoveKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "spin_flip_3d" => Ok(MoveKind::SpinFlip3d),
            other => Err(SimError::UnsupportedMove(other.to_string())),
        }
    }
}

/// Trial change of a single site: `(site, old)` to `(site, trial)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveProposal {
    pub kind: MoveKind,
    pub site: Site,
    pub old: Vector3<f64>,
    pub trial: Vector3<f64>,
}

/// Uniformly distributed spin orientation for an n-vector model.
///
/// * `n_vector = 1`: `±1` with equal probability
/// * `n_vector = 2`: angle θ uniform in (−π, π], stored as `(cos θ, sin θ, 0)`
/// * `n_vector = 3`: uniform on the unit sphere
pub fn random_orientation<R: Rng + ?Sized>(n_vector: usize, rng: &mut R) -> Vector3<f64> {
    debug_assert!((1..=3).contains(&n_vector));
    match n_vector {
        1 => {
            let s = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            Vector3::new(s, 0.0, 0.0)
        }
        2 => {
            let theta = PI - 2.0 * PI * rng.gen::<f64>();
            Vector3::new(theta.cos(), theta.sin(), 0.0)
        }
        _ => {
            let sz = 2.0 * rng.gen::<f64>() - 1.0;
            let st = (1.0 - sz * sz).max(0.0).sqrt();
            let phi = 2.0 * PI * rng.gen::<f64>();
            Vector3::new(st * phi.sin(), st * phi.cos(), sz)
        }
    }
}

/// Weighted collection of move kinds.
#[derive(Debug, Clone)]
pub struct MoveSet {
    kinds: Vec<MoveKind>,
    /// Normalized cumulative probabilities, last entry is 1.
    cumulative: Vec<f64>,
    lattice_type: LatticeType,
}

impl MoveSet {
    /// Build from a `move name -> relative weight` mapping.
    pub fn new(weights: &BTreeMap<String, f64>, lattice_type: LatticeType) -> Result<Self> {
        if weights.is_empty() {
            return Err(SimError::InvalidParameter {
                name: "moves",
                reason: "at least one move type is required".to_string(),
            });
        }

        let mut kinds = Vec::with_capacity(weights.len());
        let mut raw = Vec::with_capacity(weights.len());
        for (name, &weight) in weights {
            let kind: MoveKind = name.parse()?;
            if !kind.supports(lattice_type) {
                return Err(SimError::UnsupportedLattice {
                    lattice: lattice_type,
                    component: kind.name(),
                });
            }
            if !weight.is_finite() || weight <= 0.0 {
                return Err(SimError::InvalidParameter {
                    name: "moves",
                    reason: format!("probability of `{name}` must be positive, got {weight}"),
                });
            }
            kinds.push(kind);
            raw.push(weight);
        }

        let norm: f64 = raw.iter().sum();
        let mut acc = 0.0;
        let mut cumulative: Vec<f64> = raw
            .iter()
            .map(|w| {
                acc += w / norm;
                acc
            })
            .collect();
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }

        Ok(Self {
            kinds,
            cumulative,
            lattice_type,
        })
    }

    /// A move set containing only `spin_flip_3d`.
    pub fn spin_flip(lattice_type: LatticeType) -> Result<Self> {
        let weights = BTreeMap::from([(MoveKind::SpinFlip3d.name().to_string(), 1.0)]);
        Self::new(&weights, lattice_type)
    }

    pub fn lattice_type(&self) -> LatticeType {
        self.lattice_type
    }

    pub fn kinds(&self) -> &[MoveKind] {
        &self.kinds
    }

    /// Normalized selection probability of each kind, in `kinds()` order.
    pub fn probabilities(&self) -> Vec<f64> {
        let mut prev = 0.0;
        self.cumulative
            .iter()
            .map(|&c| {
                let p = c - prev;
                prev = c;
                p
            })
            .collect()
    }

    fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> MoveKind {
        let u: f64 = rng.gen();
        let i = self.cumulative.partition_point(|&c| c <= u);
        self.kinds[i.min(self.kinds.len() - 1)]
    }

    pub fn propose<R: Rng + ?Sized>(&self, config: &LatticeConfig, rng: &mut R) -> MoveProposal {
        let kind = self.select(rng);
        match kind {
            MoveKind::SpinFlip3d => {
                let dims = config.dims();
                let site = [
                    rng.gen_range(0..dims[0]),
                    rng.gen_range(0..dims[1]),
                    rng.gen_range(0..dims[2]),
                ];
                let trial = random_orientation(config.n_vector(), rng);
                let old = config.spin_at(config.site_index(site));
                MoveProposal {
                    kind,
                    site,
                    old,
                    trial,
                }
            }
        }
    }

    /// Commit an accepted proposal to the lattice and the energy caches.
    ///
    /// `proposal` must be the one most recently passed to
    /// `hamiltonian.energy_delta`, otherwise `ProposalMismatch` is returned and
    /// nothing is modified.
    pub fn accept<H: SpinHamiltonian>(
        &self,
        config: &mut LatticeConfig,
        proposal: &MoveProposal,
        hamiltonian: &mut H,
    ) -> Result<()> {
        let decomposition = hamiltonian.take_decomposition(config, proposal)?;
        config.set(proposal.site, proposal.trial)?;
        hamiltonian.site_energy_update(&decomposition);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hamiltonian::Heisenberg;
    use crate::lattice::uniform_config;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn test_heisenberg_orientations_are_unit_vectors() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        for _ in 0..10_000 {
            let s = random_orientation(3, &mut rng);
            assert!((s.norm_squared() - 1.0).abs() < 1e-8);
        }
    }

    #[test]
    fn test_heisenberg_orientations_cover_the_sphere() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(11);
        let n = 200_000;
        let mean = (0..n).fold(Vector3::zeros(), |acc, _| acc + random_orientation(3, &mut rng))
            / n as f64;
        assert!(mean.norm() < 1e-2);
    }

    #[test]
    fn test_ising_and_xy_orientations() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        let mut ups = 0;
        for _ in 0..1000 {
            let s = random_orientation(1, &mut rng);
            assert!(s.x == 1.0 || s.x == -1.0);
            assert_eq!(s.y, 0.0);
            if s.x > 0.0 {
                ups += 1;
            }
        }
        assert!(ups > 400 && ups < 600);

        for _ in 0..1000 {
            let s = random_orientation(2, &mut rng);
            assert_relative_eq!(s.norm(), 1.0, epsilon = 1e-12);
            assert_eq!(s.z, 0.0);
        }
    }

    #[test]
    fn test_unknown_move_is_rejected() {
        let weights = BTreeMap::from([("cluster_flip".to_string(), 1.0)]);
        assert!(matches!(
            MoveSet::new(&weights, LatticeType::SimpleCubic),
            Err(SimError::UnsupportedMove(name)) if name == "cluster_flip"
        ));
    }

    #[test]
    fn test_bad_weights_and_lattices_are_rejected() {
        let weights = BTreeMap::from([("spin_flip_3d".to_string(), 0.0)]);
        assert!(MoveSet::new(&weights, LatticeType::SimpleCubic).is_err());
        assert!(MoveSet::new(&BTreeMap::new(), LatticeType::SimpleCubic).is_err());
        assert!(matches!(
            MoveSet::spin_flip(LatticeType::FaceCenteredCubic),
            Err(SimError::UnsupportedLattice { .. })
        ));
    }

    #[test]
    fn test_probabilities_are_normalized() {
        let weights = BTreeMap::from([("spin_flip_3d".to_string(), 4.0)]);
        let moves = MoveSet::new(&weights, LatticeType::SimpleCubic).unwrap();
        assert_eq!(moves.probabilities(), vec![1.0]);
    }

    #[test]
    fn test_proposal_records_old_state() {
        let config = uniform_config([3, 4, 5], 3, Vector3::z()).unwrap();
        let moves = MoveSet::spin_flip(LatticeType::SimpleCubic).unwrap();
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        for _ in 0..100 {
            let p = moves.propose(&config, &mut rng);
            assert!(config.contains(p.site));
            assert_eq!(p.old, Vector3::z());
            assert_relative_eq!(p.trial.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_accept_requires_matching_evaluation() {
        let mut config = uniform_config([2, 2, 2], 3, Vector3::z()).unwrap();
        let mut ham = Heisenberg::new(&config, 1.0, 1.0, &[]).unwrap();
        let moves = MoveSet::spin_flip(LatticeType::SimpleCubic).unwrap();
        let mut rng = Xoshiro256StarStar::seed_from_u64(5);

        let first = moves.propose(&config, &mut rng);
        let second = moves.propose(&config, &mut rng);
        ham.energy_delta(&config, &first);
        let before = config.clone();
        assert!(matches!(
            moves.accept(&mut config, &second, &mut ham),
            Err(SimError::ProposalMismatch)
        ));
        assert_eq!(config, before);

        // evaluation was consumed by the failed attempt
        assert!(moves.accept(&mut config, &first, &mut ham).is_err());
        ham.energy_delta(&config, &first);
        moves.accept(&mut config, &first, &mut ham).unwrap();
        assert_eq!(config.get(first.site).unwrap(), first.trial);
    }

    #[test]
    fn test_accept_compares_old_spin() {
        let mut config = uniform_config([2, 2, 2], 3, Vector3::z()).unwrap();
        let mut ham = Heisenberg::new(&config, 1.0, 1.0, &[]).unwrap();
        let moves = MoveSet::spin_flip(LatticeType::SimpleCubic).unwrap();

        let evaluated = MoveProposal {
            kind: MoveKind::SpinFlip3d,
            site: [1, 0, 1],
            old: Vector3::z(),
            trial: Vector3::x(),
        };
        let stale = MoveProposal {
            old: -Vector3::z(),
            ..evaluated
        };
        ham.energy_delta(&config, &evaluated);
        assert!(matches!(
            moves.accept(&mut config, &stale, &mut ham),
            Err(SimError::ProposalMismatch)
        ));
        assert_eq!(config.get([1, 0, 1]).unwrap(), Vector3::z());
        ham.verify(&config).unwrap();
    }
}
