//! Starting configurations for simple cubic spin lattices.

use nalgebra::Vector3;
use rand::Rng;

use super::config::{site_count, LatticeConfig, LatticeType, NORM_TOLERANCE};
use crate::error::Result;
use crate::moves::random_orientation;

/// Simple cubic box with every spin drawn uniformly from the n-vector manifold.
pub fn random_config<R: Rng + ?Sized>(
    dims: [usize; 3],
    boundary: [bool; 3],
    n_vector: usize,
    rng: &mut R,
) -> Result<LatticeConfig> {
    let mut config = LatticeConfig::new(LatticeType::SimpleCubic, dims, boundary, n_vector)?;
    for i in 0..config.n_sites() {
        let site = config.site_coord(i);
        config.set(site, random_orientation(n_vector, rng))?;
    }
    config.check_normalization(NORM_TOLERANCE)?;
    Ok(config)
}

/// Periodic simple cubic box with all spins equal to `spin`.
///
/// Components of `spin` past `n_vector` are dropped, so the remaining part
/// must still be a unit vector.
pub fn uniform_config(dims: [usize; 3], n_vector: usize, spin: Vector3<f64>) -> Result<LatticeConfig> {
    let mut projected = Vector3::zeros();
    for k in 0..n_vector.min(3) {
        projected[k] = spin[k];
    }
    let n_sites = site_count(dims)?;
    LatticeConfig::from_parts(
        LatticeType::SimpleCubic,
        dims,
        [true; 3],
        n_vector,
        vec![0; n_sites],
        vec![projected; n_sites],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn test_random_config_is_normalized() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(42);
        for n_vector in 1..=3 {
            let config = random_config([4, 3, 2], [true; 3], n_vector, &mut rng).unwrap();
            assert_eq!(config.n_sites(), 24);
            assert!(config.check_normalization(1e-8).is_ok());
            for s in config.spins() {
                for k in n_vector..3 {
                    assert_eq!(s[k], 0.0);
                }
            }
        }
    }

    #[test]
    fn test_uniform_config_projects_onto_model() {
        let config = uniform_config([2, 2, 2], 2, Vector3::y()).unwrap();
        assert_eq!(config.get([1, 1, 1]).unwrap(), Vector3::y());

        // z has no component in the XY plane
        assert!(matches!(
            uniform_config([2, 2, 2], 2, Vector3::z()),
            Err(SimError::SpinNotNormalized { .. })
        ));
    }
}
