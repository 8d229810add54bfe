//! Mutable lattice state: one spin per site of a 3D box.
//!
//! Spins are stored as Cartesian vectors whatever the model. Components past
//! `n_vector` stay zero, so an Ising spin is `(±1, 0, 0)` and an XY spin is
//! `(cos θ, sin θ, 0)`.

use std::fmt;
use std::str::FromStr;

use nalgebra::Vector3;

use crate::error::{Result, SimError};

/// Integer lattice coordinate `(ix, iy, iz)`.
pub type Site = [usize; 3];

/// Displacement between lattice coordinates.
pub type Offset = [isize; 3];

/// Allowed deviation of `|s|²` from 1.
pub const NORM_TOLERANCE: f64 = 1e-8;

/// Topology tag shared by configurations, Hamiltonians and moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatticeType {
    SimpleCubic,
    FaceCenteredCubic,
    BodyCenteredCubic,
}

impl LatticeType {
    /// Token used in XYZ headers and control files.
    pub fn token(&self) -> &'static str {
        match self {
            LatticeType::SimpleCubic => "sc",
            LatticeType::FaceCenteredCubic => "fcc",
            LatticeType::BodyCenteredCubic => "bcc",
        }
    }
}

impl fmt::Display for LatticeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for LatticeType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sc" | "sc_n3" | "sc_3n" => Ok(LatticeType::SimpleCubic),
            "fcc" => Ok(LatticeType::FaceCenteredCubic),
            "bcc" => Ok(LatticeType::BodyCenteredCubic),
            other => Err(SimError::InvalidParameter {
                name: "lattice type",
                reason: format!("unknown token `{other}`"),
            }),
        }
    }
}

/// Number of sites in a box, failing instead of overflowing.
pub fn site_count(dims: [usize; 3]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| SimError::InvalidParameter {
            name: "box",
            reason: format!("box {dims:?} has too many sites"),
        })
}

/// Spin configuration of a box with `dims[0] × dims[1] × dims[2]` sites.
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeConfig {
    lattice_type: LatticeType,
    dims: [usize; 3],
    boundary: [bool; 3],
    n_vector: usize,
    /// Atom/spin type of every site, in site-index order.
    species: Vec<i32>,
    spins: Vec<Vector3<f64>>,
}

impl LatticeConfig {
    /// Create a configuration with every spin along `+x`.
    pub fn new(
        lattice_type: LatticeType,
        dims: [usize; 3],
        boundary: [bool; 3],
        n_vector: usize,
    ) -> Result<Self> {
        let n_sites = Self::check_shape(dims, n_vector)?;
        Ok(Self {
            lattice_type,
            dims,
            boundary,
            n_vector,
            species: vec![0; n_sites],
            spins: vec![Vector3::x(); n_sites],
        })
    }

    /// Assemble a configuration from per-site data given in site-index order.
    ///
    /// Fails if the lengths disagree with `dims` or any spin is off the unit
    /// sphere.
    pub fn from_parts(
        lattice_type: LatticeType,
        dims: [usize; 3],
        boundary: [bool; 3],
        n_vector: usize,
        species: Vec<i32>,
        spins: Vec<Vector3<f64>>,
    ) -> Result<Self> {
        let n_sites = Self::check_shape(dims, n_vector)?;
        if species.len() != n_sites || spins.len() != n_sites {
            return Err(SimError::InvalidParameter {
                name: "spins",
                reason: format!(
                    "expected {n_sites} sites, got {} spins and {} species",
                    spins.len(),
                    species.len()
                ),
            });
        }
        let config = Self {
            lattice_type,
            dims,
            boundary,
            n_vector,
            species,
            spins,
        };
        config.check_normalization(NORM_TOLERANCE)?;
        Ok(config)
    }

    fn check_shape(dims: [usize; 3], n_vector: usize) -> Result<usize> {
        if !(1..=3).contains(&n_vector) {
            return Err(SimError::InvalidNVector(n_vector));
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(SimError::InvalidParameter {
                name: "box",
                reason: format!("box dimensions must be positive, got {dims:?}"),
            });
        }
        site_count(dims)
    }

    pub fn lattice_type(&self) -> LatticeType {
        self.lattice_type
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn boundary(&self) -> [bool; 3] {
        self.boundary
    }

    pub fn is_periodic(&self) -> bool {
        self.boundary.iter().all(|&p| p)
    }

    pub fn n_vector(&self) -> usize {
        self.n_vector
    }

    pub fn n_sites(&self) -> usize {
        self.spins.len()
    }

    pub fn spins(&self) -> &[Vector3<f64>] {
        &self.spins
    }

    pub fn species(&self) -> &[i32] {
        &self.species
    }

    pub fn contains(&self, site: Site) -> bool {
        site.iter().zip(self.dims.iter()).all(|(&c, &d)| c < d)
    }

    /// Row-major linear index, `x` varying slowest.
    #[inline]
    pub fn site_index(&self, site: Site) -> usize {
        (site[0] * self.dims[1] + site[1]) * self.dims[2] + site[2]
    }

    /// Inverse of [`site_index`](Self::site_index).
    #[inline]
    pub fn site_coord(&self, index: usize) -> Site {
        let z = index % self.dims[2];
        let y = (index / self.dims[2]) % self.dims[1];
        let x = index / (self.dims[1] * self.dims[2]);
        [x, y, z]
    }

    /// All sites in index order.
    pub fn sites(&self) -> impl Iterator<Item = Site> + '_ {
        (0..self.n_sites()).map(move |i| self.site_coord(i))
    }

    /// Periodic neighbor `(site + offset) mod dims`.
    #[inline]
    pub fn neighbor(&self, site: Site, offset: Offset) -> Site {
        let mut out = [0usize; 3];
        for axis in 0..3 {
            let d = self.dims[axis] as isize;
            out[axis] = (site[axis] as isize + offset[axis]).rem_euclid(d) as usize;
        }
        out
    }

    pub fn get(&self, site: Site) -> Result<Vector3<f64>> {
        if !self.contains(site) {
            return Err(SimError::OutOfBounds { site, dims: self.dims });
        }
        Ok(self.spins[self.site_index(site)])
    }

    /// Overwrite the spin at `site`. Keeping it normalized is up to the caller.
    pub fn set(&mut self, site: Site, spin: Vector3<f64>) -> Result<()> {
        if !self.contains(site) {
            return Err(SimError::OutOfBounds { site, dims: self.dims });
        }
        let idx = self.site_index(site);
        self.spins[idx] = spin;
        Ok(())
    }

    #[inline]
    pub fn spin_at(&self, index: usize) -> Vector3<f64> {
        self.spins[index]
    }

    pub fn species_at(&self, site: Site) -> Result<i32> {
        if !self.contains(site) {
            return Err(SimError::OutOfBounds { site, dims: self.dims });
        }
        Ok(self.species[self.site_index(site)])
    }

    /// Vector sum of all spins.
    pub fn spin_sum(&self) -> Vector3<f64> {
        self.spins.iter().fold(Vector3::zeros(), |acc, s| acc + s)
    }

    /// Check that every spin has unit length within `tol` on `|s|² - 1`.
    pub fn check_normalization(&self, tol: f64) -> Result<()> {
        for (i, s) in self.spins.iter().enumerate() {
            if (s.norm_squared() - 1.0).abs() > tol {
                return Err(SimError::SpinNotNormalized {
                    site: self.site_coord(i),
                    magnitude: s.norm(),
                });
            }
        }
        Ok(())
    }
}
