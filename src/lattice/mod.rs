//! Lattice module - spin configurations on a periodic 3D box.

mod builder;
mod config;

pub use builder::{random_config, uniform_config};
pub use config::{site_count, LatticeConfig, LatticeType, Offset, Site, NORM_TOLERANCE};
