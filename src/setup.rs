//! Setup - turn a control file into a ready-to-run Metropolis driver.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::error::{Result, SimError};
use crate::hamiltonian::{HamiltonianKind, Heisenberg};
use crate::io::{read_xyz, ControlFile};
use crate::lattice::{random_config, LatticeConfig, LatticeType};
use crate::moves::MoveSet;
use crate::sampling::MetropolisDriver;

/// Validate `control` and assemble the simulation it describes.
///
/// Relative paths in the control file are resolved against `base_dir`. The
/// generator seeded from `random_seed` draws the random starting
/// configuration (if any) and then drives the Metropolis chain.
pub fn build_simulation(control: &ControlFile, base_dir: &Path) -> Result<MetropolisDriver<Heisenberg>> {
    control.validate()?;
    let time = control.time_control()?;
    let lattice_type = control.lattice_type()?;
    let mut rng = Xoshiro256StarStar::seed_from_u64(control.random_seed);

    let config = match &control.config.file {
        Some(file) => {
            let path = resolve(base_dir, file);
            log::info!("reading initial configuration from {}", path.display());
            let config = read_xyz(&path)?;
            check_declared(control, &config)?;
            config
        }
        None => {
            if lattice_type != LatticeType::SimpleCubic {
                return Err(SimError::UnsupportedLattice {
                    lattice: lattice_type,
                    component: "the random configuration builder",
                });
            }
            log::info!("drawing random initial configuration");
            random_config(control.config.dims, control.boundary(), control.config.n_vector, &mut rng)?
        }
    };
    if config.lattice_type() != lattice_type {
        return Err(SimError::ConfigMismatch {
            field: "lattice type",
            expected: lattice_type.to_string(),
            found: config.lattice_type().to_string(),
        });
    }

    let params = &control.hamilton.params;
    let hamiltonian = match control.hamilton.kind.parse::<HamiltonianKind>()? {
        HamiltonianKind::Heisenberg => {
            Heisenberg::new(&config, params.temperature, params.coupling, &params.field)?
        }
    };
    let moves = MoveSet::new(&control.moves, lattice_type)?;

    log::info!(
        "{} box {:?}, n_vector = {}, T = {}, J = {}, seed = {}",
        lattice_type,
        config.dims(),
        config.n_vector(),
        params.temperature,
        params.coupling,
        control.random_seed
    );

    let mut driver = MetropolisDriver::with_rng(config, hamiltonian, moves, time, rng)?;
    if let Some(snapshot) = &control.output.snapshot {
        driver = driver.with_snapshots(resolve(base_dir, snapshot));
    }
    if let Some(final_config) = &control.output.final_config {
        driver = driver.with_final_output(resolve(base_dir, final_config));
    }
    Ok(driver)
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Box and periodic flags of a configuration file must match the control
/// file. The lattice type is compared by the caller.
fn check_declared(control: &ControlFile, config: &LatticeConfig) -> Result<()> {
    let declared = &control.config;
    if config.dims() != declared.dims {
        return Err(SimError::ConfigMismatch {
            field: "box",
            expected: format!("{:?}", declared.dims),
            found: format!("{:?}", config.dims()),
        });
    }
    let boundary = control.boundary();
    if config.boundary() != boundary {
        return Err(SimError::ConfigMismatch {
            field: "pbc",
            expected: format!("{:?}", declared.pbc),
            found: format!("{:?}", config.boundary().map(u8::from)),
        });
    }
    Ok(())
}
