//! Metropolis Monte Carlo driver.
//!
//! One unit of simulation time is one proposed single-site move, accepted or
//! not. The chain is strictly sequential: every step sees the lattice left by
//! the previous one.

use std::fmt;
use std::path::PathBuf;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use super::snapshot::SnapshotWriter;
use super::stats::{Statistics, StatsSummary};
use crate::error::{Result, SimError};
use crate::hamiltonian::{Magnetization, SpinHamiltonian};
use crate::lattice::{LatticeConfig, NORM_TOLERANCE};
use crate::moves::MoveSet;

pub const DEFAULT_PERIOD: u64 = 10;

/// Run length and the periods of the side tasks, in steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeControl {
    pub total: u64,
    pub print: u64,
    pub save: u64,
    pub measure: u64,
    /// Full energy verification period, 0 disables it.
    pub verify: u64,
}

impl TimeControl {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            print: DEFAULT_PERIOD,
            save: DEFAULT_PERIOD,
            measure: DEFAULT_PERIOD,
            verify: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, period) in [("print", self.print), ("save", self.save), ("measure", self.measure)] {
            if period == 0 {
                return Err(SimError::InvalidParameter {
                    name: "time_control",
                    reason: format!("`{name}` period must be at least 1"),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Finished,
}

/// One line of run output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub time: u64,
    pub energy: f64,
    pub magnetization: Magnetization,
    pub acceptance_rate: f64,
}

impl Report {
    pub const HEADER: &'static str = "      time          energy             |M|              Mx              My              Mz  acceptance";
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>10} {:>15.6} {:>15.6} {:>15.6} {:>15.6} {:>15.6} {:>11.4}",
            self.time,
            self.energy,
            self.magnetization.norm,
            self.magnetization.x,
            self.magnetization.y,
            self.magnetization.z,
            self.acceptance_rate
        )
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub final_report: Report,
    pub attempted: u64,
    pub accepted: u64,
    pub snapshots_written: usize,
    /// Report lines emitted, setup and final ones included.
    pub reports_emitted: u64,
    pub statistics: Option<StatsSummary>,
}

/// Metropolis criterion on β·ΔE. `uniform` is only drawn for uphill moves.
pub fn metropolis_accept<R: Rng + ?Sized>(beta_du: f64, rng: &mut R) -> bool {
    if beta_du < 0.0 {
        true
    } else {
        (-beta_du).exp() > rng.gen::<f64>()
    }
}

pub struct MetropolisDriver<H: SpinHamiltonian> {
    config: LatticeConfig,
    hamiltonian: H,
    moves: MoveSet,
    rng: Xoshiro256StarStar,
    time: TimeControl,
    elapsed: u64,
    accepted: u64,
    state: DriverState,
    stats: Statistics,
    reports_emitted: u64,
    snapshots: Option<SnapshotWriter>,
    final_output: Option<PathBuf>,
    print_reports: bool,
}

impl<H: SpinHamiltonian> MetropolisDriver<H> {
    pub fn new(
        config: LatticeConfig,
        hamiltonian: H,
        moves: MoveSet,
        time: TimeControl,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(
            config,
            hamiltonian,
            moves,
            time,
            Xoshiro256StarStar::seed_from_u64(seed),
        )
    }

    /// Build a driver around an already seeded generator, e.g. one that was
    /// used to draw the starting configuration.
    pub fn with_rng(
        config: LatticeConfig,
        hamiltonian: H,
        moves: MoveSet,
        time: TimeControl,
        rng: Xoshiro256StarStar,
    ) -> Result<Self> {
        check_compatibility(&config, &hamiltonian, &moves)?;
        time.validate()?;
        config.check_normalization(NORM_TOLERANCE)?;
        hamiltonian.verify(&config)?;

        let stats = Statistics::new(config.n_sites(), hamiltonian.beta());
        Ok(Self {
            config,
            hamiltonian,
            moves,
            rng,
            time,
            elapsed: 0,
            accepted: 0,
            state: DriverState::Idle,
            stats,
            reports_emitted: 0,
            snapshots: None,
            final_output: None,
            print_reports: true,
        })
    }

    /// Write snapshots to `path` every `save` steps.
    pub fn with_snapshots<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.snapshots = Some(SnapshotWriter::spawn(path));
        self
    }

    /// Write the configuration to `path` when the run finishes.
    pub fn with_final_output<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.final_output = Some(path.into());
        self
    }

    /// Toggle printing of report lines to stdout.
    pub fn with_reports(mut self, print: bool) -> Self {
        self.print_reports = print;
        self
    }

    pub fn config(&self) -> &LatticeConfig {
        &self.config
    }

    pub fn hamiltonian(&self) -> &H {
        &self.hamiltonian
    }

    pub fn time_control(&self) -> TimeControl {
        self.time
    }

    pub fn elapsed_time(&self) -> u64 {
        self.elapsed
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.elapsed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.elapsed as f64
        }
    }

    pub fn report(&self) -> Report {
        Report {
            time: self.elapsed,
            energy: self.hamiltonian.total_energy(),
            magnetization: self.hamiltonian.magnetization(&self.config),
            acceptance_rate: self.acceptance_rate(),
        }
    }

    /// Propose, evaluate and accept or reject one move. Returns whether the
    /// move was accepted.
    pub fn step(&mut self) -> Result<bool> {
        if self.state == DriverState::Finished {
            return Err(SimError::InvalidState("run has already finished".to_string()));
        }
        self.elapsed += 1;

        let proposal = self.moves.propose(&self.config, &mut self.rng);
        let beta_du = self.hamiltonian.energy_delta(&self.config, &proposal);

        if metropolis_accept(beta_du, &mut self.rng) {
            self.moves
                .accept(&mut self.config, &proposal, &mut self.hamiltonian)?;
            self.accepted += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Run until `total` steps have elapsed.
    pub fn run(&mut self) -> Result<RunSummary> {
        if self.state != DriverState::Idle {
            return Err(SimError::InvalidState(format!(
                "run() requires an idle driver, state is {:?}",
                self.state
            )));
        }
        self.state = DriverState::Running;
        log::info!(
            "starting Metropolis run: {} steps on {:?} box, n_vector = {}",
            self.time.total,
            self.config.dims(),
            self.config.n_vector()
        );

        if self.print_reports {
            println!("{}", Report::HEADER);
        }
        let report = self.report();
        self.emit(report);

        while self.elapsed < self.time.total {
            self.step()?;
            self.periodic_tasks()?;
        }

        self.finish()
    }

    fn periodic_tasks(&mut self) -> Result<()> {
        let t = self.elapsed;
        // the last step is covered by the final report
        if t % self.time.print == 0 && t < self.time.total {
            let report = self.report();
            self.emit(report);
        }
        if t % self.time.save == 0 {
            if let Some(writer) = self.snapshots.as_mut() {
                writer.submit(t, &self.config)?;
            }
        }
        if t % self.time.measure == 0 {
            let m = self.hamiltonian.magnetization(&self.config);
            self.stats.record(self.hamiltonian.total_energy(), m.norm);
        }
        if self.time.verify > 0 && t % self.time.verify == 0 {
            self.hamiltonian.verify(&self.config)?;
            self.config.check_normalization(NORM_TOLERANCE)?;
            log::debug!("energy caches verified at t = {t}");
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<RunSummary> {
        self.state = DriverState::Finished;
        let final_report = self.report();
        if self.print_reports {
            println!("End of simulation");
        }
        self.emit(final_report);

        let snapshots_written = match self.snapshots.take() {
            Some(writer) => writer.finish()?,
            None => 0,
        };
        if let Some(path) = &self.final_output {
            crate::io::write_xyz(path, &self.config)?;
            log::info!("final configuration written to {}", path.display());
        }

        let statistics = self.stats.summarize();
        if let Some(s) = &statistics {
            log::info!(
                "{} samples: E/N = {:.6} ± {:.6}, |M|/N = {:.6}, C = {:.6}, chi = {:.6}, tau = {:.2}",
                s.samples,
                s.energy_per_site,
                s.energy_error,
                s.magnetization_per_site,
                s.heat_capacity,
                s.susceptibility,
                s.autocorrelation_time
            );
        }

        Ok(RunSummary {
            final_report,
            attempted: self.elapsed,
            accepted: self.accepted,
            snapshots_written,
            reports_emitted: self.reports_emitted,
            statistics,
        })
    }

    fn emit(&mut self, report: Report) {
        self.reports_emitted += 1;
        log::debug!("{report}");
        if self.print_reports {
            println!("{report}");
        }
    }
}

/// Lattice type and box must agree across configuration, Hamiltonian and
/// move set.
fn check_compatibility<H: SpinHamiltonian>(
    config: &LatticeConfig,
    hamiltonian: &H,
    moves: &MoveSet,
) -> Result<()> {
    if hamiltonian.lattice_type() != config.lattice_type() {
        return Err(SimError::ConfigMismatch {
            field: "hamiltonian lattice type",
            expected: config.lattice_type().to_string(),
            found: hamiltonian.lattice_type().to_string(),
        });
    }
    if moves.lattice_type() != config.lattice_type() {
        return Err(SimError::ConfigMismatch {
            field: "move lattice type",
            expected: config.lattice_type().to_string(),
            found: moves.lattice_type().to_string(),
        });
    }
    if hamiltonian.n_vector() != config.n_vector() {
        return Err(SimError::ConfigMismatch {
            field: "n_vector",
            expected: config.n_vector().to_string(),
            found: hamiltonian.n_vector().to_string(),
        });
    }
    if hamiltonian.dims() != config.dims() {
        return Err(SimError::ConfigMismatch {
            field: "box",
            expected: format!("{:?}", config.dims()),
            found: format!("{:?}", hamiltonian.dims()),
        });
    }
    if hamiltonian.site_energies().len() != config.n_sites() {
        return Err(SimError::ConfigMismatch {
            field: "site count",
            expected: config.n_sites().to_string(),
            found: hamiltonian.site_energies().len().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hamiltonian::Heisenberg;
    use crate::lattice::{random_config, uniform_config, LatticeType};
    use nalgebra::Vector3;

    fn driver(temperature: f64, total: u64, seed: u64) -> MetropolisDriver<Heisenberg> {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        let config = random_config([4, 4, 4], [true; 3], 3, &mut rng).unwrap();
        let ham = Heisenberg::new(&config, temperature, 1.0, &[0.0, 0.0, 0.2]).unwrap();
        let moves = MoveSet::spin_flip(LatticeType::SimpleCubic).unwrap();
        let mut time = TimeControl::new(total);
        time.verify = 100;
        MetropolisDriver::with_rng(config, ham, moves, time, rng)
            .unwrap()
            .with_reports(false)
    }

    #[test]
    fn test_metropolis_accept() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        assert!(metropolis_accept(-1e-12, &mut rng));
        assert!(metropolis_accept(0.0, &mut rng));
        assert!(!metropolis_accept(1e6, &mut rng));
    }

    #[test]
    fn test_state_machine() {
        let mut d = driver(1.0, 50, 1);
        assert_eq!(d.state(), DriverState::Idle);
        let summary = d.run().unwrap();
        assert_eq!(d.state(), DriverState::Finished);
        assert_eq!(summary.attempted, 50);
        assert_eq!(d.elapsed_time(), 50);
        assert!(matches!(d.run(), Err(SimError::InvalidState(_))));
        assert!(d.step().is_err());
    }

    #[test]
    fn test_measurements_follow_period() {
        let mut d = driver(2.0, 1000, 2);
        let summary = d.run().unwrap();
        assert_eq!(d.statistics().len(), 100);
        assert_eq!(summary.statistics.unwrap().samples, 100);
        assert!(summary.accepted > 0 && summary.accepted <= 1000);
    }

    #[test]
    fn test_cached_energy_survives_long_run() {
        let mut d = driver(0.8, 20_000, 3);
        d.run().unwrap();
        let recomputed = d.hamiltonian().energy_total(d.config());
        approx::assert_relative_eq!(
            d.hamiltonian().total_energy(),
            recomputed,
            epsilon = 1e-9,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_incompatible_parts_are_rejected() {
        let config = uniform_config([2, 2, 2], 3, Vector3::z()).unwrap();
        let ham = Heisenberg::new(&config, 1.0, 1.0, &[]).unwrap();
        let moves = MoveSet::spin_flip(LatticeType::SimpleCubic).unwrap();

        let other = uniform_config([2, 2, 3], 3, Vector3::z()).unwrap();
        assert!(matches!(
            MetropolisDriver::new(other, ham.clone(), moves.clone(), TimeControl::new(10), 0),
            Err(SimError::ConfigMismatch { .. })
        ));

        let xy = uniform_config([2, 2, 2], 2, Vector3::x()).unwrap();
        assert!(matches!(
            MetropolisDriver::new(xy, ham.clone(), moves.clone(), TimeControl::new(10), 0),
            Err(SimError::ConfigMismatch { field: "n_vector", .. })
        ));

        let mut time = TimeControl::new(10);
        time.print = 0;
        assert!(MetropolisDriver::new(config, ham, moves, time, 0).is_err());
    }

    #[test]
    fn test_hamiltonian_from_other_configuration_is_rejected() {
        let aligned = uniform_config([4, 4, 4], 3, Vector3::z()).unwrap();
        let ham = Heisenberg::new(&aligned, 1.0, 1.0, &[]).unwrap();
        let moves = MoveSet::spin_flip(LatticeType::SimpleCubic).unwrap();
        let mut rng = Xoshiro256StarStar::seed_from_u64(4);
        let random = random_config([4, 4, 4], [true; 3], 3, &mut rng).unwrap();
        assert!(matches!(
            MetropolisDriver::new(random, ham, moves.clone(), TimeControl::new(10), 0),
            Err(SimError::EnergyDrift { .. })
        ));

        // same site count, different box
        let mut flat = uniform_config([2, 2, 4], 3, Vector3::z()).unwrap();
        flat.set([0, 0, 0], -Vector3::z()).unwrap();
        let ham = Heisenberg::new(&flat, 1.0, 1.0, &[]).unwrap();
        let mut square = uniform_config([1, 4, 4], 3, Vector3::z()).unwrap();
        square.set([0, 0, 0], -Vector3::z()).unwrap();
        assert!(matches!(
            MetropolisDriver::new(square, ham, moves, TimeControl::new(10), 0),
            Err(SimError::ConfigMismatch { field: "box", .. })
        ));
    }

    #[test]
    fn test_snapshots_and_final_output_are_written() {
        let dir = std::env::temp_dir();
        let snapshot = dir.join(format!("rust_spinmc_driver_snap_{}.xyz", std::process::id()));
        let final_path = dir.join(format!("rust_spinmc_driver_final_{}.xyz", std::process::id()));

        let mut d = driver(1.5, 400, 12)
            .with_snapshots(&snapshot)
            .with_final_output(&final_path);
        let summary = d.run().unwrap();
        assert!(summary.snapshots_written >= 1);

        let saved = crate::io::read_xyz(&snapshot).unwrap();
        assert_eq!(saved.dims(), d.config().dims());
        saved.check_normalization(NORM_TOLERANCE).unwrap();
        let last = crate::io::read_xyz(&final_path).unwrap();
        assert_eq!(&last, d.config());

        std::fs::remove_file(&snapshot).unwrap();
        std::fs::remove_file(&final_path).unwrap();
    }

    #[test]
    fn test_last_step_is_reported_once() {
        // setup, t = 10..90, final
        let mut d = driver(1.0, 100, 13);
        let summary = d.run().unwrap();
        assert_eq!(summary.reports_emitted, 11);
        assert_eq!(summary.final_report.time, 100);

        let mut d = driver(1.0, 95, 13);
        assert_eq!(d.run().unwrap().reports_emitted, 11);
    }
}
