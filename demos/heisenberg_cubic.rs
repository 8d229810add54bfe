//! Heisenberg ferromagnet on a periodic simple cubic lattice
//!
//! Run with: cargo run --release --example heisenberg_cubic
//!
//! Sweeps the temperature across the ordering transition (T_c ≈ 1.443 |J|
//! for the classical 3D Heisenberg model) and prints |M| per site, the
//! energy per site and the heat capacity at each point.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use rust_spinmc::{random_config, Heisenberg, LatticeType, MetropolisDriver, MoveSet, TimeControl};

fn main() -> rust_spinmc::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let dims = [8, 8, 8];
    let n_sites = 512;
    let sweeps = 2000;
    // ferromagnetic: aligned spins lower U = ½ΣΣ J s_i·s_j when J < 0
    let coupling = -1.0;
    let temperatures = [0.8, 1.0, 1.2, 1.4, 1.5, 1.6, 1.8, 2.2];

    println!("Classical Heisenberg model, {dims:?} box, J = {coupling}");
    println!("{:>6} {:>12} {:>12} {:>12} {:>10}", "T", "E/N", "|M|/N", "C", "acc");

    for (i, &temperature) in temperatures.iter().enumerate() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(1000 + i as u64);
        let config = random_config(dims, [true; 3], 3, &mut rng)?;
        let ham = Heisenberg::new(&config, temperature, coupling, &[])?;
        let moves = MoveSet::spin_flip(LatticeType::SimpleCubic)?;

        let mut time = TimeControl::new(sweeps * n_sites);
        time.measure = n_sites;
        time.verify = 100 * n_sites;

        let mut driver = MetropolisDriver::with_rng(config, ham, moves, time, rng)?.with_reports(false);
        let summary = driver.run()?;
        if let Some(stats) = summary.statistics {
            println!(
                "{:>6.2} {:>12.6} {:>12.6} {:>12.6} {:>10.4}",
                temperature,
                stats.energy_per_site,
                stats.magnetization_per_site,
                stats.heat_capacity,
                summary.final_report.acceptance_rate
            );
        }
    }
    Ok(())
}
