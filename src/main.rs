use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use nalgebra::Vector3;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use rust_spinmc::{build_simulation, random_config, read_control, uniform_config, write_xyz, Result};

#[derive(Parser, Debug)]
#[command(version, about = "Metropolis Monte Carlo for classical spin lattices", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the simulation described by a control file
    Run {
        #[arg(default_value = "control.yml")]
        control: PathBuf,
        /// Override `random_seed` from the control file
        #[arg(short, long)]
        seed: Option<u64>,
        /// Do not print the report table
        #[arg(short, long)]
        quiet: bool,
    },
    /// Write an initial simple cubic configuration
    Generate {
        #[arg(long, required = true, num_args = 3, value_names = ["X", "Y", "Z"])]
        dims: Vec<usize>,
        #[arg(long, default_value_t = 3)]
        n_vector: usize,
        #[arg(short, long, default_value_t = 42)]
        seed: u64,
        /// All spins along +x instead of random orientations
        #[arg(long)]
        aligned: bool,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let result = match args.command {
        Command::Run { control, seed, quiet } => run(&control, seed, quiet),
        Command::Generate {
            dims,
            n_vector,
            seed,
            aligned,
            output,
        } => generate(&dims, n_vector, seed, aligned, &output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", error_chain(&e));
            ExitCode::FAILURE
        }
    }
}

/// `e` followed by every underlying cause, one per line.
fn error_chain(e: &dyn Error) -> String {
    let mut out = format!("error: {e}");
    let mut source = e.source();
    while let Some(cause) = source {
        out.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    out
}

fn run(path: &Path, seed: Option<u64>, quiet: bool) -> Result<()> {
    log::info!("reading control file {}", path.display());
    let mut control = read_control(path)?;
    if let Some(seed) = seed {
        control.random_seed = seed;
    }
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut driver = build_simulation(&control, base_dir)?.with_reports(!quiet);
    let summary = driver.run()?;

    println!("Metropolis Simulation Results");
    println!("-----------------------------");
    println!("Steps: {}", summary.attempted);
    println!(
        "Accepted: {} ({:.2}%)",
        summary.accepted,
        100.0 * summary.final_report.acceptance_rate
    );
    println!("Final energy: {:.6}", summary.final_report.energy);
    if let Some(stats) = summary.statistics {
        println!(
            "Energy per site: {:.6} ± {:.6}",
            stats.energy_per_site, stats.energy_error
        );
        println!("|M| per site: {:.6}", stats.magnetization_per_site);
        println!("Heat capacity: {:.6}", stats.heat_capacity);
        println!("Susceptibility: {:.6}", stats.susceptibility);
        println!("Autocorrelation time: {:.2} samples", stats.autocorrelation_time);
    }
    Ok(())
}

fn generate(dims: &[usize], n_vector: usize, seed: u64, aligned: bool, output: &Path) -> Result<()> {
    let dims = [dims[0], dims[1], dims[2]];
    let config = if aligned {
        uniform_config(dims, n_vector, Vector3::x())?
    } else {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        random_config(dims, [true; 3], n_vector, &mut rng)?
    };
    write_xyz(output, &config)?;
    log::info!("wrote {} sites to {}", config.n_sites(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_spinmc::{parse_control, SimError};

    #[test]
    fn test_error_chain_lists_causes() {
        let e = parse_control("sim_type: [").unwrap_err();
        assert!(matches!(e, SimError::Yaml(_)));
        let text = error_chain(&e);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "error: cannot parse control file");
        assert!(lines[1].starts_with("  caused by: "));
    }

    #[test]
    fn test_error_without_cause_is_one_line() {
        let text = error_chain(&SimError::ProposalMismatch);
        assert_eq!(text.lines().count(), 1);
    }
}
