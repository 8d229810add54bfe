//! Extended XYZ files holding a single lattice configuration.
//!
//! ```text
//! 8
//! sc 2 2 2 1 1 1 1 1 1
//! 0 0 0 0 0.0 0.0 1.0
//! ...
//! ```
//!
//! Line 2 carries the lattice token, the box, the periodic flags and one
//! placeholder per spin component. Each atom line holds the species, the
//! integer lattice coordinates and `n_vector` spin components.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use nalgebra::Vector3;

use crate::error::{Result, SimError};
use crate::lattice::{site_count, LatticeConfig, LatticeType};

fn parse_err(line: usize, message: impl Into<String>) -> SimError {
    SimError::Parse {
        line,
        message: message.into(),
    }
}

fn parse_token<T: std::str::FromStr>(token: &str, line: usize, what: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| parse_err(line, format!("invalid {what} `{token}`")))
}

/// Serialize `config` to extended XYZ text.
pub fn format_xyz(config: &LatticeConfig) -> String {
    let dims = config.dims();
    let pbc = config.boundary().map(u8::from);
    let n_vector = config.n_vector();

    let mut out = String::with_capacity(32 * (config.n_sites() + 2));
    let _ = writeln!(out, "{}", config.n_sites());
    let _ = write!(
        out,
        "{} {} {} {} {} {} {}",
        config.lattice_type(),
        dims[0],
        dims[1],
        dims[2],
        pbc[0],
        pbc[1],
        pbc[2]
    );
    for _ in 0..n_vector {
        out.push_str(" 1");
    }
    out.push('\n');

    for (i, (spin, species)) in config.spins().iter().zip(config.species()).enumerate() {
        let [x, y, z] = config.site_coord(i);
        let _ = write!(out, "{species} {x} {y} {z}");
        for k in 0..n_vector {
            let _ = write!(out, " {}", spin[k]);
        }
        out.push('\n');
    }
    out
}

pub fn write_xyz<P: AsRef<Path>>(path: P, config: &LatticeConfig) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(format_xyz(config).as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Parse extended XYZ text. Every site of the box must appear exactly once.
pub fn parse_xyz(text: &str) -> Result<LatticeConfig> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));
    let mut next_line = |expect: &str| {
        lines
            .next()
            .ok_or_else(|| parse_err(0, format!("unexpected end of file, expected {expect}")))
    };

    let (ln, line) = next_line("atom count")?;
    let first = line
        .split_whitespace()
        .next()
        .ok_or_else(|| parse_err(ln, "missing atom count"))?;
    let nat: usize = parse_token(first, ln, "atom count")?;

    let (ln, line) = next_line("box line")?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 7 {
        return Err(parse_err(
            ln,
            "expected lattice type, 3 box dimensions and 3 pbc flags",
        ));
    }
    let lattice_type: LatticeType = tokens[0]
        .parse()
        .map_err(|_| parse_err(ln, format!("unknown lattice type `{}`", tokens[0])))?;
    let mut dims = [0usize; 3];
    let mut boundary = [true; 3];
    for axis in 0..3 {
        dims[axis] = parse_token(tokens[1 + axis], ln, "box dimension")?;
        boundary[axis] = match tokens[4 + axis] {
            "0" => false,
            "1" => true,
            other => return Err(parse_err(ln, format!("pbc flag must be 0 or 1, got `{other}`"))),
        };
    }
    let n_vector = tokens.len() - 7;
    if !(1..=3).contains(&n_vector) {
        return Err(parse_err(
            ln,
            format!("expected 1 to 3 spin component columns, got {n_vector}"),
        ));
    }

    let n_sites =
        site_count(dims).map_err(|_| parse_err(ln, format!("box {dims:?} has too many sites")))?;
    if nat != n_sites {
        return Err(parse_err(
            1,
            format!("atom count {nat} does not fill box {dims:?} ({n_sites} sites)"),
        ));
    }

    // every atom line must be present before the box is allocated
    let available = text.lines().skip(2).count();
    if available < nat {
        return Err(parse_err(
            0,
            format!("unexpected end of file, expected {nat} atom lines, found {available}"),
        ));
    }

    let layout = LatticeConfig::new(lattice_type, dims, boundary, n_vector)?;
    let mut species = vec![0i32; n_sites];
    let mut spins = vec![Vector3::zeros(); n_sites];
    let mut filled = vec![false; n_sites];

    for _ in 0..nat {
        let (ln, line) = next_line("atom line")?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 4 + n_vector {
            return Err(parse_err(
                ln,
                format!("expected {} columns, got {}", 4 + n_vector, tokens.len()),
            ));
        }

        let kind: i32 = parse_token(tokens[0], ln, "atom type")?;
        let mut site = [0usize; 3];
        for axis in 0..3 {
            site[axis] = parse_token(tokens[1 + axis], ln, "lattice coordinate")?;
        }
        if !layout.contains(site) {
            return Err(parse_err(ln, format!("site {site:?} outside box {dims:?}")));
        }

        let idx = layout.site_index(site);
        if filled[idx] {
            return Err(parse_err(ln, format!("site {site:?} listed twice")));
        }
        filled[idx] = true;
        species[idx] = kind;
        for k in 0..n_vector {
            spins[idx][k] = parse_token(tokens[4 + k], ln, "spin component")?;
        }
    }

    LatticeConfig::from_parts(lattice_type, dims, boundary, n_vector, species, spins)
}

pub fn read_xyz<P: AsRef<Path>>(path: P) -> Result<LatticeConfig> {
    let mut text = String::new();
    File::open(path)?.read_to_string(&mut text)?;
    parse_xyz(&text)
}
