//! Running statistics over measured samples.
//!
//! Error bars use blocking with block length 2τ, where τ is the integrated
//! autocorrelation time estimated from the initial positive sequence.

/// Energy and magnetization samples taken at each measure period.
#[derive(Debug, Clone)]
pub struct Statistics {
    energies: Vec<f64>,
    magnetizations: Vec<f64>,
    n_sites: usize,
    beta: f64,
}

/// Summary of a [`Statistics`] series. Per-site quantities are divided by
/// the number of sites.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSummary {
    pub samples: usize,
    pub energy_per_site: f64,
    pub energy_error: f64,
    pub autocorrelation_time: f64,
    pub magnetization_per_site: f64,
    /// β²(⟨E²⟩ − ⟨E⟩²)/N
    pub heat_capacity: f64,
    /// β(⟨M²⟩ − ⟨|M|⟩²)/N
    pub susceptibility: f64,
}

impl Statistics {
    pub fn new(n_sites: usize, beta: f64) -> Self {
        Self {
            energies: Vec::new(),
            magnetizations: Vec::new(),
            n_sites,
            beta,
        }
    }

    /// Record total energy and |M| of the current configuration.
    pub fn record(&mut self, energy: f64, magnetization: f64) {
        self.energies.push(energy);
        self.magnetizations.push(magnetization);
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn summarize(&self) -> Option<StatsSummary> {
        if self.is_empty() {
            return None;
        }
        let n = self.n_sites as f64;

        let mean_e = mean(&self.energies);
        let var_e = variance(&self.energies, mean_e);
        let tau = autocorrelation_time(&self.energies);
        let error = blocking_error(&self.energies, tau);

        let mean_m = mean(&self.magnetizations);
        let var_m = variance(&self.magnetizations, mean_m);

        Some(StatsSummary {
            samples: self.len(),
            energy_per_site: mean_e / n,
            energy_error: error / n,
            autocorrelation_time: tau,
            magnetization_per_site: mean_m / n,
            heat_capacity: self.beta * self.beta * var_e / n,
            susceptibility: self.beta * var_m / n,
        })
    }
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn variance(xs: &[f64], mean: f64) -> f64 {
    xs.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64
}

/// Integrated autocorrelation time, summed until the first negative lag.
pub fn autocorrelation_time(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 1.0;
    }
    let mean = mean(xs);
    let var = variance(xs, mean);
    if var == 0.0 {
        return 1.0;
    }

    let mut autocorr = 1.0;
    for t in 1..n / 2 {
        let auto_t: f64 = xs[..n - t]
            .iter()
            .zip(xs[t..].iter())
            .map(|(&x, &y)| (x - mean) * (y - mean))
            .sum::<f64>()
            / ((n - t) as f64 * var);

        if auto_t < 0.0 {
            break;
        }
        autocorr += 2.0 * auto_t;
    }
    autocorr
}

/// Standard error of the mean from block averages.
pub fn blocking_error(xs: &[f64], autocorrelation_time: f64) -> f64 {
    let block_size = ((2.0 * autocorrelation_time).ceil() as usize).max(1);
    let n_blocks = xs.len() / block_size;
    if n_blocks < 2 {
        return 0.0;
    }

    let block_means: Vec<f64> = xs
        .chunks_exact(block_size)
        .map(|block| block.iter().sum::<f64>() / block_size as f64)
        .collect();

    let mean = mean(&block_means);
    let variance = block_means.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n_blocks - 1) as f64;

    (variance / n_blocks as f64).sqrt()
}
