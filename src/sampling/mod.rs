//! Sampling module - the Metropolis driver and its run-time side tasks.

mod metropolis;
mod snapshot;
mod stats;

pub use metropolis::{
    metropolis_accept, DriverState, MetropolisDriver, Report, RunSummary, TimeControl, DEFAULT_PERIOD,
};
pub use snapshot::SnapshotWriter;
pub use stats::{autocorrelation_time, blocking_error, Statistics, StatsSummary};
