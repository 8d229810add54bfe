//! IO module - lattice files and control files.

mod control;
mod xyz;

pub use control::{
    parse_control, read_control, ConfigSection, ControlFile, HamiltonParams, HamiltonSection,
    OutputSection, SimType, TimeControlSection, CONTROL_VERSION,
};
pub use xyz::{format_xyz, parse_xyz, read_xyz, write_xyz};
