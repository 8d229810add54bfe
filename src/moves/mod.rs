//! Moves module - single-site trial moves and their acceptance bookkeeping.

mod spin_flip;

pub use spin_flip::{random_orientation, MoveKind, MoveProposal, MoveSet};
