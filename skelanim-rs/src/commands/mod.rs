//! Command implementations

pub mod rig;
pub mod simulate;
