//! skelanim library
//!
//! Rig documents and the command implementations behind the `skelanim`
//! binary.

pub mod cli;
pub mod commands;
pub mod document;
pub mod utils;
