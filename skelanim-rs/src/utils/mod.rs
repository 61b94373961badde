//! Shared utilities for the skelanim CLI

pub mod format;
pub mod table;

pub use format::*;
pub use table::*;
