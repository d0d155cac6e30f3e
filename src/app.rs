//! Application edge: argument parsing and log setup.

pub mod cli;
pub mod logging;
