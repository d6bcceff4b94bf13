//! CLI argument surface and shared defaults.

pub mod args;
pub mod defaults;

pub use args::{Cli, Commands, OutputFormat};
