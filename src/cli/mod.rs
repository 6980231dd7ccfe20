//! CLI layer for tagflow-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! filtering text, scanning for markers, and replaying fragment streams
//! through a full session turn.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
