//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tagflow-rs: streaming control-tag filter for model output.
///
/// Strips machine-readable markers out of streamed model text, decodes
/// their payloads, and keeps the visible text free of tag fragments no
/// matter how the stream is chunked.
#[derive(Parser, Debug)]
#[command(name = "tagflow-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the subject record database.
    ///
    /// When omitted, `replay` runs against an in-memory store.
    #[arg(short, long, env = "TAGFLOW_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Filter text, printing clean output and extracted payloads.
    ///
    /// With `--chunk-size` the input is fed to the filter in fragments of
    /// that many characters; the result is identical for any size.
    Filter {
        /// Input file (stdin if not provided).
        file: Option<PathBuf>,

        /// Feed the input in fragments of this many characters (0 = one pass).
        #[arg(long, default_value = "0")]
        chunk_size: usize,
    },

    /// Scan complete text for marker regions without streaming state.
    Scan {
        /// Input file (stdin if not provided).
        file: Option<PathBuf>,
    },

    /// Replay a fragment stream through a full session turn.
    ///
    /// Each line of the input is one source fragment; the turn's events
    /// are printed in order.
    Replay {
        /// Fragment file (stdin if not provided).
        file: Option<PathBuf>,

        /// Subject id field updates are applied against.
        #[arg(short, long, default_value = "replay-subject")]
        subject: String,

        /// Create the subject record before running the turn.
        #[arg(long)]
        create_subject: bool,
    },
}
