//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Flip the tracker, track the time.
///
/// Maps each face of an orientation tracker to a Kimai activity and starts,
/// stops or corrects timesheets as the tracker is flipped.
#[derive(Debug, Parser)]
#[command(name = "ft", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track time from orientation readings, one per line on stdin.
    ///
    /// Runs until stdin closes or Ctrl-C is pressed.
    Watch,

    /// Show the timesheet currently running in Kimai.
    Status,

    /// Apply a single orientation reading, as if the tracker had been flipped.
    Flip {
        /// Orientation value: 0 or 9 for the base, 1-8 for a face.
        orientation: u8,
    },

    /// Write a config file template if none exists.
    Init,

    /// Show the configured side-to-activity mapping.
    Sides,
}
