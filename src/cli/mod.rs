//! CLI Module
//!
//! Command-line interface for replaying recorded events through a looper.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Loopgrid - loop construction for live step sequencing
#[derive(Parser, Debug)]
#[command(name = "loopgrid")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay events and store them as a loop set
    #[command(name = "store")]
    Store(StoreArgs),

    /// Show where a position lands with swing applied and removed
    #[command(name = "swing")]
    Swing {
        /// Position in beats
        #[arg(short, long, allow_negative_numbers = true)]
        position: f64,

        /// Swing amount, roughly -1 to 1
        #[arg(short, long, allow_negative_numbers = true)]
        amount: f64,

        /// Swing cells per beat
        #[arg(short, long, default_value_t = 2.0)]
        grid: f64,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// JSON file with an array of `{ "id", "position", "event" }` objects
    #[arg(short, long)]
    pub events: PathBuf,

    /// Target ids in slot order (defaults to first appearance in the events)
    #[arg(short, long, value_delimiter = ',')]
    pub targets: Vec<String>,

    /// End of the captured window (defaults to the end of the loop holding the last event)
    #[arg(long, allow_negative_numbers = true)]
    pub at: Option<f64>,

    /// Length of the captured window in beats
    #[arg(short, long)]
    pub length: Option<f64>,

    /// Grid-wide loop length
    #[arg(long)]
    pub grid_length: Option<f64>,

    /// Swing amount live during the performance and playback, strictly between -3 and 3
    #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub swing: f64,

    /// Apply the reverse transform
    #[arg(long)]
    pub reverse: bool,

    /// Apply the shift transform by this many beats
    #[arg(long, allow_negative_numbers = true)]
    pub shift: Option<f64>,

    /// Apply the double transform
    #[arg(long)]
    pub double: bool,

    /// Bake the transforms into the stored loop set
    #[arg(long)]
    pub flatten: bool,

    /// Looper config file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
