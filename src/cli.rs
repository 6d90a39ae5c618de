use crate::output::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "perfmap",
    about = "Extract performance models from measured program behaviour",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the analysis over a universe and a recorded trace
    Analyze {
        /// JSON file describing the measurable elements
        #[arg(long)]
        universe: PathBuf,

        /// JSON file with the recorded measurement events
        #[arg(long)]
        trace: PathBuf,

        /// Configuration file (defaults to perfmap.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the configured round limit
        #[arg(long)]
        max_rounds: Option<usize>,

        /// Show a progress spinner
        #[arg(long)]
        progress: bool,
    },

    /// Write a default perfmap.toml into the current directory
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
