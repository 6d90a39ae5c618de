use anyhow::Result;
use perfmap::cli::{self, Commands};
use perfmap::commands::{analyze, init};

fn main() -> Result<()> {
    env_logger::init();
    let cli = cli::parse_args();
    match cli.command {
        Commands::Analyze {
            universe,
            trace,
            config,
            format,
            output,
            max_rounds,
            progress,
        } => analyze::run(analyze::AnalyzeOptions {
            universe,
            trace,
            config,
            format,
            output,
            max_rounds,
            progress,
        }),
        Commands::Init { force } => init::run(force),
    }
}
