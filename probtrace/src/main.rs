use anyhow::Result;
use clap::Parser;
use probtrace::cli::{evaluate, fit, Cli, Commands};

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Evaluate(args) => {
            evaluate::run(args)?;
        }
        Commands::Fit(args) => {
            fit::run(args)?;
        }
    }

    Ok(())
}
