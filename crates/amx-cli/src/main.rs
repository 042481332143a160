//! amx - installer for the AMX command-line tools

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use amx_cli::{Cli, Commands, Context, cmd};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::from_cli(&cli)?;

    match cli.command {
        Commands::Install {
            formulas,
            arch,
            skip_test,
            verbose,
            dep_homes,
        } => cmd::install::install(&ctx, &formulas, arch, skip_test, verbose, &dep_homes).await,
        Commands::Test { formula, timeout } => cmd::test::test(&ctx, &formula, timeout),
        Commands::Check { formula, arch } => cmd::check::check(&ctx, &formula, arch),
        Commands::Hash { files } => cmd::hash::hash(&files),
        Commands::List => cmd::list::list(&ctx),
    }
}
