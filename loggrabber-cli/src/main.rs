use clap::Parser;
use tracing_subscriber::EnvFilter;

use loggrabber_cli::cli::{Cli, Commands};
use loggrabber_cli::commands;
use loggrabber_cli::error::CliError;
use loggrabber_cli::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Diagnostics go to stderr so that `--output json` stays parseable.
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
        Commands::Filter(args) => commands::filter::execute(args, &cli.config, &writer).await,
        Commands::Fields(args) => commands::fields::execute(args, &writer),
        Commands::Status(args) => commands::status::execute(args, &cli.config, &writer).await,
    }
}
