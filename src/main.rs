//! Wavesmith CLI entry point.

use anyhow::Context;
use clap::Parser;

use wavesmith::cli::{commands, Cli, Commands};
use wavesmith::domain::models::Config;
use wavesmith::infrastructure::config::ConfigLoader;
use wavesmith::infrastructure::logging::{LogConfig, LoggerImpl};

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => wavesmith::cli::handle_error(err, cli.json),
    };

    // Held for the life of the process so buffered file logs are flushed.
    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging))
        .context("Failed to initialize logging")
    {
        Ok(logger) => logger,
        Err(err) => wavesmith::cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, cli.json).await,
        Commands::Build(args) => commands::build::execute(args, config, cli.json).await,
        Commands::Resume(args) => commands::resume::execute(args, config, cli.json).await,
        Commands::Verify(args) => commands::verify::execute(args, config, cli.json).await,
        Commands::Status(args) => commands::status::execute(args, cli.json).await,
        Commands::Demo(args) => commands::demo::execute(args, config, cli.json).await,
    };

    if let Err(err) = result {
        wavesmith::cli::handle_error(err, cli.json);
    }
}
