// ABOUTME: Entry point for the lparclone CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use lparclone::config::Config;
use lparclone::error::Result;
use lparclone::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise --verbose picks debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("lparclone=debug,info")
        } else if cli.quiet || cli.json {
            EnvFilter::new("error")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(OutputMode::from_flags(cli.quiet, cli.json));

    if let Err(e) = run(cli, output).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let cwd = env::current_dir()?;

    let load = || match &cli.config {
        Some(path) => Config::load(path),
        None => Config::discover(&cwd),
    };

    match &cli.command {
        Commands::Init { force } => commands::init(&cwd, *force, &output),
        Commands::Validate => commands::validate(load()?, &output),
        Commands::Provision { no_hooks } => {
            commands::provision(load()?, &cwd, !*no_hooks, output).await
        }
        Commands::Rollback {
            instance_id,
            boot_volume,
            data_volumes,
        } => {
            let target = commands::RollbackTarget {
                instance_id: instance_id.clone(),
                boot_volume: boot_volume.clone(),
                data_volumes: data_volumes.clone(),
            };
            commands::rollback(load()?, target, output).await
        }
    }
}
