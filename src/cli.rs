// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lparclone")]
#[command(about = "Provision a Power Virtual Server instance from a snapshot of a running peer")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to the configuration file (default: discover in current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a commented lparclone.yml template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check the configuration without contacting the cloud
    Validate,

    /// Create the instance, clone the peer's volumes onto it, and boot it
    Provision {
        /// Skip post-provision and on-error hooks
        #[arg(long)]
        no_hooks: bool,
    },

    /// Clean up after a failed run: detach and delete cloned volumes
    Rollback {
        /// Secondary instance id (resolved by configured name when omitted)
        #[arg(long)]
        instance_id: Option<String>,

        /// Cloned boot volume to delete
        #[arg(long)]
        boot_volume: Option<String>,

        /// Cloned data volume to delete (repeatable)
        #[arg(long = "data-volume")]
        data_volumes: Vec<String>,
    },
}
