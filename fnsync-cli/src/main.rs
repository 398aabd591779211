// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! fnsync CLI
//!
//! Declarative deployment of functions to a remote FaaS platform.

use clap::{Parser, Subcommand};

mod commands;
mod metrics;
mod planner;

/// fnsync - Keep functions on a FaaS platform in line with a manifest
#[derive(Parser)]
#[command(name = "fnsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Manifest file path
    #[arg(short, long, default_value = "fnsync.yaml")]
    pub config: String,

    /// State file holding persisted handles
    #[arg(short, long, default_value = ".fnsync-state.json")]
    pub state: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create, update or delete functions until the platform matches the manifest
    Apply {
        /// Delete managed functions that are no longer in the manifest
        #[arg(long)]
        prune: bool,

        /// Write Prometheus metrics to this file when done
        #[arg(long)]
        metrics_file: Option<String>,
    },

    /// Show what apply would change, without changing anything
    Plan {
        /// Include deletions of functions no longer in the manifest
        #[arg(long)]
        prune: bool,
    },

    /// Delete every managed function
    Destroy,

    /// List functions deployed on the platform
    List {
        /// Platform address (defaults to the manifest's addresses)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Validate the manifest and print derived identities
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Apply {
            prune,
            ref metrics_file,
        } => {
            commands::apply::execute(&cli.config, &cli.state, prune, metrics_file.as_deref()).await
        }
        Commands::Plan { prune } => commands::plan::execute(&cli.config, &cli.state, prune).await,
        Commands::Destroy => commands::destroy::execute(&cli.config, &cli.state).await,
        Commands::List { ref address } => {
            commands::list::execute(&cli.config, address.as_deref()).await
        }
        Commands::Validate => commands::validate::execute(&cli.config).await,
    }
}
