// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - a store-and-forward message relay.
//!
//! This is the binary entry point for the relay.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use courier_config::CourierConfig;
use courier_core::{CourierError, StorageAdapter};
use courier_storage::{Database, SqliteStorage};

/// Courier - a store-and-forward message relay.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Configuration file layered over the standard lookup paths.
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay server.
    Serve,
    /// Create the message database schema.
    InitDb {
        /// Delete the existing database before recreating it.
        #[arg(long)]
        reset: bool,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match courier_config::load_and_validate(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::InitDb { reset }) => run_init_db(&config, reset).await,
        Some(Commands::Config) => print_config(&config),
        None => {
            println!("courier: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Creates the schema, dropping the old database first when `reset` is set.
async fn run_init_db(config: &CourierConfig, reset: bool) -> Result<(), CourierError> {
    let path = &config.storage.database_path;
    if reset {
        Database::remove_files(path).await?;
    }

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    storage.close().await?;

    println!("courier: database ready at {path}");
    Ok(())
}

fn print_config(config: &CourierConfig) -> Result<(), CourierError> {
    let rendered = config
        .to_toml()
        .map_err(|e| CourierError::Config(format!("failed to render configuration: {e}")))?;
    print!("{rendered}");
    Ok(())
}
