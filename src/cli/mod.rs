//! CLI module for GeoSearch
//!
//! Provides subcommands:
//! - `serve`: HTTP + WebSocket server
//! - `migrate`: POI store schema migrations

pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};

/// GeoSearch - location search over points of interest
#[derive(Parser)]
#[command(name = "geosearch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the API server
    Serve,

    /// Apply, inspect or revert POI store migrations
    Migrate(migrate::MigrateArgs),
}
