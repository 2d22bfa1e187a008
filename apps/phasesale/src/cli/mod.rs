//! # phasesale CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Write a starter sale file and create the database
//! - `status` - Show phase and statistics
//! - `quote` - Price a payment at the current time

mod commands;

use clap::{Parser, Subcommand};
use phasesale_core::SaleError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// phasesale - two-window token sale server
///
/// Hosts one sale: a pre-sale with a volume bonus followed by a main sale,
/// each with its own token cap, under operator halt/resume control.
#[derive(Parser, Debug)]
#[command(name = "phasesale")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the TOML sale file
    #[arg(short = 'c', long, global = true, default_value = "sale.toml")]
    pub config: PathBuf,

    /// Path to the sale database (redb backend only)
    #[arg(short = 'D', long, global = true, default_value = "phasesale.redb")]
    pub database: PathBuf,

    /// Storage backend: "redb" (durable) or "memory" (volatile)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Write a starter sale file and create the database
    Init {
        /// Overwrite an existing sale file
        #[arg(short, long)]
        force: bool,
    },

    /// Show phase and sale statistics
    Status,

    /// Price a payment at the current time without submitting it
    Quote {
        /// Payment amount in the currency's smallest unit
        #[arg(short, long)]
        amount: u128,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), SaleError> {
    let target = Target {
        config: cli.config,
        database: cli.database,
        backend: Backend::parse(&cli.backend)?,
    };
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&target, &host, port).await,
        Some(Commands::Init { force }) => cmd_init(&target, force),
        Some(Commands::Quote { amount }) => cmd_quote(&target, json_mode, amount),
        Some(Commands::Status) | None => cmd_status(&target, json_mode, cli.verbose),
    }
}
