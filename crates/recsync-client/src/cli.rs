//! Command-line interface definition.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// recsync - Archive cloud meeting recordings locally
#[derive(Debug, Parser)]
#[command(name = "recsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "RECSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log format: pretty, compact or json
    #[arg(long, env = "RECSYNC_LOG_FORMAT", default_value = "compact", global = true)]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download recordings, then delete them from the cloud
    Sync(SyncArgs),

    /// List the users whose recordings would be synchronized
    Users {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Inspect the completion ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options for `recsync sync`.
#[derive(Debug, Default, clap::Args)]
pub struct SyncArgs {
    /// First day to synchronize (YYYY-MM-DD), overrides the config
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day to synchronize, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Show what would be downloaded without downloading or deleting
    #[arg(long)]
    pub dry_run: bool,

    /// Keep recordings in the cloud after downloading them
    #[arg(long)]
    pub no_delete: bool,

    /// Only synchronize this user (can be repeated)
    #[arg(long = "user", action = clap::ArgAction::Append)]
    pub users: Vec<String>,
}

/// Ledger actions.
#[derive(Debug, Subcommand)]
pub enum LedgerAction {
    /// Show the ledger file path
    Path,
    /// List completed recording IDs
    List,
    /// Exit successfully if a recording ID is in the ledger
    Contains {
        /// Recording UUID as stored in the ledger
        id: String,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,
    /// Validate configuration
    Validate,
    /// Show configuration file path
    Path,
}
