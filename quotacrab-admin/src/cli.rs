//! Command-line interface of the admin tool
//!
//! Options shared with the server use the same `QUOTACRAB_` environment
//! variables, so one environment configures both binaries.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "quotacrab-admin",
    about = "Provision and inspect quotacrab credentials",
    long_about = "Provision and inspect quotacrab credentials.\n\nEnvironment variables with QUOTACRAB_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Cli {
    #[arg(
        long,
        value_name = "PATH",
        help = "SQLite database file",
        default_value = "rate-limits.db",
        env = "QUOTACRAB_DB_PATH",
        global = true
    )]
    pub db_path: PathBuf,

    #[arg(
        long,
        value_name = "N",
        help = "Limit for credentials created without one",
        default_value_t = 2,
        env = "QUOTACRAB_DEFAULT_LIMIT",
        global = true
    )]
    pub default_limit: i64,

    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "warn",
        env = "QUOTACRAB_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create the database and schema if missing
    Setup,
    /// Issue a new API key
    New {
        /// Unique name of the client
        name: String,
        /// Requests per window [default: --default-limit]
        limit: Option<i64>,
    },
    /// Change the name or limit of a credential
    Update {
        /// API key to update
        key: String,
        /// `name=<name>` or `rate_limit=<n>`
        assignment: String,
    },
    /// Show one credential
    Show {
        key: String,
    },
    /// List all credentials
    List,
    /// Revoke an API key
    Delete {
        key: String,
    },
    /// Remove every credential
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}
