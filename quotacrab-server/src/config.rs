//! Server configuration and CLI argument parsing
//!
//! This module handles all server configuration through:
//! - Command-line arguments
//! - Environment variables (with QUOTACRAB_ prefix)
//!
//! # Configuration Priority
//!
//! The configuration system follows this precedence order:
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! The listening port additionally honours a plain `PORT` variable when neither
//! `--http-port` nor `QUOTACRAB_HTTP_PORT` is given.
//!
//! # Example Usage
//!
//! ```bash
//! # Using CLI arguments
//! quotacrab-server --http-port 9090 --db-path /var/lib/quotacrab/rate-limits.db
//!
//! # Using environment variables
//! export QUOTACRAB_WINDOW_SECS=3600
//! quotacrab-server
//! ```
//!
//! The configuration is built once at start-up and never changes afterwards.

use anyhow::{Result, anyhow};
use clap::Parser;
use quotacrab::WindowPolicy;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_HTTP_PORT: u16 = 3000;

/// Main configuration structure for the server
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listener configuration
    pub http: HttpConfig,
    /// Credential store configuration
    pub store: StoreConfig,
    /// Quota window
    pub quota: QuotaConfig,
    /// Admission actor configuration
    pub admission: AdmissionConfig,
    /// Background sweeper configuration
    pub sweeper: SweeperConfig,
    /// Downstream lookup configuration
    pub lookup: LookupConfig,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
    /// Take the client origin from `X-Forwarded-For` when present
    pub trust_forwarded_for: bool,
}

/// Credential store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite database file
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct QuotaConfig {
    /// Fixed window length
    pub window: Duration,
}

impl QuotaConfig {
    pub fn policy(&self) -> WindowPolicy {
        WindowPolicy::new(self.window)
    }
}

/// Admission actor configuration
#[derive(Debug, Clone, Copy)]
pub struct AdmissionConfig {
    /// Number of actors; keys are spread across them by hash
    pub shards: usize,
    /// Mailbox capacity of each actor
    pub buffer_size: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    pub interval: Duration,
}

/// Downstream lookup configuration
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Executable invoked for each admitted lookup
    pub command: String,
    /// Database file passed to the executable
    pub database: PathBuf,
}

/// Command-line arguments for the server
///
/// All arguments can also be set via environment variables with the
/// QUOTACRAB_ prefix. CLI arguments take precedence over environment variables.
///
/// # Examples
///
/// ```bash
/// quotacrab-server --http-host 0.0.0.0 --http-port 8080
/// quotacrab-server --window-secs 60 --log-level debug
/// ```
#[derive(Parser, Debug)]
#[command(
    name = "quotacrab-server",
    about = "Lookup endpoint with per-API-key quotas",
    long_about = "Serves GET /look behind per-API-key fixed-window quotas.\n\nEnvironment variables with QUOTACRAB_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // HTTP Transport
    #[arg(
        long,
        value_name = "HOST",
        help = "HTTP listen address (IPv4 or IPv6)",
        default_value = "127.0.0.1",
        env = "QUOTACRAB_HTTP_HOST"
    )]
    pub http_host: String,
    #[arg(
        long,
        value_name = "PORT",
        help = "HTTP port [default: $PORT or 3000]",
        env = "QUOTACRAB_HTTP_PORT"
    )]
    pub http_port: Option<u16>,
    #[arg(
        long,
        help = "Use the first X-Forwarded-For entry as the client origin",
        env = "QUOTACRAB_TRUST_FORWARDED_FOR"
    )]
    pub trust_forwarded_for: bool,

    // Store Configuration
    #[arg(
        long,
        value_name = "PATH",
        help = "SQLite database file",
        default_value = "rate-limits.db",
        env = "QUOTACRAB_DB_PATH"
    )]
    pub db_path: PathBuf,

    // Quota Configuration
    #[arg(
        long,
        value_name = "SECS",
        help = "Quota window length in seconds",
        default_value_t = 12 * 60 * 60,
        env = "QUOTACRAB_WINDOW_SECS"
    )]
    pub window_secs: u64,

    // Admission Configuration
    #[arg(
        long,
        value_name = "N",
        help = "Number of admission actors",
        default_value_t = 8,
        env = "QUOTACRAB_ADMISSION_SHARDS"
    )]
    pub admission_shards: usize,
    #[arg(
        long,
        value_name = "SIZE",
        help = "Mailbox size of each admission actor",
        default_value_t = 10_000,
        env = "QUOTACRAB_BUFFER_SIZE"
    )]
    pub buffer_size: usize,

    // Sweeper Configuration
    #[arg(
        long,
        value_name = "SECS",
        help = "Interval between stale window sweeps (seconds)",
        default_value_t = 60 * 60,
        env = "QUOTACRAB_SWEEP_INTERVAL_SECS"
    )]
    pub sweep_interval_secs: u64,

    // Lookup Configuration
    #[arg(
        long,
        value_name = "CMD",
        help = "Lookup executable",
        default_value = "mmdbinspect",
        env = "QUOTACRAB_LOOKUP_COMMAND"
    )]
    pub lookup_command: String,
    #[arg(
        long,
        value_name = "PATH",
        help = "Database passed to the lookup executable",
        default_value = "location_sample.mmdb",
        env = "QUOTACRAB_LOOKUP_DB"
    )]
    pub lookup_db: PathBuf,

    // General options
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "QUOTACRAB_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if any value fails validation.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        let fallback_port = std::env::var("PORT").ok().and_then(|p| p.parse().ok());
        Self::from_args(args, fallback_port)
    }

    /// Build configuration from already parsed arguments
    ///
    /// `fallback_port` is used when no port was given explicitly.
    pub fn from_args(args: Args, fallback_port: Option<u16>) -> Result<Self> {
        let config = Config {
            http: HttpConfig {
                host: args.http_host,
                port: args
                    .http_port
                    .or(fallback_port)
                    .unwrap_or(DEFAULT_HTTP_PORT),
                trust_forwarded_for: args.trust_forwarded_for,
            },
            store: StoreConfig {
                db_path: args.db_path,
            },
            quota: QuotaConfig {
                window: Duration::from_secs(args.window_secs),
            },
            admission: AdmissionConfig {
                shards: args.admission_shards,
                buffer_size: args.buffer_size,
            },
            sweeper: SweeperConfig {
                interval: Duration::from_secs(args.sweep_interval_secs),
            },
            lookup: LookupConfig {
                command: args.lookup_command,
                database: args.lookup_db,
            },
            log_level: args.log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid value.
    fn validate(&self) -> Result<()> {
        if self.quota.window.is_zero() {
            return Err(anyhow!("--window-secs must be greater than 0"));
        }
        if self.admission.shards == 0 {
            return Err(anyhow!("--admission-shards must be greater than 0"));
        }
        if self.admission.buffer_size == 0 {
            return Err(anyhow!("--buffer-size must be greater than 0"));
        }
        if self.sweeper.interval.is_zero() {
            return Err(anyhow!("--sweep-interval-secs must be greater than 0"));
        }
        if self.lookup.command.trim().is_empty() {
            return Err(anyhow!("--lookup-command must not be empty"));
        }
        Ok(())
    }

    /// Print all available environment variables and their descriptions
    fn print_env_vars() {
        println!("QuotaCrab Environment Variables");
        println!("===============================");
        println!();
        println!("All environment variables use the QUOTACRAB_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("HTTP Configuration:");
        println!("  QUOTACRAB_HTTP_HOST=<host>              HTTP host [default: 127.0.0.1]");
        println!("  QUOTACRAB_HTTP_PORT=<port>              HTTP port [default: $PORT or 3000]");
        println!(
            "  QUOTACRAB_TRUST_FORWARDED_FOR=true|false  Client origin from X-Forwarded-For [default: false]"
        );
        println!();

        println!("Store Configuration:");
        println!(
            "  QUOTACRAB_DB_PATH=<path>                SQLite database file [default: rate-limits.db]"
        );
        println!();

        println!("Quota Configuration:");
        println!(
            "  QUOTACRAB_WINDOW_SECS=<secs>            Quota window length [default: 43200]"
        );
        println!();

        println!("Admission Configuration:");
        println!("  QUOTACRAB_ADMISSION_SHARDS=<n>          Number of admission actors [default: 8]");
        println!("  QUOTACRAB_BUFFER_SIZE=<size>            Actor mailbox size [default: 10000]");
        println!();

        println!("Sweeper Configuration:");
        println!(
            "  QUOTACRAB_SWEEP_INTERVAL_SECS=<secs>    Interval between sweeps [default: 3600]"
        );
        println!();

        println!("Lookup Configuration:");
        println!(
            "  QUOTACRAB_LOOKUP_COMMAND=<cmd>          Lookup executable [default: mmdbinspect]"
        );
        println!(
            "  QUOTACRAB_LOOKUP_DB=<path>              Lookup database [default: location_sample.mmdb]"
        );
        println!();

        println!("General Configuration:");
        println!(
            "  QUOTACRAB_LOG_LEVEL=<level>             Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("Examples:");
        println!("  # One hour windows");
        println!("  export QUOTACRAB_WINDOW_SECS=3600");
        println!();
        println!("  # Run server (CLI args override env vars)");
        println!("  quotacrab-server --http-port 9090");
    }
}
