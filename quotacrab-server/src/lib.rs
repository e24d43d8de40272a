//! # QuotaCrab Server
//!
//! An HTTP lookup endpoint where every request is paid for with one unit of a
//! per-API-key quota.
//!
//! ## Purpose
//!
//! Each credential (an API key with a name and a request limit) may make at
//! most `limit` requests per fixed window. Requests over the limit are turned
//! away with `429` and the time the window resets. Admitted requests are
//! answered with address data from a lookup backend (`mmdbinspect` by
//! default).
//!
//! ## Quick Start
//!
//! ```bash
//! # Provision a credential
//! quotacrab-admin setup
//! quotacrab-admin new my-service 100
//!
//! # Start the server
//! quotacrab-server --http-port 3000
//!
//! # Use it
//! curl -H 'api-key: <key>' 'http://127.0.0.1:3000/look?ip=81.2.69.160'
//! ```
//!
//! ## Configuration
//!
//! Configure via CLI arguments or environment variables (CLI takes precedence):
//!
//! ```bash
//! export QUOTACRAB_WINDOW_SECS=3600
//! export QUOTACRAB_DB_PATH=/var/lib/quotacrab/rate-limits.db
//! quotacrab-server
//!
//! # List all available environment variables
//! quotacrab-server --list-env-vars
//! ```
//!
//! ## How It Works
//!
//! - Keys are hashed onto a fixed set of admission actors, so requests for one
//!   key are decided in arrival order
//! - Each decision is a single atomic increment-or-reset in the store
//! - Windows are fixed: a window is stale once more than the window length has
//!   passed since it started, and the next request opens a new one
//! - A background sweeper resets stale windows of idle keys every hour
//!
//! ## Response Headers
//!
//! Admitted responses carry:
//! - `X-RateLimit-Limit`: the credential's limit
//! - `X-RateLimit-Remaining`: requests left in this window
//! - `X-RateLimit-Reset`: end of the window, ms since epoch

pub mod actor;
pub mod config;
pub mod lookup;
pub mod metrics;
pub mod store;
pub mod sweeper;
pub mod transport;
pub mod types;

#[cfg(test)]
mod actor_tests;
