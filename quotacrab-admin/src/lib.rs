//! # QuotaCrab Admin
//!
//! Provisioning tool for the credentials served by `quotacrab-server`. It
//! works directly on the server's SQLite database and can run while the
//! server is up.
//!
//! ```bash
//! quotacrab-admin setup
//! quotacrab-admin new billing 100
//! quotacrab-admin update <key> rate_limit=500
//! quotacrab-admin update <key> name=billing-eu
//! quotacrab-admin list
//! quotacrab-admin delete <key>
//! ```

pub mod cli;
pub mod commands;
