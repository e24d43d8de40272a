//! Core components of the quotacrab admission library
//!
//! This module contains the fundamental building blocks:
//! - [`window`]: Fixed-window expiry rule shared by every code path
//! - [`credential`]: Credential records and provisioning-time validation
//! - [`store`]: Storage backends for credentials and usage counters
//! - [`admission`]: The admit/reject decision for a single request
//! - [`sweeper`]: Bulk reset of stale windows

pub mod admission;
pub mod clock;
pub mod credential;
pub mod store;
pub mod sweeper;
pub mod window;

pub use admission::{Admission, Decision, RejectReason};
pub use credential::{Credential, FieldUpdate};
pub use store::{CasOutcome, MemoryStore, SqliteStore, Store, StoreError};
pub use sweeper::{SweepOutcome, Sweeper};
pub use window::{Usage, WindowPolicy};
