//! # QuotaCrab
//!
//! Per-credential request admission with fixed-window quotas and durable usage counters.
//!
//! ## Overview
//!
//! Every caller presents an opaque API key. Each key is a [`Credential`] with a
//! `limit` of admitted requests per window. QuotaCrab decides, per request, whether
//! the key still has quota left in its current window:
//!
//! - **Fixed windows**: a window starts at `window_start` and lasts a fixed duration
//! - **Reset before compare**: a stale window is reset before the limit is checked
//! - **Exactly-once accounting**: each admitted request increments the counter once
//! - **Durable**: the [`SqliteStore`] commits every counter change before returning
//!
//! ## Quick Start
//!
//! ```
//! use quotacrab::{Admission, Decision, MemoryStore, Store, WindowPolicy};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.create("4f2a9c", "reporting", 2, 0).unwrap();
//!
//! let admission = Admission::new(store, WindowPolicy::new(Duration::from_secs(60)));
//!
//! match admission.admit(Some("4f2a9c"), 1_000) {
//!     Decision::Admitted { remaining, .. } => println!("admitted, {remaining} left"),
//!     Decision::Rejected { reason, .. } => println!("rejected: {reason}"),
//!     Decision::Error(e) => println!("storage failure: {e}"),
//! }
//! ```
//!
//! ## Store Types
//!
//! ### [`SqliteStore`]
//! Durable store backed by a single SQLite table. WAL journal with `synchronous=FULL`,
//! every mutation in an immediate transaction.
//!
//! ```no_run
//! use quotacrab::SqliteStore;
//!
//! let store = SqliteStore::open("rate-limits.db")?;
//! # Ok::<(), quotacrab::StoreError>(())
//! ```
//!
//! ### [`MemoryStore`]
//! Volatile store with one mutex per key. Different keys never contend.
//!
//! ```
//! use quotacrab::MemoryStore;
//!
//! let store = MemoryStore::with_capacity(10_000);
//! ```
//!
//! ## Expiry Sweeping
//!
//! Abandoned keys keep stale windows around until their next request. A [`Sweeper`]
//! resets them in bulk using the same [`WindowPolicy`] as the request path:
//!
//! ```
//! use quotacrab::{MemoryStore, SweepOutcome, Sweeper, WindowPolicy};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let store = Arc::new(MemoryStore::new());
//! let sweeper = Sweeper::new(store, WindowPolicy::new(Duration::from_secs(60)));
//!
//! assert_eq!(sweeper.sweep(1_000).unwrap(), SweepOutcome::Completed(0));
//! ```
//!
//! ## Thread Safety
//!
//! Both stores are `Send + Sync` and take `&self`. Concurrent admissions for the
//! same key are serialized inside the store; at most `limit` of them are admitted
//! per window.
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for the in-memory store

pub mod core;

pub use core::{
    Admission, CasOutcome, Credential, Decision, FieldUpdate, MemoryStore, RejectReason,
    SqliteStore, Store, StoreError, SweepOutcome, Sweeper, Usage, WindowPolicy, clock,
};

// Store backends under a shorter path
pub use crate::core::store;
