//! Storage backends for credentials and usage counters
//!
//! Every backend implements [`Store`]. The one primitive the admission path relies
//! on is [`Store::cas_increment_or_reset`]: read the usage, reset a stale window,
//! compare against the limit and write back, all as one indivisible unit per key.

use super::credential::{Credential, FieldUpdate};
use super::window::{Evaluation, WindowPolicy};
use thiserror::Error;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[cfg(test)]
mod store_test_suite;

/// Errors returned by [`Store`] operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No credential with this key
    #[error("API key not found")]
    NotFound,
    /// Another credential already uses this name
    #[error("Name '{0}' already exists")]
    DuplicateName(String),
    /// A credential with this key already exists
    #[error("API key already exists")]
    DuplicateKey,
    /// A provisioning value failed validation
    #[error("{0}")]
    InvalidValue(String),
    /// The backing storage failed to read or persist
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

/// Outcome of [`Store::cas_increment_or_reset`]
///
/// `count` and `window_start` describe the state after the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CasOutcome {
    pub admitted: bool,
    pub count: i64,
    pub limit: i64,
    pub window_start: i64,
}

impl From<Evaluation> for CasOutcome {
    fn from(eval: Evaluation) -> Self {
        CasOutcome {
            admitted: eval.admitted,
            count: eval.usage.count,
            limit: eval.usage.limit,
            window_start: eval.usage.window_start,
        }
    }
}

/// Credential storage with an atomic admission primitive
///
/// All mutating operations must be durable (for durable backends) before they
/// return `Ok`. Implementations are shared between threads, so every method
/// takes `&self`.
pub trait Store: Send + Sync {
    /// Fetch a credential by key
    fn get(&self, key: &str) -> Result<Credential, StoreError>;

    /// Insert a new credential with an empty window starting at `now`
    ///
    /// Fails with [`StoreError::DuplicateName`] or [`StoreError::DuplicateKey`]
    /// without mutating anything.
    fn create(&self, key: &str, name: &str, limit: i64, now: i64)
    -> Result<Credential, StoreError>;

    /// Change the name or limit of an existing credential
    ///
    /// Never touches `count` or `window_start`. A rename that collides fails with
    /// [`StoreError::DuplicateName`] and leaves the record as it was.
    fn update_field(&self, key: &str, update: &FieldUpdate) -> Result<(), StoreError>;

    /// Atomically reset a stale window, then admit and increment if under the limit
    ///
    /// Concurrent calls for the same key are totally ordered; calls that would
    /// exceed the limit are rejected without any write.
    fn cas_increment_or_reset(
        &self,
        key: &str,
        now: i64,
        policy: &WindowPolicy,
    ) -> Result<CasOutcome, StoreError>;

    /// Reset every window that is stale at `older_than`
    ///
    /// Affected records get `count = 0` and `window_start = older_than`.
    /// Returns the number of records affected.
    fn delete_expired(&self, older_than: i64, policy: &WindowPolicy)
    -> Result<usize, StoreError>;

    /// All credentials, oldest first
    fn list(&self) -> Result<Vec<Credential>, StoreError>;

    /// Remove a credential
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Remove every credential, returning how many were removed
    fn clear(&self) -> Result<usize, StoreError>;
}
