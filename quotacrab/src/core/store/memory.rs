use super::{CasOutcome, Store, StoreError};
use crate::core::credential::{Credential, FieldUpdate, validate_limit, validate_name};
use crate::core::window::WindowPolicy;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

// Configuration constants
const DEFAULT_CAPACITY: usize = 1000;
const CAPACITY_OVERHEAD_FACTOR: f64 = 1.3;

/// Volatile in-memory credential store
///
/// Each credential sits behind its own mutex, so admissions for different keys
/// run in parallel and admissions for the same key are serialized. The outer
/// lock is only taken exclusively for structural changes (create, rename,
/// delete, clear).
///
/// Nothing survives a restart; use [`SqliteStore`](super::SqliteStore) for
/// durable deployments.
///
/// # Example
///
/// ```
/// use quotacrab::{MemoryStore, Store};
///
/// let store = MemoryStore::with_capacity(100);
/// store.create("k1", "first", 10, 0).unwrap();
/// assert_eq!(store.len(), 1);
/// ```
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

struct Inner {
    records: HashMap<String, Arc<Mutex<Credential>>>,
    // name -> key
    names: HashMap<String, String>,
}

impl MemoryStore {
    /// Create a new MemoryStore with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new MemoryStore sized for `capacity` credentials
    ///
    /// The store will allocate 30% more space to reduce rehashing.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = (capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize;
        MemoryStore {
            inner: RwLock::new(Inner {
                records: HashMap::with_capacity(capacity),
                names: HashMap::with_capacity(capacity),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Credential, StoreError> {
        let inner = self.inner.read();
        let record = inner.records.get(key).ok_or(StoreError::NotFound)?;
        let credential = record.lock().clone();
        Ok(credential)
    }

    fn create(
        &self,
        key: &str,
        name: &str,
        limit: i64,
        now: i64,
    ) -> Result<Credential, StoreError> {
        validate_name(name)?;
        validate_limit(limit)?;

        let mut inner = self.inner.write();
        if inner.names.contains_key(name) {
            return Err(StoreError::DuplicateName(name.to_string()));
        }
        if inner.records.contains_key(key) {
            return Err(StoreError::DuplicateKey);
        }

        let credential = Credential::new(key, name, limit, now);
        inner
            .records
            .insert(key.to_string(), Arc::new(Mutex::new(credential.clone())));
        inner.names.insert(name.to_string(), key.to_string());
        Ok(credential)
    }

    fn update_field(&self, key: &str, update: &FieldUpdate) -> Result<(), StoreError> {
        update.validate()?;

        match update {
            FieldUpdate::Name(new_name) => {
                let mut inner = self.inner.write();
                let record = inner.records.get(key).ok_or(StoreError::NotFound)?.clone();
                let mut credential = record.lock();
                if credential.name == *new_name {
                    return Ok(());
                }
                if inner.names.contains_key(new_name.as_str()) {
                    return Err(StoreError::DuplicateName(new_name.clone()));
                }
                inner.names.remove(credential.name.as_str());
                inner.names.insert(new_name.clone(), key.to_string());
                credential.name = new_name.clone();
            }
            FieldUpdate::Limit(limit) => {
                let inner = self.inner.read();
                let record = inner.records.get(key).ok_or(StoreError::NotFound)?;
                record.lock().limit = *limit;
            }
        }

        Ok(())
    }

    fn cas_increment_or_reset(
        &self,
        key: &str,
        now: i64,
        policy: &WindowPolicy,
    ) -> Result<CasOutcome, StoreError> {
        // Shared outer lock: other keys proceed, structural changes wait
        let inner = self.inner.read();
        let record = inner.records.get(key).ok_or(StoreError::NotFound)?;
        let mut credential = record.lock();

        let eval = policy.evaluate(credential.usage(), now);
        if eval.dirty {
            credential.count = eval.usage.count;
            credential.window_start = eval.usage.window_start;
        }
        Ok(eval.into())
    }

    fn delete_expired(&self, older_than: i64, policy: &WindowPolicy) -> Result<usize, StoreError> {
        let inner = self.inner.read();
        let mut affected = 0;
        for record in inner.records.values() {
            let mut credential = record.lock();
            if policy.is_expired(credential.window_start, older_than) {
                credential.count = 0;
                credential.window_start = older_than;
                affected += 1;
            }
        }
        Ok(affected)
    }

    fn list(&self) -> Result<Vec<Credential>, StoreError> {
        let inner = self.inner.read();
        let mut credentials: Vec<Credential> = inner
            .records
            .values()
            .map(|record| record.lock().clone())
            .collect();
        credentials.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(credentials)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let record = inner.records.remove(key).ok_or(StoreError::NotFound)?;
        let name = record.lock().name.clone();
        inner.names.remove(name.as_str());
        Ok(())
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let mut inner = self.inner.write();
        let removed = inner.records.len();
        inner.records.clear();
        inner.names.clear();
        Ok(removed)
    }
}
