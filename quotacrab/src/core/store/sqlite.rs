use super::{CasOutcome, Store, StoreError};
use crate::core::credential::{Credential, FieldUpdate, validate_limit, validate_name};
use crate::core::window::{Usage, WindowPolicy};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS rate_limits (
    api_key TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    rate_limit INTEGER NOT NULL CHECK (rate_limit > 0),
    count INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0),
    window_start INTEGER NOT NULL,
    created_at INTEGER NOT NULL
)";

const SELECT_CREDENTIAL: &str =
    "SELECT api_key, name, rate_limit, count, window_start, created_at FROM rate_limits";

/// Durable credential store backed by SQLite
///
/// Holds a single connection behind a mutex. Every mutation runs inside a
/// `BEGIN IMMEDIATE` transaction and is committed before the call returns.
/// The database is opened in WAL mode with `synchronous=FULL`, so a commit that
/// returned has reached the disk.
///
/// Schema:
/// - rate_limits: (api_key TEXT PRIMARY KEY, name TEXT UNIQUE, rate_limit,
///   count, window_start, created_at)
///
/// # Example
///
/// ```
/// use quotacrab::{SqliteStore, Store};
///
/// let store = SqliteStore::open_in_memory().unwrap();
/// store.create("k1", "first", 10, 0).unwrap();
/// assert_eq!(store.get("k1").unwrap().limit, 10);
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists
    ///
    /// Missing parent directories are created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!(
                    "failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(&path).map_err(|e| {
            StoreError::Storage(format!(
                "failed to open sqlite database at {}: {e}",
                path.display()
            ))
        })?;
        Self::configure(&conn)?;

        tracing::debug!(path = %path.display(), "opened credential store");

        Ok(SqliteStore {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Open a private in-memory database
    ///
    /// Useful for tests; nothing is persisted.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of stored credentials
    pub fn len(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM rate_limits", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn configure(conn: &Connection) -> Result<(), StoreError> {
        // WAL: crash-safe with readers not blocking the writer
        // FULL: commit returns only once the data is on disk
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute(SCHEMA, [])?;
        Ok(())
    }
}

fn credential_from_row(row: &Row<'_>) -> rusqlite::Result<Credential> {
    Ok(Credential {
        key: row.get(0)?,
        name: row.get(1)?,
        limit: row.get(2)?,
        count: row.get(3)?,
        window_start: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Whether `err` is a UNIQUE violation on `column`
fn is_unique_violation(err: &rusqlite::Error, column: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) => {
            e.code == ErrorCode::ConstraintViolation && msg.contains(column)
        }
        _ => false,
    }
}

impl Store for SqliteStore {
    fn get(&self, key: &str) -> Result<Credential, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{SELECT_CREDENTIAL} WHERE api_key = ?1"),
            params![key],
            credential_from_row,
        )
        .optional()?
        .ok_or(StoreError::NotFound)
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

        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let name_taken = tx
            .query_row(
                "SELECT 1 FROM rate_limits WHERE name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if name_taken {
            return Err(StoreError::DuplicateName(name.to_string()));
        }

        let key_taken = tx
            .query_row(
                "SELECT 1 FROM rate_limits WHERE api_key = ?1",
                params![key],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if key_taken {
            return Err(StoreError::DuplicateKey);
        }

        let credential = Credential::new(key, name, limit, now);
        tx.execute(
            "INSERT INTO rate_limits (api_key, name, rate_limit, count, window_start, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                credential.key,
                credential.name,
                credential.limit,
                credential.count,
                credential.window_start,
                credential.created_at
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e, "rate_limits.name") {
                StoreError::DuplicateName(name.to_string())
            } else if is_unique_violation(&e, "rate_limits.api_key") {
                StoreError::DuplicateKey
            } else {
                e.into()
            }
        })?;
        tx.commit()?;

        Ok(credential)
    }

    fn update_field(&self, key: &str, update: &FieldUpdate) -> Result<(), StoreError> {
        update.validate()?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current_name: String = tx
            .query_row(
                "SELECT name FROM rate_limits WHERE api_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound)?;

        match update {
            FieldUpdate::Name(new_name) => {
                if current_name == *new_name {
                    return Ok(());
                }
                let taken = tx
                    .query_row(
                        "SELECT 1 FROM rate_limits WHERE name = ?1",
                        params![new_name],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();
                if taken {
                    return Err(StoreError::DuplicateName(new_name.clone()));
                }
                tx.execute(
                    "UPDATE rate_limits SET name = ?1 WHERE api_key = ?2",
                    params![new_name, key],
                )
                .map_err(|e| {
                    if is_unique_violation(&e, "rate_limits.name") {
                        StoreError::DuplicateName(new_name.clone())
                    } else {
                        e.into()
                    }
                })?;
            }
            FieldUpdate::Limit(limit) => {
                tx.execute(
                    "UPDATE rate_limits SET rate_limit = ?1 WHERE api_key = ?2",
                    params![limit, key],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn cas_increment_or_reset(
        &self,
        key: &str,
        now: i64,
        policy: &WindowPolicy,
    ) -> Result<CasOutcome, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let usage = tx
            .query_row(
                "SELECT rate_limit, count, window_start FROM rate_limits WHERE api_key = ?1",
                params![key],
                |row| {
                    Ok(Usage {
                        limit: row.get(0)?,
                        count: row.get(1)?,
                        window_start: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or(StoreError::NotFound)?;

        let eval = policy.evaluate(usage, now);
        if eval.dirty {
            tx.execute(
                "UPDATE rate_limits SET count = ?1, window_start = ?2 WHERE api_key = ?3",
                params![eval.usage.count, eval.usage.window_start, key],
            )?;
        }
        tx.commit()?;

        Ok(eval.into())
    }

    fn delete_expired(&self, older_than: i64, policy: &WindowPolicy) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Expiry is decided by the policy, not by SQL arithmetic
        let stale = {
            let mut stmt = tx.prepare("SELECT api_key, window_start FROM rate_limits")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut stale = Vec::new();
            for row in rows {
                let (key, window_start) = row?;
                if policy.is_expired(window_start, older_than) {
                    stale.push(key);
                }
            }
            stale
        };

        {
            let mut reset = tx.prepare(
                "UPDATE rate_limits SET count = 0, window_start = ?1 WHERE api_key = ?2",
            )?;
            for key in &stale {
                reset.execute(params![older_than, key])?;
            }
        }
        tx.commit()?;

        Ok(stale.len())
    }

    fn list(&self) -> Result<Vec<Credential>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{SELECT_CREDENTIAL} ORDER BY created_at, name"
        ))?;
        let credentials = stmt
            .query_map([], credential_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(credentials)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM rate_limits WHERE api_key = ?1", params![key])?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM rate_limits", [])?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_reopen_keeps_counters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rate-limits.db");
        let policy = WindowPolicy::new(Duration::from_secs(60));

        {
            let store = SqliteStore::open(&path).unwrap();
            store.create("k1", "durable", 3, 1_000).unwrap();
            assert!(store.cas_increment_or_reset("k1", 1_001, &policy).unwrap().admitted);
            assert!(store.cas_increment_or_reset("k1", 1_002, &policy).unwrap().admitted);
            assert_eq!(store.path(), Some(path.as_path()));
        }

        let store = SqliteStore::open(&path).unwrap();
        let credential = store.get("k1").unwrap();
        assert_eq!(credential.count, 2);
        assert_eq!(credential.window_start, 1_000);
        assert_eq!(credential.created_at, 1_000);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_rejection_does_not_write() {
        let store = SqliteStore::open_in_memory().unwrap();
        let policy = WindowPolicy::new(Duration::from_secs(60));
        store.create("k1", "one", 1, 0).unwrap();

        assert!(store.cas_increment_or_reset("k1", 1, &policy).unwrap().admitted);
        let outcome = store.cas_increment_or_reset("k1", 2, &policy).unwrap();
        assert!(!outcome.admitted);
        assert_eq!(outcome.count, 1);

        let credential = store.get("k1").unwrap();
        assert_eq!(credential.count, 1);
        assert_eq!(credential.window_start, 0);
    }

    #[test]
    fn test_schema_rejects_non_positive_limit() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.conn.lock();
        let result = conn.execute(
            "INSERT INTO rate_limits (api_key, name, rate_limit, count, window_start, created_at)
             VALUES ('k', 'n', 0, 0, 0, 0)",
            [],
        );
        assert!(result.is_err());
    }
}
