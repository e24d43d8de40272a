//! Downstream address lookup
//!
//! Admitted requests are answered by a [`Lookup`]. The production
//! implementation shells out to `mmdbinspect` and relays its JSON output.

use async_trait::async_trait;
use serde_json::Value;
use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;

/// Errors from a lookup backend
#[derive(Error, Debug)]
pub enum LookupError {
    /// The lookup command could not be started
    #[error("failed to run lookup command: {0}")]
    Spawn(#[from] std::io::Error),

    /// The lookup command exited unsuccessfully
    #[error("lookup command exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// The lookup command printed something that is not JSON
    #[error("invalid lookup output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Resolves an address to a JSON document
///
/// `Ok(None)` means the lookup ran but had no data for the address.
#[async_trait]
pub trait Lookup: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<Value>, LookupError>;
}

/// Lookup backed by the `mmdbinspect` command line tool
///
/// Runs `<command> -db <database> <ip>` for each lookup.
#[derive(Debug, Clone)]
pub struct MmdbInspectLookup {
    command: String,
    database: PathBuf,
}

impl MmdbInspectLookup {
    pub fn new(command: impl Into<String>, database: impl Into<PathBuf>) -> Self {
        MmdbInspectLookup {
            command: command.into(),
            database: database.into(),
        }
    }
}

#[async_trait]
impl Lookup for MmdbInspectLookup {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<Value>, LookupError> {
        let output = Command::new(&self.command)
            .arg("-db")
            .arg(&self.database)
            .arg(ip.to_string())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(LookupError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let value: Value = serde_json::from_slice(&output.stdout)?;
        tracing::debug!(%ip, "lookup finished");
        Ok(has_records(&value).then_some(value))
    }
}

/// Whether lookup output carries any data
///
/// `mmdbinspect` prints an array with one entry per database, each holding a
/// `Records` list. An empty array, or entries whose records are all empty, mean
/// there is nothing to return. Shapes without a `Records` field are passed
/// through as data.
pub fn has_records(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(entries) => entries.iter().any(entry_has_records),
        other => entry_has_records(other),
    }
}

fn entry_has_records(entry: &Value) -> bool {
    match entry.get("Records") {
        None => !entry.is_null(),
        Some(Value::Array(records)) => records
            .iter()
            .any(|record| record.get("Record").map_or(!record.is_null(), |r| !r.is_null())),
        Some(Value::Null) => false,
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_output_has_no_records() {
        assert!(!has_records(&json!([])));
        assert!(!has_records(&Value::Null));
        assert!(!has_records(&json!([{ "Database": "x.mmdb", "Records": null }])));
        assert!(!has_records(&json!([{ "Database": "x.mmdb", "Records": [] }])));
        assert!(!has_records(
            &json!([{ "Records": [{ "Network": "0.0.0.0/0", "Record": null }] }])
        ));
    }

    #[test]
    fn test_records_are_detected() {
        let output = json!([{
            "Database": "location_sample.mmdb",
            "Records": [{
                "Network": "81.2.69.0/24",
                "Record": { "city": { "names": { "en": "London" } } }
            }],
            "Lookup": "81.2.69.160"
        }]);
        assert!(has_records(&output));

        // Unknown shapes are treated as data
        assert!(has_records(&json!({ "city": "London" })));
    }

    #[tokio::test]
    async fn test_missing_command_is_spawn_error() {
        let lookup = MmdbInspectLookup::new("quotacrab-no-such-command", "db.mmdb");
        let err = lookup.lookup("127.0.0.1".parse().unwrap()).await.unwrap_err();
        assert!(matches!(err, LookupError::Spawn(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_command_is_reported() {
        // `false` ignores its arguments and exits 1
        let lookup = MmdbInspectLookup::new("false", "db.mmdb");
        let err = lookup.lookup("127.0.0.1".parse().unwrap()).await.unwrap_err();
        assert!(matches!(err, LookupError::Failed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_json_output_is_parse_error() {
        // `echo` prints its arguments, which is not JSON
        let lookup = MmdbInspectLookup::new("echo", "db.mmdb");
        let err = lookup.lookup("127.0.0.1".parse().unwrap()).await.unwrap_err();
        assert!(matches!(err, LookupError::Parse(_)));
    }
}
