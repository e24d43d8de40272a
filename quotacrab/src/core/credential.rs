//! Credential records and provisioning-time validation

use super::store::StoreError;
use super::window::Usage;
use std::fmt;
use std::str::FromStr;

/// One issued API key and its usage in the current window
///
/// `key` and `created_at` never change after creation. `count` and
/// `window_start` are only ever written by the admission path and the sweeper;
/// `name` and `limit` by explicit provisioning updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Opaque lookup handle (hex-encoded random bytes)
    pub key: String,
    /// Unique human-readable label
    pub name: String,
    /// Maximum admitted requests per window (always positive)
    pub limit: i64,
    /// Requests admitted in the current window
    pub count: i64,
    /// Start of the current window (ms since epoch)
    pub window_start: i64,
    /// Creation time (ms since epoch), informational only
    pub created_at: i64,
}

impl Credential {
    /// A fresh credential whose first window starts at `now`
    pub fn new(key: impl Into<String>, name: impl Into<String>, limit: i64, now: i64) -> Self {
        Credential {
            key: key.into(),
            name: name.into(),
            limit,
            count: 0,
            window_start: now,
            created_at: now,
        }
    }

    pub fn usage(&self) -> Usage {
        Usage {
            limit: self.limit,
            count: self.count,
            window_start: self.window_start,
        }
    }

    /// Quota left in the current window, ignoring expiry
    pub fn remaining(&self) -> i64 {
        (self.limit - self.count).max(0)
    }
}

/// An update to one of the two provisioning-editable fields
///
/// Parsed from the `field=value` form used by the admin tool:
///
/// ```
/// use quotacrab::FieldUpdate;
///
/// let update: FieldUpdate = "rate_limit=100".parse().unwrap();
/// assert_eq!(update, FieldUpdate::Limit(100));
///
/// let update: FieldUpdate = "name=billing".parse().unwrap();
/// assert_eq!(update, FieldUpdate::Name("billing".to_string()));
///
/// assert!("rate_limit=0".parse::<FieldUpdate>().is_err());
/// assert!("count=5".parse::<FieldUpdate>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Name(String),
    Limit(i64),
}

impl FieldUpdate {
    /// Field names accepted by [`FromStr`]
    pub const ALLOWED_FIELDS: [&'static str; 2] = ["rate_limit", "name"];

    /// The canonical field name
    pub fn field(&self) -> &'static str {
        match self {
            FieldUpdate::Name(_) => "name",
            FieldUpdate::Limit(_) => "rate_limit",
        }
    }

    /// Check the new value without touching any store
    pub fn validate(&self) -> Result<(), StoreError> {
        match self {
            FieldUpdate::Name(name) => validate_name(name),
            FieldUpdate::Limit(limit) => validate_limit(*limit),
        }
    }
}

impl fmt::Display for FieldUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldUpdate::Name(name) => write!(f, "name={name}"),
            FieldUpdate::Limit(limit) => write!(f, "rate_limit={limit}"),
        }
    }
}

impl FromStr for FieldUpdate {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('=');
        let (Some(field), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(StoreError::InvalidValue(
                "Invalid field=value format".to_string(),
            ));
        };

        let update = match field {
            "name" => FieldUpdate::Name(value.to_string()),
            "rate_limit" | "limit" => {
                let limit = value.trim().parse::<i64>().map_err(|_| {
                    StoreError::InvalidValue("Rate limit must be a positive number".to_string())
                })?;
                FieldUpdate::Limit(limit)
            }
            other => {
                return Err(StoreError::InvalidValue(format!(
                    "Invalid field '{other}'. Allowed fields: {}",
                    Self::ALLOWED_FIELDS.join(", ")
                )));
            }
        };

        update.validate()?;
        Ok(update)
    }
}

/// A limit must be a positive integer
pub fn validate_limit(limit: i64) -> Result<(), StoreError> {
    if limit < 1 {
        return Err(StoreError::InvalidValue(
            "Rate limit must be a positive number".to_string(),
        ));
    }
    Ok(())
}

/// A name must contain at least one non-whitespace character
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidValue(
            "Name must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_credential_starts_empty() {
        let cred = Credential::new("abc", "svc", 5, 1_000);
        assert_eq!(cred.count, 0);
        assert_eq!(cred.window_start, 1_000);
        assert_eq!(cred.created_at, 1_000);
        assert_eq!(cred.remaining(), 5);
    }

    #[test]
    fn test_field_update_parsing() {
        assert_eq!(
            "limit=7".parse::<FieldUpdate>().unwrap(),
            FieldUpdate::Limit(7)
        );
        assert_eq!(
            "rate_limit= 12".parse::<FieldUpdate>().unwrap(),
            FieldUpdate::Limit(12)
        );
        assert!(matches!(
            "rate_limit=-3".parse::<FieldUpdate>(),
            Err(StoreError::InvalidValue(_))
        ));
        assert!(matches!(
            "rate_limit=ten".parse::<FieldUpdate>(),
            Err(StoreError::InvalidValue(_))
        ));
        assert!(matches!(
            "name".parse::<FieldUpdate>(),
            Err(StoreError::InvalidValue(_))
        ));
        assert!(matches!(
            "name=a=b".parse::<FieldUpdate>(),
            Err(StoreError::InvalidValue(_))
        ));
        assert!(matches!(
            "name=".parse::<FieldUpdate>(),
            Err(StoreError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_field_update_display_round_trips_field_name() {
        let update = FieldUpdate::Limit(3);
        assert_eq!(update.to_string(), "rate_limit=3");
        assert_eq!(update.field(), "rate_limit");
        assert_eq!(FieldUpdate::Name("x".into()).field(), "name");
    }
}
