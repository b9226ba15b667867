//! Entry payloads stored in a registry.

use crate::error::{PartlockError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A registry value that records who holds its key.
pub trait OwnedEntry: Serialize + DeserializeOwned + Clone {
    /// Identity of the holder. Never empty for a stored entry.
    fn owner(&self) -> &str;
}

/// Checkout record for one file.
///
/// Serialized with the field names the web frontend already reads:
/// `{"user": ..., "timestamp": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Holder of the checkout.
    #[serde(rename = "user")]
    pub owner: String,

    /// When the checkout was taken. Informative only.
    #[serde(rename = "timestamp", with = "rfc3339")]
    pub acquired_at: DateTime<Utc>,

    /// Checkout message. May be empty.
    #[serde(rename = "message", default)]
    pub annotation: String,
}

impl LockRecord {
    /// Create a record for `owner` stamped with the current time.
    pub fn new(owner: &str, annotation: &str) -> Result<Self> {
        Ok(Self {
            owner: require_identity(owner, "owner")?.to_string(),
            acquired_at: Utc::now(),
            annotation: annotation.to_string(),
        })
    }

    /// Time since the checkout was taken.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.acquired_at)
    }

    /// Age formatted as `3d 2h`, `5h 12m` or `7m`.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else {
            format!("{}m", minutes)
        }
    }

    /// Whether the checkout is older than `stale_minutes`.
    pub fn is_stale(&self, stale_minutes: u32) -> bool {
        self.age().num_minutes() > stale_minutes as i64
    }
}

impl OwnedEntry for LockRecord {
    fn owner(&self) -> &str {
        &self.owner
    }
}

/// Identity of the current process user as `user@HOST`.
pub fn local_identity() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Reject an empty or all-whitespace identity. The value is kept verbatim.
pub(crate) fn require_identity<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(PartlockError::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(value)
}

/// RFC3339 with an explicit `+00:00` offset on output. Input may carry any
/// offset; a timestamp without one is read as UTC.
mod rfc3339 {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        raw.parse::<NaiveDateTime>()
            .map(|naive| naive.and_utc())
            .map_err(de::Error::custom)
    }
}
