//! Config struct definition and default implementation.

use crate::store::WriteMode;
use serde::{Deserialize, Serialize};

/// Configuration for one partlock data directory.
///
/// This struct represents the contents of `<data-dir>/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Documents
    // =========================================================================
    /// File name of the checkout registry (default: "locks.json").
    #[serde(default = "default_locks_file")]
    pub locks_file: String,

    /// File name of the message list (default: "messages.json").
    #[serde(default = "default_messages_file")]
    pub messages_file: String,

    /// File name of the NDJSON audit log (default: "audit.ndjson").
    #[serde(default = "default_audit_file")]
    pub audit_file: String,

    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Minutes after which a checkout is reported as stale.
    #[serde(default = "default_lock_stale_minutes")]
    pub lock_stale_minutes: u32,

    /// Milliseconds to wait for a document lock. Unset blocks indefinitely.
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,

    /// How documents are written back to disk.
    #[serde(default)]
    pub write_mode: WriteMode,
}

fn default_locks_file() -> String {
    "locks.json".to_string()
}

fn default_messages_file() -> String {
    "messages.json".to_string()
}

fn default_audit_file() -> String {
    "audit.ndjson".to_string()
}

fn default_lock_stale_minutes() -> u32 {
    120
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locks_file: default_locks_file(),
            messages_file: default_messages_file(),
            audit_file: default_audit_file(),
            lock_stale_minutes: default_lock_stale_minutes(),
            lock_timeout_ms: None,
            write_mode: WriteMode::default(),
        }
    }
}
