//! Audit trail for registry state transitions.
//!
//! Registries report every committed checkout, check-in and force-release to
//! an [`AuditSink`]. The bundled sink, [`AuditLog`], appends one JSON object
//! per line (NDJSON) to a file while holding the file's exclusive lock, so
//! lines from concurrent processes never interleave.
//!
//! # Event Format
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: `checkout`, `checkin`, `admin_checkin`, `force_release`, `message_sent`
//! - `actor`: who performed the action
//! - `key`: registry key (or message id) the action applied to
//! - `details`: the affected record
//!
//! Force-releases are recorded under their own action so administrative
//! overrides can be told apart from normal check-ins.

use crate::error::{PartlockError, Result};
use crate::fs::{AccessMode, ExclusiveFile, LockWait};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Actions that can be audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Key acquired (FREE -> HELD)
    Checkout,
    /// Key released by its owner
    Checkin,
    /// Key released by an admin on behalf of its owner
    AdminCheckin,
    /// Key removed without an ownership check
    ForceRelease,
    /// Message appended to a message list
    MessageSent,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::Checkout => write!(f, "checkout"),
            AuditAction::Checkin => write!(f, "checkin"),
            AuditAction::AdminCheckin => write!(f, "admin_checkin"),
            AuditAction::ForceRelease => write!(f, "force_release"),
            AuditAction::MessageSent => write!(f, "message_sent"),
        }
    }
}

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the transition was committed.
    pub ts: DateTime<Utc>,

    pub action: AuditAction,

    pub actor: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Freeform details, usually the affected record.
    pub details: Value,
}

impl AuditEvent {
    /// Create an event stamped with the current time.
    pub fn new(action: AuditAction, actor: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor.into(),
            key: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the key this event applies to.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the details object.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize to a single JSON line (no trailing newline).
    pub fn to_ndjson_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Receiver of committed state transitions.
///
/// Called after the document lock has been released. Implementations must not
/// assume they run inside the registry's critical section.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<()>;
}

/// Append-only NDJSON audit file.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    wait: LockWait,
}

impl AuditLog {
    /// Audit log at `path`. The file is created on first append.
    pub fn new<P: AsRef<Path>>(path: P, wait: LockWait) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            wait,
        }
    }

    /// Path of the NDJSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `event` as one line.
    pub fn append(&self, event: &AuditEvent) -> Result<()> {
        // Serialize before touching the file.
        let line = event.to_ndjson_line()?;

        let mut handle = ExclusiveFile::acquire(&self.path, AccessMode::ReadWrite, self.wait)?;
        handle
            .seek(SeekFrom::End(0))
            .and_then(|_| writeln!(handle, "{}", line))
            .and_then(|_| handle.flush())
            .map_err(|e| PartlockError::io(&self.path, e))?;
        handle.release()
    }

    /// Read every event. Unparseable lines are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<AuditEvent>> {
        let mut handle = match ExclusiveFile::acquire(&self.path, AccessMode::Read, self.wait) {
            Ok(handle) => handle,
            Err(PartlockError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let bytes = handle.read_all()?;
        handle.release()?;

        let content = String::from_utf8_lossy(&bytes);
        let mut events = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "skipping unreadable audit line"
                ),
            }
        }
        Ok(events)
    }
}

impl AuditSink for AuditLog {
    fn record(&self, event: &AuditEvent) -> Result<()> {
        self.append(event)
    }
}
