//! Data directory resolution for partlock.
//!
//! All documents of one installation live in a single data directory:
//!
//! ```text
//! <data-dir>/
//!   config.yaml      optional
//!   locks.json       checkout registry
//!   messages.json    message list
//!   audit.ndjson     audit trail
//! ```
//!
//! The directory is chosen from, in order: an explicit path (the `--data-dir`
//! flag), the `PARTLOCK_DATA_DIR` environment variable, or `./.partlock`.

use crate::audit::AuditLog;
use crate::config::Config;
use crate::error::{PartlockError, Result};
use crate::messages::MessageBox;
use crate::registry::LockTable;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "PARTLOCK_DATA_DIR";

/// Default data directory relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = ".partlock";

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "config.yaml";

/// A resolved data directory and its configuration.
#[derive(Debug, Clone)]
pub struct DataDir {
    /// Absolute or caller-relative path of the directory.
    pub root: PathBuf,

    /// Loaded `config.yaml`, or defaults.
    pub config: Config,
}

impl DataDir {
    /// Resolve the data directory path without touching the filesystem.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }

        if let Some(path) = env::var_os(DATA_DIR_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }

        let cwd = env::current_dir().map_err(|e| PartlockError::io(".", e))?;
        Ok(cwd.join(DEFAULT_DATA_DIR))
    }

    /// Open the data directory at `root`, loading its config.
    ///
    /// The directory must exist.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(PartlockError::InvalidInput(format!(
                "data directory '{}' does not exist",
                root.display()
            )));
        }

        let config = Config::load_or_default(root.join(CONFIG_FILE))?;
        Ok(Self { root, config })
    }

    /// Create the directory if needed, then open it.
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| PartlockError::io(root, e))?;
        Self::open(root)
    }

    /// Path of `config.yaml`.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Path of the checkout registry document.
    pub fn locks_path(&self) -> PathBuf {
        self.root.join(&self.config.locks_file)
    }

    /// Path of the message list document.
    pub fn messages_path(&self) -> PathBuf {
        self.root.join(&self.config.messages_file)
    }

    /// Path of the audit log.
    pub fn audit_path(&self) -> PathBuf {
        self.root.join(&self.config.audit_file)
    }

    /// Audit log for this directory.
    pub fn audit_log(&self) -> AuditLog {
        AuditLog::new(self.audit_path(), self.config.lock_wait())
    }

    /// Checkout registry, reporting to this directory's audit log.
    pub fn lock_table(&self) -> Result<LockTable> {
        Ok(LockTable::open(self.locks_path(), self.config.store_options())?
            .with_audit(Arc::new(self.audit_log())))
    }

    /// Message list, reporting to this directory's audit log.
    pub fn message_box(&self) -> Result<MessageBox> {
        Ok(MessageBox::open(self.messages_path(), self.config.store_options())?
            .with_audit(Arc::new(self.audit_log())))
    }
}
