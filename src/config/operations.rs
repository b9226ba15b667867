//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{PartlockError, Result};
use crate::fs::LockWait;
use crate::store::StoreOptions;
use std::path::Path;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(PartlockError::Config)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            PartlockError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from `path`, or the defaults if the file does not exist.
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| PartlockError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| PartlockError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `lock_stale_minutes` must be positive
    /// - document file names must be plain, non-empty file names
    /// - the three document file names must be distinct
    pub fn validate(&self) -> Result<()> {
        if self.lock_stale_minutes == 0 {
            return Err(PartlockError::Config(
                "lock_stale_minutes must be greater than 0".to_string(),
            ));
        }

        let files = [
            ("locks_file", &self.locks_file),
            ("messages_file", &self.messages_file),
            ("audit_file", &self.audit_file),
        ];

        for (field, name) in files {
            if name.trim().is_empty() {
                return Err(PartlockError::Config(format!("{} must not be empty", field)));
            }
            if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
                return Err(PartlockError::Config(format!(
                    "{} must be a file name inside the data directory (found '{}')",
                    field, name
                )));
            }
        }

        for (i, (field_a, a)) in files.iter().enumerate() {
            for (field_b, b) in files.iter().skip(i + 1) {
                if a == b {
                    return Err(PartlockError::Config(format!(
                        "{} and {} must differ (both are '{}')",
                        field_a, field_b, a
                    )));
                }
            }
        }

        Ok(())
    }

    /// Store options derived from the lock settings.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            wait: self.lock_wait(),
            write_mode: self.write_mode,
        }
    }

    /// Lock wait policy derived from `lock_timeout_ms`.
    pub fn lock_wait(&self) -> LockWait {
        LockWait::from_timeout_ms(self.lock_timeout_ms)
    }
}
