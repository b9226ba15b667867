//! Keyed ownership registry.
//!
//! An [`OwnedRegistry`] is a JSON object mapping keys (typically filenames) to
//! entries that record their holder. Each key is either absent (free) or
//! present with exactly one entry (held):
//!
//! ```text
//! FREE --acquire--> HELD --release / force_release--> FREE
//! ```
//!
//! Every transition is a single [`DocumentStore::update`] cycle, so the
//! precondition check and the write happen under one file lock. Two
//! concurrent `acquire` calls for the same key, from any number of threads or
//! processes, produce exactly one success and `AlreadyHeld` for the rest.
//!
//! Entries are never modified in place: handing a key to another owner is a
//! release followed by an acquire. Keys and owners are compared verbatim;
//! only empty or all-whitespace values are rejected.
//!
//! # Malformed entries
//!
//! The document is decoded one entry at a time. An entry that does not match
//! `V` is skipped with a warning and reads as free, but stays on disk
//! untouched until an `acquire` of its key overwrites it. Entries keep the
//! order they have in the file; new keys are appended.
//!
//! # Usage
//!
//! ```no_run
//! use partlock::registry::{Authority, LockTable};
//! use partlock::store::StoreOptions;
//!
//! let locks = LockTable::open("data/locks.json", StoreOptions::default())?;
//! locks.checkout("part1.mcam", "alice", "editing fixture")?;
//! assert!(locks.is_held("part1.mcam")?);
//! locks.release("part1.mcam", "alice", Authority::Owner)?;
//! # Ok::<(), partlock::error::PartlockError>(())
//! ```

mod record;

#[cfg(test)]
mod tests;

pub use record::{LockRecord, OwnedEntry, local_identity};

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::error::{PartlockError, Result};
use crate::store::{DocumentStore, StoreOptions};
pub(crate) use record::require_identity;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Decoded view of a registry, ordered by key.
pub type Entries<V> = BTreeMap<String, V>;

/// Registry document as stored: key to raw entry, in file order.
type Document = Map<String, Value>;

/// Registry of file checkouts.
pub type LockTable = OwnedRegistry<LockRecord>;

/// Who is asking for a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// Must match the recorded owner.
    Owner,
    /// Bypasses the ownership check.
    Admin,
}

/// Keyed registry of owned entries backed by one JSON document.
pub struct OwnedRegistry<V> {
    store: DocumentStore<Document>,
    audit: Option<Arc<dyn AuditSink>>,
    _entry: PhantomData<fn() -> V>,
}

impl<V> Clone for OwnedRegistry<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            audit: self.audit.clone(),
            _entry: PhantomData,
        }
    }
}

impl<V> std::fmt::Debug for OwnedRegistry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedRegistry")
            .field("store", &self.store)
            .field("audited", &self.audit.is_some())
            .finish()
    }
}

impl<V: OwnedEntry> OwnedRegistry<V> {
    /// Open the registry document at `path`, creating `{}` if missing.
    pub fn open<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        Ok(Self {
            store: DocumentStore::open(path, options)?,
            audit: None,
            _entry: PhantomData,
        })
    }

    /// Report committed transitions to `sink`.
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Claim a free `key` for `entry.owner()`.
    ///
    /// # Errors
    ///
    /// * `AlreadyHeld` - the key is present; the existing entry is untouched
    /// * `InvalidInput` - empty key or empty owner
    pub fn acquire(&self, key: &str, entry: V) -> Result<()> {
        require_identity(key, "key")?;
        let owner = require_identity(entry.owner(), "owner")?.to_string();
        let value = serde_json::to_value(&entry)?;

        self.store.update(|document| {
            if let Some(existing) = self.decode_entry(document, key) {
                return Err(PartlockError::AlreadyHeld {
                    key: key.to_string(),
                    owner: existing.owner().to_string(),
                });
            }
            document.insert(key.to_string(), value);
            Ok(())
        })?;

        info!(key = %key, owner = %owner, "acquired");
        self.notify(AuditAction::Checkout, &owner, key, &entry);
        Ok(())
    }

    /// Release `key` on behalf of `owner` and return the removed entry.
    ///
    /// With `Authority::Admin` the ownership check is skipped and the
    /// transition is audited as an admin check-in.
    ///
    /// # Errors
    ///
    /// * `NotHeld` - the key is absent
    /// * `NotOwner` - held by someone else and `authority` is `Owner`
    /// * `InvalidInput` - empty key or empty owner
    pub fn release(&self, key: &str, owner: &str, authority: Authority) -> Result<V> {
        require_identity(key, "key")?;
        require_identity(owner, "owner")?;

        let removed = self.store.update(|document| {
            let existing = self
                .decode_entry(document, key)
                .ok_or_else(|| PartlockError::NotHeld { key: key.to_string() })?;
            if existing.owner() != owner && authority == Authority::Owner {
                return Err(PartlockError::NotOwner {
                    key: key.to_string(),
                    owner: existing.owner().to_string(),
                });
            }
            document.shift_remove(key);
            Ok(existing)
        })?;

        let action = if removed.owner() == owner {
            AuditAction::Checkin
        } else {
            AuditAction::AdminCheckin
        };
        info!(key = %key, owner = %owner, holder = %removed.owner(), %action, "released");
        self.notify(action, owner, key, &removed);
        Ok(removed)
    }

    /// Remove `key` without checking ownership and return the removed entry.
    ///
    /// Audited as `force_release` with the local process identity as actor.
    ///
    /// # Errors
    ///
    /// * `NotHeld` - the key is absent
    pub fn force_release(&self, key: &str) -> Result<V> {
        require_identity(key, "key")?;

        let removed = self.store.update(|document| {
            let existing = self
                .decode_entry(document, key)
                .ok_or_else(|| PartlockError::NotHeld { key: key.to_string() })?;
            document.shift_remove(key);
            Ok(existing)
        })?;

        warn!(key = %key, holder = %removed.owner(), "force-released");
        self.notify(AuditAction::ForceRelease, &local_identity(), key, &removed);
        Ok(removed)
    }

    /// Whether `key` is currently held.
    pub fn is_held(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Entry for `key`, if held.
    pub fn get(&self, key: &str) -> Result<Option<V>> {
        let document = self.store.load()?;
        Ok(self.decode_entry(&document, key))
    }

    /// All held entries, ordered by key.
    pub fn entries(&self) -> Result<Entries<V>> {
        let document = self.store.load()?;
        Ok(document
            .keys()
            .filter_map(|key| Some((key.clone(), self.decode_entry(&document, key)?)))
            .collect())
    }

    fn decode_entry(&self, document: &Document, key: &str) -> Option<V> {
        let value = document.get(key)?;
        match V::deserialize(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(
                    path = %self.store.path().display(),
                    key = %key,
                    error = %e,
                    "malformed entry, treating as free"
                );
                None
            }
        }
    }

    fn notify(&self, action: AuditAction, actor: &str, key: &str, entry: &V) {
        let Some(sink) = &self.audit else {
            return;
        };

        let details = match serde_json::to_value(entry) {
            Ok(details) => details,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to encode audit details");
                serde_json::Value::Null
            }
        };
        let event = AuditEvent::new(action, actor)
            .with_key(key)
            .with_details(details);

        // The transition is already committed; a lost audit line must not undo it.
        if let Err(e) = sink.record(&event) {
            warn!(key = %key, %action, error = %e, "failed to record audit event");
        }
    }
}

impl OwnedRegistry<LockRecord> {
    /// Check `key` out to `owner` with a checkout message.
    pub fn checkout(&self, key: &str, owner: &str, message: &str) -> Result<LockRecord> {
        let record = LockRecord::new(owner, message)?;
        self.acquire(key, record.clone())?;
        Ok(record)
    }

    /// Check `key` back in as its owner.
    pub fn checkin(&self, key: &str, owner: &str) -> Result<LockRecord> {
        self.release(key, owner, Authority::Owner)
    }

    /// Checkouts older than `stale_minutes`, ordered by key.
    ///
    /// Stale checkouts are only reported; clearing one is an explicit
    /// `force_release`.
    pub fn stale_entries(&self, stale_minutes: u32) -> Result<Vec<(String, LockRecord)>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|(_, record)| record.is_stale(stale_minutes))
            .collect())
    }
}
