//! Atomic JSON document store.
//!
//! A [`DocumentStore`] owns one JSON file and exposes it as load / save /
//! update cycles. Each cycle runs under a single [`ExclusiveFile`]
//! acquisition, so a concurrent participant never observes a half-written
//! document, and `update` (load, mutate, save) is race-free as a whole.
//!
//! # Corrupt documents
//!
//! Missing, empty or unparseable files load as the empty document
//! (`D::default()`). Unparseable content is reported as a `corrupt document`
//! warning through `tracing` and is left untouched on disk until the next
//! successful save.
//!
//! # Write modes
//!
//! - [`WriteMode::InPlace`]: the lock is taken on the document itself and the
//!   content is rewritten through the locked descriptor. A failed write can
//!   leave a truncated file.
//! - [`WriteMode::Replace`]: the lock is taken on a sidecar `<file>.lock` and
//!   the document is replaced with temp-file-and-rename.
//!
//! Every participant on one document must use the same mode; the two modes
//! lock different files.
//!
//! Nothing is cached between calls: every operation re-reads the file.

use crate::error::{PartlockError, Result};
use crate::fs::{AccessMode, ExclusiveFile, LockWait, atomic_write};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How a document is written back to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Lock and rewrite the document file itself (default).
    #[default]
    InPlace,
    /// Lock a sidecar file and replace the document via temp file + rename.
    Replace,
}

/// Options shared by every operation on a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreOptions {
    /// How long to wait for the file lock.
    pub wait: LockWait,

    /// How the document is written.
    pub write_mode: WriteMode,
}

/// A single JSON document guarded by an exclusive file lock.
///
/// `D` is the decoded document shape: a keyed map for registries, a `Vec`
/// for list documents. `D::default()` is the empty document.
pub struct DocumentStore<D> {
    path: PathBuf,
    lock_path: PathBuf,
    options: StoreOptions,
    _document: PhantomData<fn() -> D>,
}

impl<D> fmt::Debug for DocumentStore<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("path", &self.path)
            .field("lock_path", &self.lock_path)
            .field("options", &self.options)
            .finish()
    }
}

impl<D> Clone for DocumentStore<D> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            lock_path: self.lock_path.clone(),
            options: self.options,
            _document: PhantomData,
        }
    }
}

impl<D> DocumentStore<D>
where
    D: Serialize + DeserializeOwned + Default,
{
    /// Open the store at `path`, creating the file with the empty document if
    /// it does not exist yet.
    ///
    /// Creation happens under the lock, so racing constructors and writers
    /// never overwrite each other. The parent directory must exist.
    pub fn open<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_path = match options.write_mode {
            WriteMode::InPlace => path.clone(),
            WriteMode::Replace => sidecar_lock_path(&path)?,
        };

        let store = Self {
            path,
            lock_path,
            options,
            _document: PhantomData,
        };
        store.ensure_document()?;
        Ok(store)
    }

    /// Path of the JSON document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current document.
    ///
    /// Missing, empty and corrupt files yield `D::default()`; only I/O and
    /// lock-wait failures are returned as errors.
    pub fn load(&self) -> Result<D> {
        let bytes = match self.options.write_mode {
            WriteMode::InPlace => {
                let mut handle =
                    match ExclusiveFile::acquire(&self.path, AccessMode::Read, self.options.wait) {
                        Ok(handle) => handle,
                        Err(PartlockError::Io { source, .. })
                            if source.kind() == io::ErrorKind::NotFound =>
                        {
                            return Ok(D::default());
                        }
                        Err(e) => return Err(e),
                    };
                let bytes = handle.read_all()?;
                handle.release()?;
                bytes
            }
            WriteMode::Replace => {
                let mut guard = self.lock()?;
                let bytes = self.read_replaced()?;
                guard.release()?;
                bytes
            }
        };

        Ok(self.decode(&bytes))
    }

    /// Replace the stored document with `document`.
    ///
    /// Serialization happens before any file is touched, so a
    /// `Serialization` error leaves the stored document unchanged.
    pub fn save(&self, document: &D) -> Result<()> {
        let bytes = encode(document)?;
        let mut handle = self.lock()?;
        self.write_locked(&mut handle, &bytes)?;
        handle.release()
    }

    /// Load, apply `mutator`, and save, all under one lock acquisition.
    ///
    /// If `mutator` returns an error nothing is written and the error is
    /// returned unchanged. The mutator's success value is passed through.
    pub fn update<T, F>(&self, mutator: F) -> Result<T>
    where
        F: FnOnce(&mut D) -> Result<T>,
    {
        let mut handle = self.lock()?;

        let bytes = match self.options.write_mode {
            WriteMode::InPlace => handle.read_all()?,
            WriteMode::Replace => self.read_replaced()?,
        };
        let mut document = self.decode(&bytes);

        let value = mutator(&mut document)?;

        let bytes = encode(&document)?;
        self.write_locked(&mut handle, &bytes)?;
        handle.release()?;
        Ok(value)
    }

    fn ensure_document(&self) -> Result<()> {
        let mut handle = self.lock()?;

        let missing = match self.options.write_mode {
            WriteMode::InPlace => is_blank(&handle.read_all()?),
            WriteMode::Replace => !self.path.exists(),
        };
        if missing {
            debug!(path = %self.path.display(), "initializing empty document");
            let bytes = encode(&D::default())?;
            self.write_locked(&mut handle, &bytes)?;
        }

        handle.release()
    }

    fn lock(&self) -> Result<ExclusiveFile> {
        ExclusiveFile::acquire(&self.lock_path, AccessMode::ReadWrite, self.options.wait)
    }

    fn read_replaced(&self) -> Result<Vec<u8>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(PartlockError::io(&self.path, e)),
        }
    }

    fn write_locked(&self, handle: &mut ExclusiveFile, bytes: &[u8]) -> Result<()> {
        match self.options.write_mode {
            WriteMode::InPlace => handle.replace_contents(bytes),
            WriteMode::Replace => atomic_write(&self.path, bytes),
        }
    }

    fn decode(&self, bytes: &[u8]) -> D {
        if is_blank(bytes) {
            return D::default();
        }

        match serde_json::from_slice(bytes) {
            Ok(document) => document,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "corrupt document, treating as empty"
                );
                D::default()
            }
        }
    }
}

fn encode<D: Serialize>(document: &D) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(document)?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

/// `<dir>/<file>.lock` next to the document.
fn sidecar_lock_path(path: &Path) -> Result<PathBuf> {
    let filename = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        PartlockError::InvalidInput(format!("invalid document path '{}'", path.display()))
    })?;
    Ok(path.with_file_name(format!("{}.lock", filename)))
}
