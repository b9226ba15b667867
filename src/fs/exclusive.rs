//! Scoped exclusive access to a single file.
//!
//! [`ExclusiveFile`] opens a path and holds an OS advisory lock on the opened
//! descriptor until it is released or dropped. Advisory means only
//! participants that also go through this type (or any other flock /
//! `LockFileEx` user) are excluded; plain reads and writes are not blocked.
//!
//! # Platform backends
//!
//! Locking goes through the [`AdvisoryLock`] capability, implemented for
//! [`File`] on top of `fs2`: `flock(2)` on unix and `LockFileEx` on windows.
//! Both conflict between separate opens of the same path, within one process
//! as well as across processes.
//!
//! # Release
//!
//! Release is idempotent and also runs from `Drop`, so the lock is given up on
//! every exit path: normal return, `?` propagation and panic unwinding.

use crate::error::{PartlockError, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Longest sleep between two polling attempts of a bounded wait.
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How the backing file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Open an existing file for reading. Fails if the file is missing.
    Read,
    /// Open for reading and writing, creating the file if missing.
    /// Existing content is never truncated by the open itself.
    ReadWrite,
}

/// How long `acquire` may wait for the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockWait {
    /// Block the calling thread until the lock is granted.
    #[default]
    Blocking,
    /// Poll for the lock until the duration elapses.
    /// `Duration::ZERO` makes exactly one attempt.
    Timeout(Duration),
}

impl LockWait {
    /// Build a wait policy from an optional millisecond timeout.
    pub fn from_timeout_ms(timeout_ms: Option<u64>) -> Self {
        match timeout_ms {
            Some(ms) => LockWait::Timeout(Duration::from_millis(ms)),
            None => LockWait::Blocking,
        }
    }
}

/// Exclusive advisory locking on an open descriptor.
pub(crate) trait AdvisoryLock {
    /// Block until an exclusive lock is held.
    fn acquire_exclusive(&self) -> io::Result<()>;

    /// Try once. `Ok(false)` means another holder has it.
    fn try_acquire_exclusive(&self) -> io::Result<bool>;

    /// Give the lock up.
    fn release(&self) -> io::Result<()>;
}

impl AdvisoryLock for File {
    fn acquire_exclusive(&self) -> io::Result<()> {
        fs2::FileExt::lock_exclusive(self)
    }

    fn try_acquire_exclusive(&self) -> io::Result<bool> {
        match fs2::FileExt::try_lock_exclusive(self) {
            Ok(()) => Ok(true),
            Err(e) if is_contended(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn release(&self) -> io::Result<()> {
        fs2::FileExt::unlock(self)
    }
}

/// Whether a failed `try_lock` means "held elsewhere" rather than a real error.
#[cfg(unix)]
fn is_contended(err: &io::Error) -> bool {
    // flock reports EWOULDBLOCK; some targets surface it as a bare raw code.
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(windows)]
fn is_contended(err: &io::Error) -> bool {
    // ERROR_LOCK_VIOLATION
    err.raw_os_error() == Some(33)
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// An open file holding an exclusive advisory lock.
#[derive(Debug)]
pub struct ExclusiveFile {
    path: PathBuf,

    /// `None` once released.
    file: Option<File>,
}

impl ExclusiveFile {
    /// Open `path` in `mode` and wait for an exclusive lock on it.
    ///
    /// The parent directory must already exist. If locking fails after the
    /// open succeeded, the descriptor is closed before the error is returned.
    ///
    /// # Errors
    ///
    /// * `PartlockError::Io` - open failed, or the lock call itself failed
    /// * `PartlockError::LockTimeout` - a bounded wait expired
    pub fn acquire<P: AsRef<Path>>(path: P, mode: AccessMode, wait: LockWait) -> Result<Self> {
        let path = path.as_ref();

        let mut options = OpenOptions::new();
        match mode {
            AccessMode::Read => options.read(true),
            AccessMode::ReadWrite => options.read(true).write(true).create(true).truncate(false),
        };
        let file = options.open(path).map_err(|e| PartlockError::io(path, e))?;

        // `file` is dropped (closed) on the error path.
        lock_with_policy(&file, path, wait)?;
        debug!(path = %path.display(), ?mode, "acquired exclusive file lock");

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    /// Path this handle was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the lock is still held by this handle.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Read the whole file from the start.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.seek(SeekFrom::Start(0))
            .and_then(|_| self.read_to_end(&mut buf))
            .map_err(|e| PartlockError::io(&self.path, e))?;
        Ok(buf)
    }

    /// Replace the whole file content and flush it to disk.
    ///
    /// This is an in-place rewrite: a failure part way through can leave the
    /// file truncated.
    pub fn replace_contents(&mut self, content: &[u8]) -> Result<()> {
        let path = self.path.clone();
        let file = self.file_mut().map_err(|e| PartlockError::io(&path, e))?;
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.set_len(0))
            .and_then(|_| file.write_all(content))
            .and_then(|_| file.sync_all())
            .map_err(|e| PartlockError::io(&path, e))
    }

    /// Unlock and close. Calling it again is a no-op.
    pub fn release(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let result = AdvisoryLock::release(&file);
        // Closing the descriptor drops the lock even if the explicit unlock failed.
        drop(file);
        debug!(path = %self.path.display(), "released exclusive file lock");
        result.map_err(|e| PartlockError::io(&self.path, e))
    }

    fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("exclusive file handle already released"))
    }
}

impl Drop for ExclusiveFile {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path.display(), error = %e, "failed to release file lock");
        }
    }
}

impl Read for ExclusiveFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file_mut()?.read(buf)
    }
}

impl Write for ExclusiveFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_mut()?.flush()
    }
}

impl Seek for ExclusiveFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file_mut()?.seek(pos)
    }
}

fn lock_with_policy(file: &File, path: &Path, wait: LockWait) -> Result<()> {
    match wait {
        LockWait::Blocking => file
            .acquire_exclusive()
            .map_err(|e| PartlockError::io(path, e)),
        LockWait::Timeout(limit) => {
            let started = Instant::now();
            let mut interval = Duration::from_millis(1);
            loop {
                if file
                    .try_acquire_exclusive()
                    .map_err(|e| PartlockError::io(path, e))?
                {
                    return Ok(());
                }

                let waited = started.elapsed();
                if waited >= limit {
                    return Err(PartlockError::LockTimeout {
                        path: path.to_path_buf(),
                        waited,
                    });
                }

                thread::sleep(interval.min(limit - waited));
                interval = (interval * 2).min(MAX_POLL_INTERVAL);
            }
        }
    }
}
