//! Crash-atomic whole-file replacement.
//!
//! Used by stores opened with `WriteMode::Replace`. The new content is written
//! to a temporary sibling, synced, and renamed over the target, so a crash
//! leaves either the old or the new document on disk, never a torn one.
//!
//! The temporary name is fixed (`.{filename}.tmp`), so callers must already be
//! serialized (the store holds its sidecar lock around every call).
//!
//! - **POSIX**: `rename()` is atomic on the same filesystem; the parent
//!   directory is synced afterwards so the new entry is durable.
//! - **Windows**: `MoveFileExW` with `MOVEFILE_REPLACE_EXISTING`.

use crate::error::{PartlockError, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically replace `path` with `content`.
///
/// The parent directory must exist.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let temp_path = temp_path_for(path)?;

    write_and_sync(&temp_path, content)?;
    atomic_replace(&temp_path, path)
}

/// Temporary sibling used while replacing `target`.
pub(crate) fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            PartlockError::InvalidInput(format!("invalid document path '{}'", target.display()))
        })?;

    Ok(parent.join(format!(".{}.tmp", filename)))
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| PartlockError::io(path, e))?;

    if let Err(e) = file.write_all(content).and_then(|_| file.sync_all()) {
        let _ = fs::remove_file(path);
        return Err(PartlockError::io(path, e));
    }

    Ok(())
}

#[cfg(unix)]
fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    fs::rename(source, target).map_err(|e| {
        let _ = fs::remove_file(source);
        PartlockError::io(target, e)
    })?;

    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

#[cfg(windows)]
fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    use std::os::windows::ffi::OsStrExt;

    const MOVEFILE_REPLACE_EXISTING: u32 = 0x1;
    const MOVEFILE_WRITE_THROUGH: u32 = 0x8;

    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn MoveFileExW(
            lpExistingFileName: *const u16,
            lpNewFileName: *const u16,
            dwFlags: u32,
        ) -> i32;
    }

    let wide = |p: &Path| -> Vec<u16> {
        p.as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect()
    };
    let source_wide = wide(source);
    let target_wide = wide(target);

    // SAFETY: both buffers are NUL-terminated and outlive the call.
    let ok = unsafe {
        MoveFileExW(
            source_wide.as_ptr(),
            target_wide.as_ptr(),
            MOVEFILE_REPLACE_EXISTING | MOVEFILE_WRITE_THROUGH,
        )
    };

    if ok == 0 {
        let err = std::io::Error::last_os_error();
        let _ = fs::remove_file(source);
        return Err(PartlockError::io(target, err));
    }

    Ok(())
}
