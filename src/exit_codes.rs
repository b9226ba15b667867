//! Exit code constants for the partlock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 2: Storage failure (I/O or serialization)
//! - 3: Ownership conflict (already held, not held, not owner)
//! - 4: Timed out waiting for a file lock

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, empty key or owner, invalid configuration.
pub const USER_ERROR: i32 = 1;

/// Storage failure: a document could not be read, written or encoded.
pub const STORAGE_FAILURE: i32 = 2;

/// Ownership conflict: the requested checkout or check-in was refused.
pub const CONFLICT: i32 = 3;

/// Lock wait failure: the file lock was not granted within the configured timeout.
pub const LOCK_TIMEOUT: i32 = 4;
