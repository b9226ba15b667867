//! Filesystem primitives for partlock.
//!
//! [`ExclusiveFile`] provides scoped advisory locking on one path;
//! [`atomic_write`] provides temp-file-and-rename replacement for stores that
//! want crash atomicity.

pub mod atomic;
mod exclusive;

pub use atomic::atomic_write;
pub use exclusive::{AccessMode, ExclusiveFile, LockWait};
