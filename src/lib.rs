//! Partlock: advisory file locking, atomic JSON documents and checkout
//! registries for a parts data management backend.
//!
//! Layers, leaves first:
//!
//! - [`fs::ExclusiveFile`]: one file held under an OS advisory lock,
//!   released on every exit path.
//! - [`store::DocumentStore`]: a JSON document read and written under that
//!   lock, with corrupt content loading as the empty document.
//! - [`registry::OwnedRegistry`]: keyed checkout records with
//!   acquire / release / force-release and ownership checks.
//!
//! [`messages::MessageBox`] keeps the message list in the same kind of store,
//! and [`audit::AuditLog`] appends to its trail under the same file lock. All
//! calls block; async callers must run them on a blocking pool.

pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod logging;
pub mod messages;
pub mod registry;
pub mod store;

pub use error::{PartlockError, Result};
