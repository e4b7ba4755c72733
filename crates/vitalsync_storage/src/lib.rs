//! # VitalSync Storage
//!
//! Key-value persistence surface for VitalSync.
//!
//! This crate provides the lowest-level storage abstraction used by the
//! sync engine. Stores are **opaque string stores** keyed by short names;
//! they do not interpret the JSON documents they hold.
//!
//! ## Design Principles
//!
//! - Stores are simple key → string maps (get, set, remove)
//! - Every `set` replaces the whole value; there are no partial writes
//! - Stores may enforce a capacity quota, like origin-scoped browser storage
//! - Must be `Send + Sync` so the engine can share them behind an `Arc`
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral sessions
//! - [`FileStore`] - One file per key inside a locked directory
//!
//! ## Example
//!
//! ```rust
//! use vitalsync_storage::{KeyValueStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.set("greeting", "hello world").unwrap();
//! assert_eq!(store.get("greeting").unwrap().as_deref(), Some("hello world"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{validate_key, KeyValueStore};
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
