//! # storage-adapters
//!
//! Implementations of the `domains` ports:
//!
//! * [`memory`]: `dashmap`-backed local storage and an in-process backend
//!   (listings, categories, favorites, remote carts). Used by tests and demos.
//! * [`json_file`]: local storage as one JSON document per key in a directory.
//! * [`sqlite`]: the backend over SQLite (feature `db-sqlite`).
//! * [`notifier`]: notice sinks.

pub mod json_file;
pub mod memory;
pub mod notifier;

#[cfg(feature = "db-sqlite")]
pub mod sqlite;

pub use json_file::JsonFileLocalStorage;
pub use memory::{MemoryBackend, MemoryLocalStorage};
pub use notifier::{MemoryNotifier, TracingNotifier};

#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteBackend;
