//! Storage layer
//!
//! Durable storage for collections.
//!
//! ## Architecture
//!
//! - **Backends**: store one opaque document per collection
//!   (JSON file, SQLite row, or memory)
//! - **DocumentStore**: wraps collection data in a versioned JSON envelope
//!
//! Collections write the whole document back on every mutation.

pub mod backend;
pub mod document;
pub mod error;
pub mod file;
pub mod sqlite;

pub use backend::{MemoryBackend, StorageBackend};
pub use document::{DocumentStore, STORAGE_VERSION};
pub use error::{StorageError, StorageResult};
pub use file::JsonFileBackend;
pub use sqlite::SqliteBackend;
