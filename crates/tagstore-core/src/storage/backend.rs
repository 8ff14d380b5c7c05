//! Storage backend abstraction
//!
//! A backend stores exactly one serialized document per collection. It knows
//! nothing about the document's shape; encoding and version checks live in
//! [`DocumentStore`](super::DocumentStore).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::error::{StorageError, StorageResult};

/// Durable storage for a single serialized document
pub trait StorageBackend: Send + Sync {
    /// Read the stored bytes, or `None` if nothing has been saved yet
    fn load(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Replace the stored bytes. Must be durable when this returns `Ok`.
    fn save(&self, data: &[u8]) -> StorageResult<()>;

    /// Human-readable location, used in logs and `status` output
    fn location(&self) -> String;
}

/// In-memory backend
///
/// Useful for tests and for embedding the collection without touching disk.
/// Writes can be made to fail to exercise rollback paths.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<Option<Vec<u8>>>,
    fail_writes: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that already holds `data`
    pub fn with_data(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Mutex::new(Some(data.into())),
            ..Self::default()
        }
    }

    /// Make subsequent `save` calls fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Snapshot of the stored bytes
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.contents())
    }

    fn save(&self, data: &[u8]) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "memory backend is rejecting writes".to_string(),
            ));
        }
        *self.data.lock().unwrap_or_else(|e| e.into_inner()) = Some(data.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
