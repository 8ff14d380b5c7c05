//! Versioned document encoding
//!
//! Every collection is stored as a single JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "key": "tag",
//!   "data": { "items": [] }
//! }
//! ```
//!
//! Only [`STORAGE_VERSION`] is accepted on load. Output is pretty-printed
//! with a stable field order so that saving a freshly loaded document
//! reproduces the same bytes.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};

/// The single supported storage version
pub const STORAGE_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    key: &'a str,
    data: &'a T,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnvelope {
    version: u32,
    key: String,
    data: serde_json::Value,
}

/// Encodes a collection's data into a versioned document on a backend
#[derive(Clone)]
pub struct DocumentStore {
    key: String,
    backend: Arc<dyn StorageBackend>,
}

impl DocumentStore {
    pub fn new(key: impl Into<String>, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            key: key.into(),
            backend,
        }
    }

    /// Storage key (collection name)
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Where the document lives
    pub fn location(&self) -> String {
        self.backend.location()
    }

    /// Load and decode the stored data
    ///
    /// Returns `None` if nothing has been stored yet. A document that cannot
    /// be parsed, has the wrong key, or carries another version is an error.
    pub fn load<T: DeserializeOwned>(&self) -> StorageResult<Option<T>> {
        let Some(bytes) = self.backend.load()? else {
            return Ok(None);
        };

        let raw: RawEnvelope =
            serde_json::from_slice(&bytes).map_err(|e| self.invalid(e.to_string()))?;

        if raw.version != STORAGE_VERSION {
            return Err(StorageError::UnsupportedVersion {
                key: self.key.clone(),
                found: raw.version,
                expected: STORAGE_VERSION,
            });
        }

        if raw.key != self.key {
            return Err(StorageError::KeyMismatch {
                expected: self.key.clone(),
                found: raw.key,
            });
        }

        let data = serde_json::from_value(raw.data).map_err(|e| self.invalid(e.to_string()))?;
        Ok(Some(data))
    }

    /// Encode `data` and write it through to the backend
    pub fn save<T: Serialize>(&self, data: &T) -> StorageResult<()> {
        let bytes = self.encode(data)?;
        self.backend.save(&bytes)
    }

    /// Encode `data` without writing it
    pub fn encode<T: Serialize>(&self, data: &T) -> StorageResult<Vec<u8>> {
        let envelope = EnvelopeRef {
            version: STORAGE_VERSION,
            key: &self.key,
            data,
        };
        serde_json::to_vec_pretty(&envelope).map_err(|e| self.invalid(e.to_string()))
    }

    fn invalid(&self, details: String) -> StorageError {
        StorageError::InvalidFormat {
            key: self.key.clone(),
            details,
        }
    }
}
