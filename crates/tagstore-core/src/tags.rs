//! Tag component
//!
//! `TagComponent` owns the tag collection and the event bus handle. It is
//! built explicitly at startup, loaded with [`setup`](TagComponent::setup),
//! and handed to whatever needs it.
//!
//! ## Scanning
//!
//! [`scan`](TagComponent::scan) fires `tag_scanned` first and only then
//! records the scan in the collection. Listeners therefore see the scan even
//! when persisting it fails afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::collection::{CollectionError, StorageCollection};
use crate::config::Config;
use crate::events::{Context, EventBus};
use crate::models::{keys, Tag};
use crate::notify::{ChangeEvent, SubscriptionId};
use crate::storage::{DocumentStore, StorageBackend, StorageError};
use crate::timestamp;
use crate::validation::ValidationError;

/// Domain name, also the storage key of the tag collection
pub const DOMAIN: &str = "tag";

/// Event fired for every scan
pub const EVENT_TAG_SCANNED: &str = "tag_scanned";

/// The tag collection
pub type TagCollection = StorageCollection<Tag>;

/// Errors from tag operations
#[derive(Error, Debug)]
pub enum TagError {
    #[error("Invalid tag data: {0}")]
    Validation(#[from] ValidationError),

    #[error("Tag with ID {id} already exists.")]
    TagIdExists { id: String },

    #[error("Tag not found: {id}")]
    NotFound { id: String },

    #[error("tag component has not been set up.")]
    NotInitialized,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<CollectionError> for TagError {
    fn from(err: CollectionError) -> Self {
        match err {
            CollectionError::Validation(e) => TagError::Validation(e),
            CollectionError::DuplicateIdentifier(e) => TagError::TagIdExists { id: e.id },
            CollectionError::NotFound { id } => TagError::NotFound { id },
            CollectionError::Storage(e) => TagError::Storage(e),
        }
    }
}

pub type TagResult<T> = Result<T, TagError>;

/// Owner of the tag collection
pub struct TagComponent {
    collection: Arc<TagCollection>,
    bus: Arc<dyn EventBus>,
    initialized: AtomicBool,
}

impl TagComponent {
    /// Create a component storing tags on `backend`
    pub fn new(backend: Arc<dyn StorageBackend>, bus: Arc<dyn EventBus>) -> Self {
        let store = DocumentStore::new(DOMAIN, backend);
        Self {
            collection: Arc::new(StorageCollection::new(store, Tag::schema())),
            bus,
            initialized: AtomicBool::new(false),
        }
    }

    /// Create a component using the backend selected in `config`
    pub fn from_config(config: &Config, bus: Arc<dyn EventBus>) -> TagResult<Self> {
        let backend = config.open_backend(DOMAIN)?;
        Ok(Self::new(backend, bus))
    }

    /// Load stored tags and start accepting operations
    pub fn setup(&self) -> TagResult<()> {
        let count = self.collection.load()?;
        self.initialized.store(true, Ordering::SeqCst);
        info!("Tag component set up with {} tag(s)", count);
        Ok(())
    }

    /// Stop accepting operations
    pub fn shutdown(&self) {
        if self.initialized.swap(false, Ordering::SeqCst) {
            info!("Tag component shut down");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Shared handle to the underlying collection
    pub fn collection(&self) -> Arc<TagCollection> {
        Arc::clone(&self.collection)
    }

    // ==================== Scanning ====================

    /// Handle a scan of `tag_id` by `device_id`
    ///
    /// Unknown tags are created; known tags get `last_scanned` and
    /// `device_id` refreshed. Returns the stored tag.
    pub fn scan(
        &self,
        tag_id: &str,
        device_id: Option<&str>,
        context: Option<Context>,
    ) -> TagResult<Tag> {
        self.scan_at(tag_id, device_id, context, timestamp::now())
    }

    /// [`scan`](Self::scan) with an explicit scan time
    pub fn scan_at(
        &self,
        tag_id: &str,
        device_id: Option<&str>,
        context: Option<Context>,
        scanned_at: DateTime<FixedOffset>,
    ) -> TagResult<Tag> {
        self.ensure_initialized()?;

        let name = self.collection.get(tag_id).and_then(|tag| tag.name);

        self.bus.fire(
            EVENT_TAG_SCANNED,
            json!({
                "tag_id": tag_id,
                "name": name,
                "device_id": device_id,
            }),
            context.unwrap_or_default(),
        );

        let mut patch = Map::new();
        patch.insert(
            keys::LAST_SCANNED.to_string(),
            Value::String(timestamp::normalize(&scanned_at)),
        );
        if let Some(device_id) = device_id {
            patch.insert(keys::DEVICE_ID.to_string(), Value::String(device_id.to_string()));
        }

        let mut create_input = patch.clone();
        create_input.insert(keys::TAG_ID.to_string(), Value::String(tag_id.to_string()));

        let change = self.collection.create_or_update(
            tag_id,
            &Value::Object(create_input),
            &Value::Object(patch),
        )?;

        debug!("Tag: {} scanned by device: {:?}", tag_id, device_id);
        Ok(change.into_item())
    }

    // ==================== Commands ====================

    pub fn list(&self) -> TagResult<Vec<Tag>> {
        self.ensure_initialized()?;
        Ok(self.collection.list())
    }

    pub fn get(&self, id: &str) -> TagResult<Option<Tag>> {
        self.ensure_initialized()?;
        Ok(self.collection.get(id))
    }

    pub fn create(&self, input: &Value) -> TagResult<Tag> {
        self.ensure_initialized()?;
        Ok(self.collection.create(input)?)
    }

    pub fn update(&self, id: &str, patch: &Value) -> TagResult<Tag> {
        self.ensure_initialized()?;
        Ok(self.collection.update(id, patch)?)
    }

    pub fn delete(&self, id: &str) -> TagResult<Tag> {
        self.ensure_initialized()?;
        Ok(self.collection.delete(id)?)
    }

    /// Register a listener for tag collection changes
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent<Tag>) + Send + Sync + 'static,
    {
        self.collection.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.collection.unsubscribe(id)
    }

    fn ensure_initialized(&self) -> TagResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(TagError::NotInitialized)
        }
    }
}
