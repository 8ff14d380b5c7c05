//! Persisted keyed collection
//!
//! [`StorageCollection`] keeps every item in memory, in insertion order, and
//! writes the whole collection back to storage on each mutation before the
//! call returns. Input for create/update is validated by a [`Schema`], ids
//! are assigned by an [`IdManager`], and every successful change is
//! published through a [`ChangeNotifier`].
//!
//! A mutation either fully succeeds (in memory, on disk, notified) or leaves
//! the collection untouched. Changes are queued while the collection lock is
//! held and delivered to listeners in commit order, after the lock is
//! released, so listeners may read or mutate the collection.
//!
//! ## Usage
//!
//! ```ignore
//! let collection = StorageCollection::new(store, Tag::schema());
//! collection.load()?;
//!
//! let tag = collection.create(&json!({"name": "Front Door"}))?;
//! collection.update(&tag.id, &json!({"description": "By the porch"}))?;
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, TryLockError};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::id_manager::{DuplicateIdentifierError, IdManager};
use crate::notify::{ChangeEvent, ChangeNotifier, SubscriptionId};
use crate::storage::{DocumentStore, StorageError};
use crate::validation::ValidationError;

/// An item that can live in a [`StorageCollection`]
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique identifier; empty until the collection assigns one
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);
}

/// Validation hooks for a record type
///
/// `create` builds a record from raw input, leaving the id empty when the
/// caller did not supply one. `update` returns the existing record with the
/// patch applied.
pub struct Schema<R> {
    pub create: fn(&Value) -> Result<R, ValidationError>,
    pub update: fn(&R, &Value) -> Result<R, ValidationError>,
}

impl<R> Clone for Schema<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Schema<R> {}

/// Errors from collection operations
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    DuplicateIdentifier(#[from] DuplicateIdentifierError),

    #[error("Item not found: {id}")]
    NotFound { id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Stored shape of a collection
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredItems<R> {
    items: Vec<R>,
}

#[derive(Serialize)]
struct StoredItemsRef<'a, R> {
    items: Vec<&'a R>,
}

struct Inner<R> {
    items: IndexMap<String, R>,
    ids: IdManager,
    /// Committed changes not yet handed to listeners
    pending: VecDeque<ChangeEvent<R>>,
}

/// In-memory collection mirrored to durable storage
pub struct StorageCollection<R: Record> {
    store: DocumentStore,
    schema: Schema<R>,
    inner: Mutex<Inner<R>>,
    notifier: ChangeNotifier<R>,
    /// Held by whichever thread is draining `pending`
    delivery: Mutex<()>,
}

impl<R: Record> StorageCollection<R> {
    /// Create an empty collection; call [`load`](Self::load) to read storage
    pub fn new(store: DocumentStore, schema: Schema<R>) -> Self {
        Self {
            store,
            schema,
            inner: Mutex::new(Inner {
                items: IndexMap::new(),
                ids: IdManager::new(),
                pending: VecDeque::new(),
            }),
            notifier: ChangeNotifier::new(),
            delivery: Mutex::new(()),
        }
    }

    /// Storage key of this collection
    pub fn key(&self) -> &str {
        self.store.key()
    }

    /// Where the collection is persisted
    pub fn location(&self) -> String {
        self.store.location()
    }

    /// Replace the in-memory state with what storage holds
    ///
    /// Missing data yields an empty collection. Malformed data is an error
    /// and leaves the current state untouched. Loading does not notify.
    pub fn load(&self) -> Result<usize, CollectionError> {
        let stored: Option<StoredItems<R>> = self.store.load()?;
        let stored_items = stored.map(|s| s.items).unwrap_or_default();

        let mut items = IndexMap::with_capacity(stored_items.len());
        for item in stored_items {
            if item.id().is_empty() {
                return Err(self.invalid("stored item has an empty id".to_string()).into());
            }
            if items.contains_key(item.id()) {
                return Err(self.invalid(format!("duplicate id '{}'", item.id())).into());
            }
            items.insert(item.id().to_string(), item);
        }

        let mut inner = self.lock();
        inner.ids.clear();
        for id in items.keys() {
            inner.ids.register(id.clone());
        }
        inner.items = items;

        info!(
            "Loaded {} item(s) into '{}' from {}",
            inner.items.len(),
            self.key(),
            self.location()
        );
        Ok(inner.items.len())
    }

    /// Write the current state back to storage
    pub fn save(&self) -> Result<(), CollectionError> {
        let inner = self.lock();
        self.persist(&inner.items)?;
        Ok(())
    }

    // ==================== Reads ====================

    pub fn get(&self, id: &str) -> Option<R> {
        self.lock().items.get(id).cloned()
    }

    /// All items in insertion order
    pub fn list(&self) -> Vec<R> {
        self.lock().items.values().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().ids.has_id(id)
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ==================== Mutations ====================

    /// Validate `input`, assign an id, persist, and notify `added`
    pub fn create(&self, input: &Value) -> Result<R, CollectionError> {
        let item = {
            let mut inner = self.lock();
            let item = self.create_locked(&mut inner, input, None)?;
            inner.pending.push_back(ChangeEvent::Added { item: item.clone() });
            item
        };
        self.deliver();
        Ok(item)
    }

    /// Apply `patch` to an existing item, persist, and notify `updated`
    pub fn update(&self, id: &str, patch: &Value) -> Result<R, CollectionError> {
        let item = {
            let mut inner = self.lock();
            let event = self.update_locked(&mut inner, id, patch)?;
            let item = event.item().clone();
            inner.pending.push_back(event);
            item
        };
        self.deliver();
        Ok(item)
    }

    /// Remove an item, persist, and notify `removed`
    pub fn delete(&self, id: &str) -> Result<R, CollectionError> {
        let item = {
            let mut inner = self.lock();
            let (index, key, item) = inner
                .items
                .shift_remove_full(id)
                .ok_or_else(|| CollectionError::NotFound { id: id.to_string() })?;

            if let Err(e) = self.persist(&inner.items) {
                warn!("Failed to persist removal of '{}': {}", id, e);
                inner.items.shift_insert(index, key, item);
                return Err(e.into());
            }

            inner.ids.release(id);
            debug!("Removed '{}' from '{}'", id, self.key());
            inner.pending.push_back(ChangeEvent::Removed { item: item.clone() });
            item
        };
        self.deliver();
        Ok(item)
    }

    /// Update `id` if it exists, otherwise create it from `create_input`
    ///
    /// A created item always gets `id`, whatever id `create_input` carries.
    /// The lookup and the mutation happen under one lock, so concurrent
    /// callers racing on the same unseen id produce exactly one create.
    pub fn create_or_update(
        &self,
        id: &str,
        create_input: &Value,
        patch: &Value,
    ) -> Result<ChangeEvent<R>, CollectionError> {
        let event = {
            let mut inner = self.lock();
            let event = if inner.ids.has_id(id) {
                self.update_locked(&mut inner, id, patch)?
            } else {
                ChangeEvent::Added {
                    item: self.create_locked(&mut inner, create_input, Some(id))?,
                }
            };
            inner.pending.push_back(event.clone());
            event
        };
        self.deliver();
        Ok(event)
    }

    // ==================== Subscriptions ====================

    /// Register a listener for changes made from now on
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent<R>) + Send + Sync + 'static,
    {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    // ==================== Internals ====================

    fn create_locked(
        &self,
        inner: &mut Inner<R>,
        input: &Value,
        id: Option<&str>,
    ) -> Result<R, CollectionError> {
        let mut item = (self.schema.create)(input)?;
        if let Some(id) = id {
            item.set_id(id.to_string());
        }

        let id = if item.id().is_empty() {
            inner.ids.generate_unique()
        } else {
            inner.ids.generate_id(item.id())?
        };
        item.set_id(id.clone());

        inner.items.insert(id.clone(), item.clone());
        if let Err(e) = self.persist(&inner.items) {
            warn!("Failed to persist creation of '{}': {}", id, e);
            inner.items.shift_remove(&id);
            return Err(e.into());
        }

        debug!("Created '{}' in '{}'", id, self.key());
        inner.ids.register(id);
        Ok(item)
    }

    fn update_locked(
        &self,
        inner: &mut Inner<R>,
        id: &str,
        patch: &Value,
    ) -> Result<ChangeEvent<R>, CollectionError> {
        let previous = inner
            .items
            .get(id)
            .cloned()
            .ok_or_else(|| CollectionError::NotFound { id: id.to_string() })?;

        let mut item = (self.schema.update)(&previous, patch)?;
        // ids are immutable
        item.set_id(id.to_string());

        inner.items.insert(id.to_string(), item.clone());
        if let Err(e) = self.persist(&inner.items) {
            warn!("Failed to persist update of '{}': {}", id, e);
            inner.items.insert(id.to_string(), previous);
            return Err(e.into());
        }

        debug!("Updated '{}' in '{}'", id, self.key());
        Ok(ChangeEvent::Updated { previous, item })
    }

    /// Hand queued changes to listeners in the order they were committed
    ///
    /// Only one thread delivers at a time. A change committed while another
    /// thread is delivering, or from inside a listener, is picked up by the
    /// delivering loop.
    fn deliver(&self) {
        loop {
            let delivering = match self.delivery.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(e)) => e.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };

            loop {
                let next = self.lock().pending.pop_front();
                let Some(event) = next else { break };
                self.notifier.notify(&event);
            }

            drop(delivering);
            // A change may have been queued between the last pop and the unlock
            if self.lock().pending.is_empty() {
                return;
            }
        }
    }

    fn persist(&self, items: &IndexMap<String, R>) -> Result<(), StorageError> {
        let data = StoredItemsRef {
            items: items.values().collect(),
        };
        self.store.save(&data)
    }

    fn invalid(&self, details: String) -> StorageError {
        StorageError::InvalidFormat {
            key: self.key().to_string(),
            details,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<R>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
