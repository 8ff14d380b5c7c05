//! tagstore Core Library
//!
//! This crate keeps a persisted collection of NFC/QR tags and handles tag
//! scans.
//!
//! # Architecture
//!
//! - **StorageCollection**: generic in-memory collection, written through to
//!   storage on every change
//! - **Storage backends**: JSON file, SQLite, or memory
//! - **TagComponent**: the tag collection plus scan handling
//!
//! # Quick Start
//!
//! ```text
//! let bus = Arc::new(BroadcastBus::default());
//! let tags = TagComponent::from_config(&Config::load()?, bus)?;
//! tags.setup()?;
//!
//! tags.create(&json!({"id": "04:A2:19", "name": "Front Door"}))?;
//! tags.scan("04:A2:19", Some("phone"), None)?;
//! ```
//!
//! # Modules
//!
//! - `collection`: persisted keyed collection
//! - `id_manager`: identifier registry
//! - `notify`: change notification
//! - `validation`: field schemas for create/update input
//! - `storage`: backends and document encoding
//! - `events`: event bus and contexts
//! - `models`: the tag record and its schemas
//! - `tags`: tag component and scan handler
//! - `config`: application configuration

pub mod collection;
pub mod config;
pub mod events;
pub mod id_manager;
pub mod models;
pub mod notify;
pub mod storage;
pub mod tags;
pub mod timestamp;
pub mod validation;

pub use collection::{CollectionError, Record, Schema, StorageCollection};
pub use config::{BackendKind, Config};
pub use events::{BroadcastBus, Context, Event, EventBus};
pub use id_manager::{DuplicateIdentifierError, IdManager};
pub use models::{Tag, TagScanned};
pub use notify::{ChangeEvent, ChangeNotifier, ChangeType, SubscriptionId};
pub use storage::{StorageBackend, StorageError};
pub use tags::{TagCollection, TagComponent, TagError, DOMAIN, EVENT_TAG_SCANNED};
pub use validation::ValidationError;
