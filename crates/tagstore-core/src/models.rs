//! Data models for tagstore
//!
//! Defines the tag record and the create/update schemas that validate input
//! before it reaches the collection.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collection::{Record, Schema};
use crate::validation::{Field, FieldKind, FieldSchema, ValidationError};

/// Field names shared by schemas, storage, and events
pub mod keys {
    pub const TAG_ID: &str = "id";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const LAST_SCANNED: &str = "last_scanned";
    pub const DEVICE_ID: &str = "device_id";
}

/// Fields accepted when creating a tag
pub const CREATE_FIELDS: FieldSchema = FieldSchema::new(&[
    Field::new(keys::TAG_ID, FieldKind::String),
    Field::new(keys::NAME, FieldKind::Text { min: 1 }),
    Field::new(keys::DESCRIPTION, FieldKind::String),
    Field::new(keys::LAST_SCANNED, FieldKind::Timestamp),
    Field::new(keys::DEVICE_ID, FieldKind::String),
]);

/// Fields accepted when updating a tag (everything but the id)
pub const UPDATE_FIELDS: FieldSchema = FieldSchema::new(&[
    Field::new(keys::NAME, FieldKind::Text { min: 1 }),
    Field::new(keys::DESCRIPTION, FieldKind::String),
    Field::new(keys::LAST_SCANNED, FieldKind::Timestamp),
    Field::new(keys::DEVICE_ID, FieldKind::String),
]);

/// A physical NFC/QR tag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Tag {
    /// Unique identifier, usually the value encoded on the tag
    pub id: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the tag was last scanned
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::timestamp::option"
    )]
    pub last_scanned: Option<DateTime<FixedOffset>>,
    /// Device that last scanned the tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl Tag {
    /// Create a tag with only an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            last_scanned: None,
            device_id: None,
        }
    }

    /// Validation hooks used by the tag collection
    pub fn schema() -> Schema<Tag> {
        Schema {
            create: create_tag,
            update: update_tag,
        }
    }

    /// Name if set, otherwise the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

}

impl Record for Tag {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Build a tag from create input; the id stays empty if none was given
fn create_tag(input: &Value) -> Result<Tag, ValidationError> {
    let mut data = CREATE_FIELDS.validate(input)?;
    Ok(Tag {
        id: data.take_string(keys::TAG_ID).unwrap_or_default(),
        name: data.take_string(keys::NAME),
        description: data.take_string(keys::DESCRIPTION),
        last_scanned: data.take_timestamp(keys::LAST_SCANNED),
        device_id: data.take_string(keys::DEVICE_ID),
    })
}

/// Apply an update patch; fields not in the patch keep their value
fn update_tag(existing: &Tag, patch: &Value) -> Result<Tag, ValidationError> {
    let mut data = UPDATE_FIELDS.validate(patch)?;
    let mut tag = existing.clone();

    if let Some(name) = data.take_string(keys::NAME) {
        tag.name = Some(name);
    }
    if let Some(description) = data.take_string(keys::DESCRIPTION) {
        tag.description = Some(description);
    }
    if let Some(last_scanned) = data.take_timestamp(keys::LAST_SCANNED) {
        tag.last_scanned = Some(last_scanned);
    }
    if let Some(device_id) = data.take_string(keys::DEVICE_ID) {
        tag.device_id = Some(device_id);
    }

    Ok(tag)
}

/// Payload of the `tag_scanned` event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagScanned {
    pub tag_id: String,
    pub name: Option<String>,
    pub device_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_full_input() {
        let tag = create_tag(&json!({
            "id": "04:A2:19",
            "name": "Front Door",
            "description": "By the porch",
            "last_scanned": "2024-05-01T12:30:00+00:00",
            "device_id": "phone"
        }))
        .unwrap();

        assert_eq!(tag.id, "04:A2:19");
        assert_eq!(tag.name.as_deref(), Some("Front Door"));
        assert_eq!(tag.description.as_deref(), Some("By the porch"));
        assert_eq!(
            tag.last_scanned.as_ref().map(crate::timestamp::normalize).as_deref(),
            Some("2024-05-01T12:30:00+00:00")
        );
        assert_eq!(tag.device_id.as_deref(), Some("phone"));
    }

    #[test]
    fn test_create_without_id_leaves_it_empty() {
        let tag = create_tag(&json!({"name": "Garage"})).unwrap();
        assert!(tag.id.is_empty());
    }

    #[test]
    fn test_create_rejects_empty_name() {
        let err = create_tag(&json!({"name": ""})).unwrap_err();
        assert!(matches!(err, ValidationError::TooShort { .. }));
    }

    #[test]
    fn test_create_rejects_unknown_field() {
        let err = create_tag(&json!({"id": "a", "color": "blue"})).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownField { .. }));
    }

    #[test]
    fn test_update_keeps_unspecified_fields() {
        let mut existing = Tag::new("abc");
        existing.name = Some("Front Door".to_string());
        existing.description = Some("Porch".to_string());

        let updated = update_tag(
            &existing,
            &json!({"last_scanned": "2024-05-01T12:30:00Z", "device_id": "d2"}),
        )
        .unwrap();

        assert_eq!(updated.name.as_deref(), Some("Front Door"));
        assert_eq!(updated.description.as_deref(), Some("Porch"));
        assert_eq!(updated.device_id.as_deref(), Some("d2"));
        assert!(updated.last_scanned.is_some());
    }

    #[test]
    fn test_update_rejects_id() {
        let err = update_tag(&Tag::new("abc"), &json!({"id": "other"})).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownField {
                field: "id".to_string()
            }
        );
    }

    #[test]
    fn test_serialization_omits_absent_fields() {
        let mut tag = Tag::new("abc");
        tag.last_scanned = crate::timestamp::parse("2024-05-01T12:30:00.5+00:00");

        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(
            json,
            json!({"id": "abc", "last_scanned": "2024-05-01T12:30:00.500+00:00"})
        );

        let back: Tag = serde_json::from_value(json).unwrap();
        assert_eq!(back, tag);
    }

    #[test]
    fn test_stored_tag_with_unknown_field_is_rejected() {
        let result = serde_json::from_value::<Tag>(json!({"id": "a", "color": "red"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_display_name() {
        let mut tag = Tag::new("abc");
        assert_eq!(tag.display_name(), "abc");
        tag.name = Some("Kitchen".to_string());
        assert_eq!(tag.display_name(), "Kitchen");
    }
}
