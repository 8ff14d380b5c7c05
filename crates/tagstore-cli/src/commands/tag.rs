//! Tag command handlers

use anyhow::{bail, Result};
use serde_json::{Map, Value};
use tokio::sync::broadcast::Receiver;

use tagstore_core::models::keys;
use tagstore_core::{Context, Event, TagComponent};

use crate::output::Output;

/// Optional tag fields given as flags
#[derive(Debug, Default, Clone)]
pub struct TagFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub last_scanned: Option<String>,
    pub device_id: Option<String>,
}

impl TagFields {
    /// Build the raw input object passed to tag validation
    pub fn to_input(&self, id: Option<&str>) -> Value {
        let mut input = Map::new();
        let fields = [
            (keys::TAG_ID, id),
            (keys::NAME, self.name.as_deref()),
            (keys::DESCRIPTION, self.description.as_deref()),
            (keys::LAST_SCANNED, self.last_scanned.as_deref()),
            (keys::DEVICE_ID, self.device_id.as_deref()),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                input.insert(key.to_string(), Value::String(value.to_string()));
            }
        }
        Value::Object(input)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.last_scanned.is_none()
            && self.device_id.is_none()
    }
}

/// List all tags
pub fn list(tags: &TagComponent, output: &Output) -> Result<()> {
    output.print_tags(&tags.list()?);
    Ok(())
}

/// Show a single tag
pub fn show(tags: &TagComponent, id: String, output: &Output) -> Result<()> {
    let tag = tags
        .get(&id)?
        .ok_or_else(|| anyhow::anyhow!("Tag not found: {}", id))?;
    output.print_tag(&tag);
    Ok(())
}

/// Create a tag
pub fn create(
    tags: &TagComponent,
    id: Option<String>,
    fields: TagFields,
    output: &Output,
) -> Result<()> {
    let tag = tags.create(&fields.to_input(id.as_deref()))?;
    output.success(&format!("Created tag {}", tag.id));
    output.print_tag(&tag);
    Ok(())
}

/// Update a tag
pub fn update(tags: &TagComponent, id: String, fields: TagFields, output: &Output) -> Result<()> {
    if fields.is_empty() {
        bail!(
            "Nothing to update. Pass at least one of \
             --name, --description, --last-scanned, --device-id."
        );
    }
    let tag = tags.update(&id, &fields.to_input(None))?;
    output.success(&format!("Updated tag {}", tag.id));
    output.print_tag(&tag);
    Ok(())
}

/// Delete a tag
pub fn delete(tags: &TagComponent, id: String, output: &Output) -> Result<()> {
    let tag = tags.delete(&id)?;
    output.success(&format!("Deleted tag {}", tag.display_name()));
    Ok(())
}

/// Record a scan of a tag
pub fn scan(
    tags: &TagComponent,
    events: &mut Receiver<Event>,
    tag_id: String,
    device_id: Option<String>,
    user: Option<String>,
    output: &Output,
) -> Result<()> {
    let context = user.map(Context::with_user);
    let result = tags.scan(&tag_id, device_id.as_deref(), context);

    // The event fires before persistence, so show it even if the scan failed
    let mut fired = Vec::new();
    while let Ok(event) = events.try_recv() {
        fired.push(event);
    }
    output.print_events(&fired);

    let tag = result?;
    output.success(&format!("Scanned {}", tag.display_name()));
    if !output.is_json() {
        output.print_tag(&tag);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_input_skips_unset_fields() {
        let fields = TagFields {
            name: Some("Front Door".to_string()),
            device_id: Some("phone".to_string()),
            ..TagFields::default()
        };

        assert_eq!(
            fields.to_input(Some("abc")),
            json!({"id": "abc", "name": "Front Door", "device_id": "phone"})
        );
        assert_eq!(
            fields.to_input(None),
            json!({"name": "Front Door", "device_id": "phone"})
        );
    }

    #[test]
    fn test_is_empty() {
        assert!(TagFields::default().is_empty());
        assert!(!TagFields {
            description: Some(String::new()),
            ..TagFields::default()
        }
        .is_empty());
    }
}
