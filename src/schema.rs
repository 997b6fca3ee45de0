//! Attribute schema mapping from a record's field definitions
//!
//! `attributes_schema_json` holds the editor's field list:
//!
//! ```json
//! [{ "name": "title", "type": "text", "default": "Hello" },
//!  { "name": "size", "type": "select", "options": [{ "value": "s" }, { "value": "l" }] }]
//! ```
//!
//! which maps to manifest attributes keyed by field name.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::store::AttributeSchemaMapper;
use crate::types::{ContentRecord, FIELD_ATTRIBUTES_SCHEMA};

#[derive(Debug, Clone, Deserialize)]
struct FieldDefinition {
    #[serde(alias = "id")]
    name: String,
    #[serde(rename = "type", default = "default_field_type")]
    field_type: String,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    options: Vec<Value>,
}

fn default_field_type() -> String {
    "text".to_string()
}

/// Maps editor field types onto block attribute types
#[derive(Debug, Default, Clone)]
pub struct FieldSchemaMapper;

impl FieldSchemaMapper {
    pub fn new() -> Self {
        Self
    }

    pub fn attribute_type(field_type: &str) -> &'static str {
        match field_type {
            "number" | "range" => "number",
            "toggle" | "boolean" => "boolean",
            "image" | "file" | "link" => "object",
            "repeater" | "gallery" | "checkbox" => "array",
            _ => "string",
        }
    }

    /// Build the attributes object from raw field JSON
    pub fn map_fields(&self, raw: &str) -> Option<Value> {
        let fields: Vec<FieldDefinition> = match serde_json::from_str(raw) {
            Ok(fields) => fields,
            Err(e) => {
                log::warn!("Ignoring invalid attribute schema: {}", e);
                return None;
            }
        };

        let mut attributes = Map::new();
        for field in fields {
            if field.name.trim().is_empty() {
                continue;
            }
            let mut attribute = Map::new();
            attribute.insert(
                "type".to_string(),
                json!(Self::attribute_type(&field.field_type)),
            );

            let choices: Vec<Value> = field
                .options
                .iter()
                .filter_map(|option| match option {
                    Value::Object(map) => map.get("value").cloned(),
                    other => Some(other.clone()),
                })
                .collect();
            if matches!(field.field_type.as_str(), "select" | "radio") && !choices.is_empty() {
                attribute.insert("enum".to_string(), Value::Array(choices));
            }

            if let Some(default) = field.default {
                attribute.insert("default".to_string(), default);
            }
            attributes.insert(field.name, Value::Object(attribute));
        }

        if attributes.is_empty() {
            None
        } else {
            Some(Value::Object(attributes))
        }
    }
}

impl AttributeSchemaMapper for FieldSchemaMapper {
    fn schema_for(&self, record: &ContentRecord) -> Option<Value> {
        let raw = record.field(FIELD_ATTRIBUTES_SCHEMA);
        if raw.trim().is_empty() {
            return None;
        }
        self.map_fields(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordKind;

    #[test]
    fn test_field_types_and_defaults() {
        let schema = FieldSchemaMapper::new()
            .map_fields(
                r#"[
                    {"name": "title", "type": "text", "default": "Hello"},
                    {"id": "count", "type": "range"},
                    {"name": "dark", "type": "toggle", "default": false},
                    {"name": "photo", "type": "image"},
                    {"name": "size", "type": "select", "options": [{"value": "s", "label": "Small"}, "l"]}
                ]"#,
            )
            .unwrap();

        assert_eq!(schema["title"], json!({"type": "string", "default": "Hello"}));
        assert_eq!(schema["count"], json!({"type": "number"}));
        assert_eq!(schema["dark"], json!({"type": "boolean", "default": false}));
        assert_eq!(schema["photo"], json!({"type": "object"}));
        assert_eq!(schema["size"], json!({"type": "string", "enum": ["s", "l"]}));
    }

    #[test]
    fn test_empty_or_invalid_schema() {
        let mapper = FieldSchemaMapper::new();
        assert!(mapper.map_fields("[]").is_none());
        assert!(mapper.map_fields("{oops").is_none());

        let record = ContentRecord::new(1, "Hero", RecordKind::Block);
        assert!(mapper.schema_for(&record).is_none());
    }
}
