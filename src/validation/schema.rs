//! Structural validation against JSON schemas.

use jsonschema::JSONSchema;
use serde_json::{json, Value};

use super::{ValidationIssue, ValidationResult};
use crate::error::{ModelError, ModelResult};

/// Compiled schemas for the model root and its descriptors.
pub struct ModelSchemas {
    root: JSONSchema,
    collection: JSONSchema,
    single: JSONSchema,
}

impl ModelSchemas {
    pub fn compile() -> ModelResult<Self> {
        Ok(Self {
            root: compile(&root_schema())?,
            collection: compile(&collection_schema())?,
            single: compile(&single_schema())?,
        })
    }

    /// Validates the overall document shape. Issue paths start at the section
    /// name, e.g. `serve[0].config`.
    pub fn validate_root(&self, model: &Value) -> ValidationResult {
        collect(&self.root, model, "")
    }

    pub fn validate_collection(&self, entry: &Value, path: &str) -> ValidationResult {
        collect(&self.collection, entry, path)
    }

    pub fn validate_single(&self, entry: &Value, path: &str) -> ValidationResult {
        collect(&self.single, entry, path)
    }
}

fn compile(schema: &Value) -> ModelResult<JSONSchema> {
    JSONSchema::compile(schema).map_err(|e| ModelError::SchemaCompile(e.to_string()))
}

fn collect(schema: &JSONSchema, instance: &Value, path: &str) -> ValidationResult {
    let mut result = ValidationResult::new();
    if let Err(errors) = schema.validate(instance) {
        for error in errors {
            let pointer = error.instance_path.to_string();
            result.add(ValidationIssue::error(
                pointer_to_path(path, &pointer),
                error.to_string(),
            ));
        }
    }
    result
}

/// Appends a JSON pointer to a dotted issue path: `singles[0]` and
/// `/fields/1/title` give `singles[0].fields[1].title`.
fn pointer_to_path(prefix: &str, pointer: &str) -> String {
    let mut path = prefix.to_string();
    for token in pointer.split('/').skip(1) {
        let token = token.replace("~1", "/").replace("~0", "~");
        if token.parse::<usize>().is_ok() {
            path.push_str(&format!("[{}]", token));
        } else {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(&token);
        }
    }
    path
}

/// Wraps a schema with the shared `field` definition its `$ref`s point at.
fn with_definitions(mut schema: Value) -> Value {
    schema["definitions"] = json!({"field": field_schema()});
    schema
}

/// A form field. Group-like fields nest a list of fields of the same shape.
fn field_schema() -> Value {
    json!({
        "type": "object",
        "required": ["key"],
        "properties": {
            "key": {"type": "string", "minLength": 1},
            "title": {"type": "string"},
            "type": {"type": "string"},
            "fields": {"type": "array", "items": {"$ref": "#/definitions/field"}}
        }
    })
}

fn fields_schema() -> Value {
    json!({"type": "array", "items": {"$ref": "#/definitions/field"}})
}

fn profile_schema() -> Value {
    json!({
        "type": "object",
        "required": ["key", "config"],
        "properties": {
            "key": {"type": "string"},
            "config": {"type": "string"}
        }
    })
}

fn root_schema() -> Value {
    with_definitions(json!({
        "type": "object",
        "required": ["serve", "build"],
        "properties": {
            "ssgType": {"type": "string"},
            "ssgVersion": {"type": "string"},
            "hugover": {"type": "string"},
            "serve": {"type": "array", "items": profile_schema()},
            "build": {"type": "array", "items": profile_schema()},
            "menu": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["key"],
                    "properties": {
                        "key": {"type": "string"},
                        "title": {"type": "string"},
                        "menuItems": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["key"],
                                "properties": {"key": {"type": "string"}}
                            }
                        }
                    }
                }
            },
            "collections": {"type": "array", "items": {"type": "object"}},
            "singles": {"type": "array", "items": {"type": "object"}},
            "dynamics": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["key"],
                    "properties": {
                        "key": {"type": "string"},
                        "title": {"type": "string"},
                        "fields": fields_schema()
                    }
                }
            }
        }
    }))
}

fn collection_schema() -> Value {
    with_definitions(json!({
        "type": "object",
        "required": ["key", "folder", "extension"],
        "properties": {
            "key": {"type": "string", "minLength": 1},
            "title": {"type": "string"},
            "itemtitle": {"type": "string"},
            "folder": {"type": "string"},
            "extension": {"type": "string"},
            "dataformat": {"type": "string"},
            "sortkey": {"type": "string"},
            "hideIndex": {"type": "boolean"},
            "fields": fields_schema()
        }
    }))
}

fn single_schema() -> Value {
    with_definitions(json!({
        "type": "object",
        "required": ["key", "file"],
        "properties": {
            "key": {"type": "string", "minLength": 1},
            "title": {"type": "string"},
            "file": {"type": "string"},
            "dataformat": {"type": "string"},
            "previewUrl": {"type": "string"},
            "hidePreviewIcon": {"type": "boolean"},
            "pullOuterRootKey": {"type": "string"},
            "fields": fields_schema()
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_missing_required_properties() {
        let schemas = ModelSchemas::compile().unwrap();
        let result = schemas.validate_single(&json!({"key": "about"}), "singles[0]");
        let message = result.first_error().unwrap();
        assert!(message.starts_with("singles[0]"), "{}", message);
        assert!(message.contains("file"), "{}", message);
    }

    #[test]
    fn reports_wrong_types_with_a_pointer() {
        let schemas = ModelSchemas::compile().unwrap();
        let model = json!({
            "serve": [{"key": "default", "config": 3}],
            "build": []
        });
        let message = schemas.validate_root(&model).first_error().unwrap();
        assert!(message.starts_with("serve[0].config:"), "{}", message);
    }

    #[test]
    fn nested_field_errors_name_the_field_path() {
        let schemas = ModelSchemas::compile().unwrap();
        let entry = json!({
            "key": "about",
            "file": "content/about.md",
            "fields": [
                {"key": "title", "type": "string"},
                {"key": "seo", "type": "nest", "fields": [
                    {"key": "description", "title": 5}
                ]}
            ]
        });

        let result = schemas.validate_single(&entry, "singles[0]");
        assert_eq!(result.error_count(), 1);
        let message = result.first_error().unwrap();
        assert!(
            message.starts_with("singles[0].fields[1].fields[0].title:"),
            "{}",
            message
        );
    }

    #[test]
    fn fields_without_a_string_key_are_rejected() {
        let schemas = ModelSchemas::compile().unwrap();
        let model = json!({
            "serve": [],
            "build": [],
            "dynamics": [{"key": "blocks", "fields": [{"title": "Body"}, {"key": 7}]}]
        });

        let result = schemas.validate_root(&model);
        let paths: Vec<&str> = result.errors().map(|issue| issue.path.as_str()).collect();
        assert!(paths.contains(&"dynamics[0].fields[0]"), "{:?}", paths);
        assert!(paths.contains(&"dynamics[0].fields[1].key"), "{:?}", paths);
    }

    #[test]
    fn pointers_become_dotted_paths() {
        assert_eq!(pointer_to_path("", ""), "");
        assert_eq!(pointer_to_path("", "/serve/0/config"), "serve[0].config");
        assert_eq!(
            pointer_to_path("collections[2]", "/fields/0/options~1values"),
            "collections[2].fields[0].options/values"
        );
    }

    #[test]
    fn extra_attributes_are_allowed() {
        let schemas = ModelSchemas::compile().unwrap();
        let entry = json!({
            "key": "posts",
            "folder": "content/posts",
            "extension": "md",
            "previewUrl": "/posts/"
        });
        assert!(schemas.validate_collection(&entry, "collections[0]").is_valid());
    }
}
