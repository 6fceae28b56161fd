//! Resolved workspace model data structures.
//!
//! These types describe the configuration after every fragment has been folded
//! in and validated. Attributes the engine does not interpret (widget options,
//! preview settings and so on) are kept in the `extra` maps so the form
//! renderer still receives them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root of a resolved workspace model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Static-site generator type (e.g. "hugo").
    #[serde(rename = "ssgType", default, skip_serializing_if = "Option::is_none")]
    pub ssg_type: Option<String>,

    /// Generator version.
    #[serde(rename = "ssgVersion", default, skip_serializing_if = "Option::is_none")]
    pub ssg_version: Option<String>,

    /// Legacy generator version key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hugover: Option<String>,

    /// Profiles used when serving the site locally.
    pub serve: Vec<GeneratorProfile>,

    /// Profiles used when building the site.
    pub build: Vec<GeneratorProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<Vec<MenuSection>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<ContentDescriptor>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singles: Option<Vec<ContentDescriptor>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamics: Option<Vec<ContentDescriptor>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A serve or build profile pointing at a generator configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorProfile {
    pub key: String,

    /// Generator config file, relative to the workspace root.
    pub config: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A navigation section grouping singles and collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuSection {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "menuItems", default)]
    pub menu_items: Vec<MenuItem>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A menu entry referencing a single or collection by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub key: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A content schema descriptor: a collection, single or dynamic entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Content folder (collections).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,

    /// Item file extension (collections).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,

    /// Backing file (singles).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Data or front matter format of the backing file(s).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataformat: Option<String>,

    #[serde(default)]
    pub fields: Vec<Field>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single form field. Group-like fields nest their own field list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkspaceConfig {
    /// Looks up a single by key.
    pub fn single(&self, key: &str) -> Option<&ContentDescriptor> {
        self.singles.as_deref()?.iter().find(|s| s.key == key)
    }

    /// Looks up a collection by key.
    pub fn collection(&self, key: &str) -> Option<&ContentDescriptor> {
        self.collections.as_deref()?.iter().find(|c| c.key == key)
    }
}

impl ContentDescriptor {
    /// Finds a top-level field by key.
    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Field keys in declaration order.
    pub fn field_keys(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.key.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_unknown_attributes() {
        let value = json!({
            "serve": [{"key": "default", "config": "config.toml"}],
            "build": [{"key": "default", "config": "config.toml"}],
            "singles": [{
                "key": "mainConfig",
                "file": "config.toml",
                "previewUrl": "/",
                "fields": [{"key": "title", "type": "string", "tip": "Site title"}]
            }]
        });

        let config: WorkspaceConfig = serde_json::from_value(value).unwrap();
        let single = config.single("mainConfig").unwrap();
        assert_eq!(single.extra.get("previewUrl"), Some(&json!("/")));
        assert_eq!(
            single.field("title").unwrap().extra.get("tip"),
            Some(&json!("Site title"))
        );
        assert!(config.menu.is_none());
    }

    #[test]
    fn empty_sections_are_not_serialized() {
        let config: WorkspaceConfig = serde_json::from_value(json!({
            "serve": [],
            "build": []
        }))
        .unwrap();

        let out = serde_json::to_value(&config).unwrap();
        assert!(out.get("menu").is_none());
        assert!(out.get("collections").is_none());
    }
}
