//! Data format resolution for model fragments.
//!
//! Every fragment on disk is parsed into a dynamic [`serde_json::Value`] tree,
//! whatever its syntax, so the merge pipeline only ever sees one shape.

use std::path::Path;

use serde_json::Value;

use crate::error::{ModelError, ModelResult};

/// Serialization formats a model fragment can be written in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Toml,
    Json,
}

/// Extensions probed when locating a fragment, in priority order.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["yaml", "yml", "toml", "json"];

impl ConfigFormat {
    /// Resolves a format from a bare extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "toml" => Some(ConfigFormat::Toml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Resolves a format from a file path's extension.
    pub fn from_path(path: &Path) -> ModelResult<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| ModelError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
    }

    /// The canonical extension written for new files.
    pub fn extension(self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }

    /// Parses `content` into a dynamic value. `path` is only used for error reporting.
    pub fn parse(self, content: &str, path: &Path) -> ModelResult<Value> {
        let parse_failed = |message: String| ModelError::ParseFailed {
            path: path.to_path_buf(),
            format: self.name(),
            message,
        };

        match self {
            ConfigFormat::Yaml => {
                // An empty YAML document is a valid, empty fragment.
                if content.trim().is_empty() {
                    return Ok(Value::Null);
                }
                serde_yaml::from_str(content).map_err(|e| parse_failed(e.to_string()))
            }
            ConfigFormat::Toml => {
                let table: toml::Value =
                    toml::from_str(content).map_err(|e| parse_failed(e.to_string()))?;
                serde_json::to_value(table).map_err(|e| parse_failed(e.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| parse_failed(e.to_string()))
            }
        }
    }

    /// Serializes a dynamic value back into this format.
    pub fn serialize(self, value: &Value) -> ModelResult<String> {
        let serialize_failed = |message: String| ModelError::SerializeFailed {
            format: self.name(),
            message,
        };

        match self {
            ConfigFormat::Yaml => {
                serde_yaml::to_string(value).map_err(|e| serialize_failed(e.to_string()))
            }
            ConfigFormat::Toml => {
                toml::to_string_pretty(value).map_err(|e| serialize_failed(e.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::to_string_pretty(value).map_err(|e| serialize_failed(e.to_string()))
            }
        }
    }
}

/// Reads and parses a fragment, picking the format from its extension.
pub async fn read_fragment(path: &Path) -> ModelResult<Value> {
    let format = ConfigFormat::from_path(path)?;
    read_fragment_as(path, format).await
}

/// Reads and parses a fragment with an explicit format.
pub async fn read_fragment_as(path: &Path, format: ConfigFormat) -> ModelResult<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ModelError::read(path, e))?;
    format.parse(&content, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn resolves_extensions() {
        assert_eq!(ConfigFormat::from_extension("yml"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("md"), None);
        assert!(ConfigFormat::from_path(&PathBuf::from("model/base")).is_err());
    }

    #[test]
    fn parses_each_format_into_the_same_tree() {
        let path = PathBuf::from("fragment");
        let expected = json!({"key": "pages", "fields": [{"key": "title", "type": "string"}]});

        let yaml = "key: pages\nfields:\n  - key: title\n    type: string\n";
        let toml = "key = \"pages\"\n[[fields]]\nkey = \"title\"\ntype = \"string\"\n";
        let json = r#"{"key": "pages", "fields": [{"key": "title", "type": "string"}]}"#;

        assert_eq!(ConfigFormat::Yaml.parse(yaml, &path).unwrap(), expected);
        assert_eq!(ConfigFormat::Toml.parse(toml, &path).unwrap(), expected);
        assert_eq!(ConfigFormat::Json.parse(json, &path).unwrap(), expected);
    }

    #[test]
    fn empty_yaml_is_null() {
        let path = PathBuf::from("empty.yaml");
        assert_eq!(ConfigFormat::Yaml.parse("  \n", &path).unwrap(), Value::Null);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let path = PathBuf::from("model/base.json");
        let err = ConfigFormat::Json.parse("{ nope", &path).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("JSON"));
        assert!(message.contains("model/base.json"));
    }
}
