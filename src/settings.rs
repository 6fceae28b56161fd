//! Provider settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::format::ConfigFormat;

/// Settings controlling how workspace models are resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Re-copy or re-fetch `file://` and `http(s)://` partials on every
    /// resolution instead of reusing the copy in `partialsRemoteCache`.
    pub disable_partial_cache: bool,

    /// Application resource directory holding the bundled `includes/` and
    /// `partials/` fragments. House defaults are skipped when unset.
    pub bundled_model_dir: Option<PathBuf>,

    /// Format used when synthesizing a model for an empty workspace.
    pub default_model_format: ConfigFormat,
}

impl ProviderSettings {
    /// Loads settings from a YAML file.
    pub fn load_from_path(path: &Path) -> ModelResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::read(path, e))?;

        serde_yaml::from_str(&content).map_err(|e| ModelError::ParseFailed {
            path: path.to_path_buf(),
            format: ConfigFormat::Yaml.name(),
            message: e.to_string(),
        })
    }

    pub fn with_partial_cache_disabled(mut self, disabled: bool) -> Self {
        self.disable_partial_cache = disabled;
        self
    }

    pub fn with_bundled_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundled_model_dir = Some(dir.into());
        self
    }

    pub fn with_default_model_format(mut self, format: ConfigFormat) -> Self {
        self.default_model_format = format;
        self
    }
}
