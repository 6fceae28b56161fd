//! Cached workspace model resolution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use futures::future::try_join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::bootstrap::build_initial_config;
use super::document::{BaseDocument, MergeDocument, MergedDocument, PARTIAL_SECTIONS};
use super::includes::{append_sub_includes, merge_includes};
use super::layout::WorkspaceLayout;
use super::model::WorkspaceConfig;
use super::parse_info::{ParseInfo, ParseInfoEntry};
use super::partials::{HttpFetcher, PartialFetcher, PartialResolver};
use super::token::CacheToken;
use crate::error::{ModelError, ModelResult};
use crate::format::read_fragment;
use crate::settings::ProviderSettings;
use crate::validation::{ConfigValidator, ValidationResult};

/// A cached model and the fingerprint of every file it was built from.
struct CacheEntry {
    token: CacheToken,
    config: Arc<WorkspaceConfig>,
}

/// Resolves, validates and caches workspace models.
///
/// Cache entries are keyed by the absolute path of the base descriptor. An
/// entry is reused while the modification times of the base file and every
/// fragment that contributed to it are unchanged; [`ConfigProvider::clear_cache`]
/// drops everything.
pub struct ConfigProvider {
    settings: ProviderSettings,
    validator: ConfigValidator,
    fetcher: Arc<dyn PartialFetcher>,
    cache: RwLock<HashMap<PathBuf, CacheEntry>>,
    parse_info: RwLock<ParseInfo>,
}

impl ConfigProvider {
    /// Creates a provider that fetches remote partials over HTTP.
    pub fn new(settings: ProviderSettings) -> ModelResult<Self> {
        Self::with_fetcher(settings, Arc::new(HttpFetcher::new()))
    }

    /// Creates a provider with a custom remote partial fetcher.
    pub fn with_fetcher(
        settings: ProviderSettings,
        fetcher: Arc<dyn PartialFetcher>,
    ) -> ModelResult<Self> {
        Ok(Self {
            settings,
            validator: ConfigValidator::new()?,
            fetcher,
            cache: RwLock::new(HashMap::new()),
            parse_info: RwLock::new(ParseInfo::new()),
        })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Returns the validated model of a workspace, synthesizing a minimal one
    /// first if the workspace has none.
    ///
    /// A freshly loaded model is only cached when none of its files changed
    /// while it was being loaded.
    pub async fn read_or_create_minimal_model_config(
        &self,
        workspace_path: &Path,
        workspace_key: &str,
    ) -> ModelResult<Arc<WorkspaceConfig>> {
        let layout = self.locate_or_create_model(workspace_path, workspace_key).await?;
        let base_path = self.base_path(&layout).await?;

        if let Some(config) = self.cached(&base_path).await {
            debug!(workspace = %workspace_key, base = %base_path.display(), "Model cache hit");
            return Ok(config);
        }

        let started = SystemTime::now();
        let (config, info) = self.load(&layout, &base_path, workspace_key).await?;
        let config = Arc::new(config);

        let token = CacheToken::new(info.files());
        let remote_cache = layout.remote_cache_dir();
        let changed: Vec<&Path> = token
            .modified_after(started)
            .await?
            .into_iter()
            .filter(|path| !path.starts_with(&remote_cache))
            .collect();

        info!(
            workspace = %workspace_key,
            base = %base_path.display(),
            files = info.entries.len(),
            "Model loaded"
        );

        if !changed.is_empty() {
            warn!(
                workspace = %workspace_key,
                files = ?changed,
                "Model files changed while loading, result not cached"
            );
            self.cache.write().await.remove(&base_path);
            *self.parse_info.write().await = info.stamp();
            return Ok(config);
        }

        *self.parse_info.write().await = info.stamp();
        self.cache.write().await.insert(
            base_path,
            CacheEntry {
                token,
                config: Arc::clone(&config),
            },
        );

        Ok(config)
    }

    /// Drops every cached model and the parse trace.
    pub async fn clear_cache(&self) {
        let dropped = {
            let mut cache = self.cache.write().await;
            let count = cache.len();
            cache.clear();
            count
        };
        *self.parse_info.write().await = ParseInfo::new();
        debug!(dropped, "Model cache cleared");
    }

    /// Files that contributed to the last successful load.
    pub async fn parse_info(&self) -> ParseInfo {
        self.parse_info.read().await.clone()
    }

    /// Number of cached models.
    pub async fn cached_models(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Path of a workspace's base descriptor, if it has one.
    pub fn model_base_path(&self, workspace_path: &Path) -> ModelResult<Option<PathBuf>> {
        WorkspaceLayout::new(workspace_path).find_base()
    }

    /// Bootstraps the workspace if it has no base descriptor and returns its
    /// layout rooted at the canonical workspace path.
    async fn locate_or_create_model(
        &self,
        workspace_path: &Path,
        workspace_key: &str,
    ) -> ModelResult<WorkspaceLayout> {
        let layout = WorkspaceLayout::new(workspace_path);
        if layout.find_base()?.is_none() {
            info!(
                workspace = %workspace_key,
                root = %layout.root().display(),
                "No model found, creating a minimal one"
            );
            build_initial_config(layout.root(), self.settings.default_model_format).await?;
        }
        canonical_layout(workspace_path).await
    }

    async fn base_path(&self, layout: &WorkspaceLayout) -> ModelResult<PathBuf> {
        layout.find_base()?.ok_or_else(|| ModelError::MissingBase {
            workspace: layout.root().to_path_buf(),
        })
    }

    /// Returns the cached model if its token still matches the files on disk.
    async fn cached(&self, base_path: &Path) -> Option<Arc<WorkspaceConfig>> {
        let cache = self.cache.read().await;
        let entry = cache.get(base_path)?;

        let fresh = CacheToken::new(entry.token.files().to_vec());
        match entry.token.matches(&fresh).await {
            Ok(true) => Some(Arc::clone(&entry.config)),
            Ok(false) => {
                debug!(base = %base_path.display(), "Model files changed");
                None
            }
            Err(e) => {
                debug!(base = %base_path.display(), error = %e, "Model files changed");
                None
            }
        }
    }

    /// Merges a workspace's model and returns every validation issue instead
    /// of stopping at the first one. Bypasses the cache.
    pub async fn validate_workspace(&self, workspace_path: &Path) -> ModelResult<ValidationResult> {
        let layout = canonical_layout(workspace_path).await?;
        let base_path = self.base_path(&layout).await?;

        let (merged, _) = self.merge(&layout, &base_path).await?;
        Ok(self.validator.validate(merged.as_value()))
    }

    /// Parses the base descriptor, folds in every fragment and validates the result.
    async fn load(
        &self,
        layout: &WorkspaceLayout,
        base_path: &Path,
        workspace_key: &str,
    ) -> ModelResult<(WorkspaceConfig, ParseInfo)> {
        let (merged, info) = self.merge(layout, base_path).await?;
        if let Some(message) = self.validator.first_error(merged.as_value()) {
            tracing::error!(workspace = %workspace_key, error = %message, "Model validation failed");
            return Err(ModelError::Validation(message));
        }

        let config = serde_json::from_value(merged.into_value())
            .map_err(|e| {
                ModelError::Validation(format!("model does not match its types: {}", e))
            })?;
        Ok((config, info))
    }

    /// Folds includes, sub-includes, bundled includes and partials into the base.
    async fn merge(
        &self,
        layout: &WorkspaceLayout,
        base_path: &Path,
    ) -> ModelResult<(MergedDocument, ParseInfo)> {
        let mut info = ParseInfo::new();

        let value = read_fragment(base_path).await?;
        info.push(ParseInfoEntry::new("base", base_path));
        let mut doc = BaseDocument::from_value(base_path, value)?.into_skeleton();

        let includes_dir = layout.includes_dir();
        merge_includes(&mut doc, &includes_dir, Some("include"), &mut info).await?;
        append_sub_includes(&mut doc, &includes_dir, &mut info).await?;

        if let Some(bundled) = &self.settings.bundled_model_dir {
            merge_includes(&mut doc, &bundled.join("includes"), None, &mut info).await?;
        }

        self.merge_partials(&mut doc, layout, &mut info).await?;
        Ok((doc.finish(), info))
    }

    /// Resolves `_mergePartial` references of every section concurrently.
    async fn merge_partials(
        &self,
        doc: &mut MergeDocument,
        layout: &WorkspaceLayout,
        info: &mut ParseInfo,
    ) -> ModelResult<()> {
        let resolver = PartialResolver {
            layout,
            bundled_dir: self.settings.bundled_model_dir.as_deref(),
            disable_cache: self.settings.disable_partial_cache,
            fetcher: self.fetcher.as_ref(),
        };

        for section in PARTIAL_SECTIONS {
            let entries = doc.take_section(section);
            let resolutions =
                try_join_all(entries.into_iter().map(|entry| resolver.resolve(entry))).await?;

            let mut resolved = Vec::with_capacity(resolutions.len());
            for resolution in resolutions {
                let (entry, contributed) = resolution.into_result()?;
                if let Some(contributed) = contributed {
                    info.push(contributed);
                }
                resolved.push(entry);
            }
            doc.put_section(section, resolved);
        }
        Ok(())
    }
}

/// Layout rooted at the canonical workspace path, so every traced file and
/// token entry is absolute.
async fn canonical_layout(workspace_path: &Path) -> ModelResult<WorkspaceLayout> {
    let root = tokio::fs::canonicalize(workspace_path)
        .await
        .map_err(|e| ModelError::read(workspace_path, e))?;
    Ok(WorkspaceLayout::new(root))
}
