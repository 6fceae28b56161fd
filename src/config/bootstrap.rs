//! Minimal model synthesis for workspaces that have none yet.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::info;

use super::layout::WorkspaceLayout;
use crate::error::{ModelError, ModelResult};
use crate::format::ConfigFormat;

/// Generator config files probed at the workspace root, in order.
const GENERATOR_CONFIG_CANDIDATES: &[&str] = &[
    "hugo.toml",
    "hugo.yaml",
    "hugo.yml",
    "hugo.json",
    "config.toml",
    "config.yaml",
    "config.yml",
    "config.json",
];

const PLACEHOLDER_GENERATOR_CONFIG: &str = r#"baseURL = "http://example.org/"
languageCode = "en-us"
title = "My New Site"
"#;

const LANDING_PAGE: &str = r#"# Welcome

This workspace was set up with a minimal model.

- `model/base.*` describes the site settings form (`mainConfig`).
- `model/includes/collections.*` adds a generic **Pages** collection.
- `model/partials/page.*` holds the fields shared by page-like content.

Edit these files to shape the forms. Changes are picked up automatically.
"#;

/// Writes a minimal model into `workspace`, never overwriting existing files,
/// and returns the path of the base descriptor.
pub async fn build_initial_config(
    workspace: &Path,
    format: ConfigFormat,
) -> ModelResult<PathBuf> {
    let layout = WorkspaceLayout::new(workspace);
    let generator_config = ensure_generator_config(workspace).await?;

    // TOML documents cannot hold a top-level list.
    let include_format = match format {
        ConfigFormat::Toml => ConfigFormat::Yaml,
        other => other,
    };

    let base_path = layout.base_path_for(format);
    let fragments = [
        (base_path.clone(), format, base_fragment(&generator_config)),
        (
            layout.partials_dir().join(format!("page.{}", format.extension())),
            format,
            page_partial(),
        ),
        (
            layout
                .includes_dir()
                .join(format!("collections.{}", include_format.extension())),
            include_format,
            pages_include(),
        ),
    ];

    for (path, fragment_format, value) in &fragments {
        write_if_missing(path, &fragment_format.serialize(value)?).await?;
    }
    write_if_missing(&layout.model_dir().join("home").join("index.md"), LANDING_PAGE).await?;

    Ok(base_path)
}

/// Returns the generator config file name, creating a placeholder if none exists.
async fn ensure_generator_config(workspace: &Path) -> ModelResult<String> {
    for candidate in GENERATOR_CONFIG_CANDIDATES {
        if tokio::fs::try_exists(workspace.join(candidate))
            .await
            .unwrap_or(false)
        {
            return Ok(candidate.to_string());
        }
    }

    let name = "config.toml";
    write_if_missing(&workspace.join(name), PLACEHOLDER_GENERATOR_CONFIG).await?;
    Ok(name.to_string())
}

async fn write_if_missing(path: &Path, content: &str) -> ModelResult<bool> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ModelError::write(parent, e))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| ModelError::write(path, e))?;

    info!(path = %path.display(), "Created model file");
    Ok(true)
}

fn base_fragment(generator_config: &str) -> Value {
    json!({
        "ssgType": "hugo",
        "serve": [{"key": "default", "config": generator_config}],
        "build": [{"key": "default", "config": generator_config}],
        "menu": [{
            "key": "content",
            "title": "Content",
            "menuItems": [{"key": "mainConfig"}, {"key": "pages"}]
        }],
        "singles": [{
            "key": "mainConfig",
            "title": "Site Configuration",
            "file": generator_config,
            "fields": [
                {"key": "title", "title": "Site Title", "type": "string"},
                {"key": "baseURL", "title": "Base URL", "type": "string"}
            ]
        }]
    })
}

fn page_partial() -> Value {
    json!({
        "fields": [
            {"key": "title", "title": "Title", "type": "string"},
            {"key": "date", "title": "Date", "type": "date"},
            {"key": "draft", "title": "Draft", "type": "boolean", "default": false},
            {
                "key": "seo",
                "title": "SEO",
                "type": "nest",
                "fields": [
                    {"key": "description", "title": "Description", "type": "string", "multiLine": true}
                ]
            },
            {"key": "mainContent", "title": "Content", "type": "markdown"}
        ]
    })
}

fn pages_include() -> Value {
    json!([{
        "key": "pages",
        "title": "Pages",
        "itemtitle": "Page",
        "folder": "content/page/",
        "extension": "md",
        "dataformat": "yaml",
        "_mergePartial": "page"
    }])
}
