//! Site Model - workspace model resolution for a static-site CMS.
//!
//! A workspace describes its editing forms in a `model/` directory: a base
//! descriptor, include fragments and reusable partials. This library merges
//! those fragments into one validated [`config::WorkspaceConfig`], caches it
//! per workspace, and watches the model directory for changes.

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod settings;
pub mod validation;
pub mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info};
use walkdir::WalkDir;

use crate::cli::{Cli, Commands};
use crate::config::{build_initial_config, ConfigProvider, ParseInfo, WorkspaceLayout};
use crate::format::ConfigFormat;
use crate::settings::ProviderSettings;
use crate::validation::report::{format_brief_summary, format_report};
use crate::watcher::{ModelChange, ModelWatcher};

/// Runs the command selected on the command line.
pub async fn run(cli: Cli) -> Result<()> {
    setup_logging(cli.log_level(), cli.log_json)?;

    let settings = load_settings(&cli)?;
    let workspace = resolve_workspace(&cli.workspace);
    let key = cli.workspace_key();

    match cli.command {
        Commands::Show { files } => show_model(settings, &workspace, &key, files).await,
        Commands::Validate => validate_model(settings, &workspace).await,
        Commands::Init { format } => init_model(&workspace, format).await,
        Commands::BasePath => print_base_path(settings, &workspace),
        Commands::Watch => watch_model(settings, &workspace, &key).await,
    }
}

/// Initializes the tracing subscriber for structured logging.
fn setup_logging(level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder
            .json()
            .with_file(true)
            .with_line_number(true)
            .try_init()
    } else {
        builder.compact().try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}

/// Reads the optional settings file and applies command-line overrides.
fn load_settings(cli: &Cli) -> Result<ProviderSettings> {
    let mut settings = match &cli.settings {
        Some(path) => ProviderSettings::load_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => ProviderSettings::default(),
    };

    if cli.disable_partial_cache {
        settings = settings.with_partial_cache_disabled(true);
    }
    if let Some(dir) = &cli.bundled_dir {
        settings = settings.with_bundled_model_dir(dir);
    }
    Ok(settings)
}

fn resolve_workspace(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Prints the merged model as YAML.
async fn show_model(
    settings: ProviderSettings,
    workspace: &Path,
    key: &str,
    files: bool,
) -> Result<()> {
    let provider = ConfigProvider::new(settings)?;
    let config = provider
        .read_or_create_minimal_model_config(workspace, key)
        .await
        .with_context(|| format!("Failed to load model of {}", workspace.display()))?;

    print!("{}", serde_yaml::to_string(&*config)?);

    if files {
        let info = provider.parse_info().await;
        println!("\nContributing files:");
        for entry in &info.entries {
            println!("  {:<28} {}", entry.key, entry.filename.display());
        }

        let unused = unused_model_files(&WorkspaceLayout::new(workspace), &info);
        if !unused.is_empty() {
            println!("\nNot part of the model:");
            for path in unused {
                println!("  {}", path.display());
            }
        }
    }
    Ok(())
}

/// Prints a full validation report and fails when the model has errors.
async fn validate_model(settings: ProviderSettings, workspace: &Path) -> Result<()> {
    let provider = ConfigProvider::new(settings)?;
    let result = provider
        .validate_workspace(workspace)
        .await
        .with_context(|| format!("Failed to merge model of {}", workspace.display()))?;

    println!("{}", format_report(&result));
    if !result.is_valid() {
        bail!(format_brief_summary(&result));
    }
    info!(summary = %format_brief_summary(&result), "Validation finished");
    Ok(())
}

async fn init_model(workspace: &Path, format: ConfigFormat) -> Result<()> {
    let base = build_initial_config(workspace, format)
        .await
        .with_context(|| format!("Failed to initialize model in {}", workspace.display()))?;
    println!("{}", base.display());
    Ok(())
}

fn print_base_path(settings: ProviderSettings, workspace: &Path) -> Result<()> {
    let provider = ConfigProvider::new(settings)?;
    match provider.model_base_path(workspace)? {
        Some(path) => println!("{}", path.display()),
        None => bail!("No model base file in {}", workspace.display()),
    }
    Ok(())
}

/// Keeps the model loaded, reloading it after every change until Ctrl+C.
async fn watch_model(settings: ProviderSettings, workspace: &Path, key: &str) -> Result<()> {
    let provider = Arc::new(ConfigProvider::new(settings)?);
    provider
        .read_or_create_minimal_model_config(workspace, key)
        .await
        .with_context(|| format!("Failed to load model of {}", workspace.display()))?;

    let (change_tx, mut change_rx) = mpsc::unbounded_channel::<ModelChange>();
    let mut watcher = ModelWatcher::new(Arc::clone(&provider), workspace).with_observer(Arc::new(
        move |change: &ModelChange| {
            let _ = change_tx.send(change.clone());
        },
    ));
    watcher.start()?;

    info!(workspace = %key, path = %watcher.watch_path().display(), "Watching model. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }

            Some(change) = change_rx.recv() => {
                info!(kind = ?change.kind, paths = ?change.paths, "Model changed");
                match provider.read_or_create_minimal_model_config(workspace, key).await {
                    Ok(config) => info!(
                        workspace = %key,
                        collections = config.collections.as_ref().map_or(0, Vec::len),
                        singles = config.singles.as_ref().map_or(0, Vec::len),
                        "Model reloaded"
                    ),
                    Err(e) => error!(workspace = %key, error = %e, "Model reload failed"),
                }
            }
        }
    }

    watcher.stop();
    Ok(())
}

/// Files under the model directory that did not contribute to the last merge.
fn unused_model_files(layout: &WorkspaceLayout, info: &ParseInfo) -> Vec<PathBuf> {
    let used: Vec<PathBuf> = info.files().iter().map(|path| resolve_workspace(path)).collect();
    let remote_cache = layout.remote_cache_dir();

    WalkDir::new(layout.model_dir())
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| !path.starts_with(&remote_cache))
        .filter(|path| !used.contains(&resolve_workspace(path)))
        .collect()
}
