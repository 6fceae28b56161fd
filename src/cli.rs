//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::format::ConfigFormat;

/// Resolves, validates and watches static-site workspace models.
#[derive(Parser, Debug)]
#[command(name = "site-model", version, about, long_about = None)]
pub struct Cli {
    /// Workspace root directory.
    #[arg(short, long, default_value = ".", env = "SITE_MODEL_WORKSPACE", global = true)]
    pub workspace: PathBuf,

    /// Key identifying the workspace in logs. Defaults to the directory name.
    #[arg(short, long, global = true)]
    pub key: Option<String>,

    /// Optional provider settings file (YAML).
    #[arg(short, long, env = "SITE_MODEL_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Re-fetch and re-copy partials on every resolution.
    #[arg(long, env = "SITE_MODEL_DISABLE_PARTIAL_CACHE", global = true)]
    pub disable_partial_cache: bool,

    /// Directory holding the bundled `includes/` and `partials/`.
    #[arg(long, env = "SITE_MODEL_BUNDLED_DIR", global = true)]
    pub bundled_dir: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the log level based on verbosity flags.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Returns the explicit workspace key or the workspace directory name.
    pub fn workspace_key(&self) -> String {
        self.key.clone().unwrap_or_else(|| {
            self.workspace
                .canonicalize()
                .ok()
                .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
                .unwrap_or_else(|| "workspace".to_string())
        })
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the merged model, creating a minimal one if none exists.
    Show {
        /// List the files that contributed to the model and those that did not.
        #[arg(long)]
        files: bool,
    },

    /// Merge the model and print a full validation report.
    Validate,

    /// Write a minimal model into the workspace.
    Init {
        /// Format of the generated base descriptor.
        #[arg(long, default_value = "yaml", value_parser = parse_format)]
        format: ConfigFormat,
    },

    /// Print the path of the base descriptor.
    #[command(name = "base-path")]
    BasePath,

    /// Watch the model directory and reload on every change.
    Watch,
}

fn parse_format(value: &str) -> Result<ConfigFormat, String> {
    ConfigFormat::from_extension(value)
        .ok_or_else(|| format!("unknown format '{}', expected yaml, toml or json", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "site-model",
            "show",
            "--workspace",
            "/tmp/site",
            "--disable-partial-cache",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.workspace, PathBuf::from("/tmp/site"));
        assert!(cli.disable_partial_cache);
        assert_eq!(cli.log_level(), "trace");
        assert!(matches!(cli.command, Commands::Show { files: false }));
    }

    #[test]
    fn init_accepts_known_formats_only() {
        let cli = Cli::try_parse_from(["site-model", "init", "--format", "toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Init {
                format: ConfigFormat::Toml
            }
        ));

        assert!(Cli::try_parse_from(["site-model", "init", "--format", "ini"]).is_err());
    }

    #[test]
    fn explicit_key_wins() {
        let cli = Cli::try_parse_from(["site-model", "--key", "blog", "base-path"]).unwrap();
        assert_eq!(cli.workspace_key(), "blog");
    }
}
