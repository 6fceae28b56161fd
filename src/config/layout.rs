//! On-disk layout of a workspace model.

use std::path::{Path, PathBuf};

use crate::error::{ModelError, ModelResult};
use crate::format::{ConfigFormat, SUPPORTED_EXTENSIONS};

const MODEL_DIR: &str = "model";
const BASE_STEM: &str = "base";
const LEGACY_BASE_STEM: &str = "sukoh";

/// Sub-include directories and the section their fragments are appended to.
pub const SUB_INCLUDE_DIRS: [(&str, &str); 3] = [
    ("singles", "singles"),
    ("collections", "collections"),
    ("menus", "menu"),
];

/// Paths of a workspace's model tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_dir(&self) -> PathBuf {
        self.root.join(MODEL_DIR)
    }

    pub fn includes_dir(&self) -> PathBuf {
        self.model_dir().join("includes")
    }

    pub fn partials_dir(&self) -> PathBuf {
        self.model_dir().join("partials")
    }

    pub fn remote_cache_dir(&self) -> PathBuf {
        self.model_dir().join("partialsRemoteCache")
    }

    /// Path a new base descriptor is written to.
    pub fn base_path_for(&self, format: ConfigFormat) -> PathBuf {
        self.model_dir()
            .join(format!("{}.{}", BASE_STEM, format.extension()))
    }

    /// Locates the base descriptor: `model/base.<ext>` first, then the legacy
    /// `sukoh.<ext>` at the workspace root.
    pub fn find_base(&self) -> ModelResult<Option<PathBuf>> {
        if let Some((path, _)) = find_fragment(&self.model_dir(), BASE_STEM)? {
            return Ok(Some(path));
        }
        Ok(find_fragment(&self.root, LEGACY_BASE_STEM)?.map(|(path, _)| path))
    }
}

/// Finds `<dir>/<name>.<ext>` for the first supported extension that exists.
pub fn find_fragment(dir: &Path, name: &str) -> ModelResult<Option<(PathBuf, ConfigFormat)>> {
    for ext in SUPPORTED_EXTENSIONS {
        let pattern = format!(
            "{}/{}.{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            glob::Pattern::escape(name),
            ext
        );
        if let Some(path) = glob_files(&pattern)?.into_iter().next() {
            if let Some(format) = ConfigFormat::from_extension(ext) {
                return Ok(Some((path, format)));
            }
        }
    }
    Ok(None)
}

/// Lists every fragment directly inside `dir`, sorted by path.
pub fn list_fragments(dir: &Path) -> ModelResult<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let mut files = Vec::new();
    for ext in SUPPORTED_EXTENSIONS {
        files.extend(glob_files(&format!("{}/*.{}", escaped, ext))?);
    }
    files.sort();
    Ok(files)
}

fn glob_files(pattern: &str) -> ModelResult<Vec<PathBuf>> {
    let paths = glob::glob(pattern).map_err(|e| ModelError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable path while globbing");
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_model_base_over_legacy_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path());
        std::fs::write(dir.path().join("sukoh.toml"), "").unwrap();

        assert_eq!(
            layout.find_base().unwrap(),
            Some(dir.path().join("sukoh.toml"))
        );

        std::fs::create_dir_all(layout.model_dir()).unwrap();
        std::fs::write(layout.model_dir().join("base.json"), "{}").unwrap();
        assert_eq!(
            layout.find_base().unwrap(),
            Some(layout.model_dir().join("base.json"))
        );
    }

    #[test]
    fn extension_order_breaks_ties() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.json"), "{}").unwrap();
        std::fs::write(dir.path().join("page.yml"), "").unwrap();

        let (path, format) = find_fragment(dir.path(), "page").unwrap().unwrap();
        assert_eq!(path, dir.path().join("page.yml"));
        assert_eq!(format, ConfigFormat::Yaml);
    }

    #[test]
    fn lists_only_supported_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("menu.yaml"), "").unwrap();
        std::fs::write(dir.path().join("build.toml"), "").unwrap();
        std::fs::write(dir.path().join("notes.md"), "").unwrap();
        std::fs::create_dir(dir.path().join("singles.yaml")).unwrap();

        let files = list_fragments(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("build.toml"), dir.path().join("menu.yaml")]
        );
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_fragments(&dir.path().join("nope")).unwrap().is_empty());
        assert!(WorkspaceLayout::new(dir.path()).find_base().unwrap().is_none());
    }
}
