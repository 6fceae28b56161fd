//! Trace of the files that contributed to a merge.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One contributing file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseInfoEntry {
    /// What the file contributed, e.g. `base`, `include:menu`, `partial:posts`.
    pub key: String,
    pub filename: PathBuf,
}

impl ParseInfoEntry {
    pub fn new(key: impl Into<String>, filename: &Path) -> Self {
        Self {
            key: key.into(),
            filename: filename.to_path_buf(),
        }
    }
}

/// Files that contributed to the last successful merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseInfo {
    pub entries: Vec<ParseInfoEntry>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl ParseInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ParseInfoEntry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Contributing files, in contribution order and without duplicates.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !files.contains(&entry.filename) {
                files.push(entry.filename.clone());
            }
        }
        files
    }

    /// Whether any entry was recorded under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub(crate) fn stamp(mut self) -> Self {
        self.loaded_at = Some(Utc::now());
        self
    }
}
