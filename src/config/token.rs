//! Modification-time fingerprints for cached models.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use futures::future::try_join_all;
use tokio::sync::OnceCell;

use crate::error::{ModelError, ModelResult};

/// Fingerprint of a file set built from modification times.
///
/// Files are only stat-ed, never read, so a rewrite with identical content
/// still produces a new token.
#[derive(Debug)]
pub struct CacheToken {
    files: Vec<PathBuf>,
    snapshot: OnceCell<Snapshot>,
}

/// Modification times captured by [`CacheToken::build`].
#[derive(Debug)]
struct Snapshot {
    stamps: Vec<(PathBuf, SystemTime)>,
    fingerprint: String,
}

impl CacheToken {
    /// Creates an unbuilt token. Paths are not checked until [`CacheToken::build`].
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            snapshot: OnceCell::new(),
        }
    }

    /// Files covered by this token.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Stats every file and freezes the fingerprint. Later calls return the
    /// stored value without touching the filesystem.
    pub async fn build(&self) -> ModelResult<&str> {
        Ok(self.snapshot().await?.fingerprint.as_str())
    }

    /// Returns the fingerprint if the token has been built.
    pub fn fingerprint(&self) -> Option<&str> {
        self.snapshot.get().map(|s| s.fingerprint.as_str())
    }

    /// Builds both tokens if needed and compares their fingerprints.
    pub async fn matches(&self, other: &CacheToken) -> ModelResult<bool> {
        let (ours, theirs) = tokio::try_join!(self.build(), other.build())?;
        Ok(ours == theirs)
    }

    /// Files whose modification time is later than `at`, in token order.
    pub async fn modified_after(&self, at: SystemTime) -> ModelResult<Vec<&Path>> {
        Ok(self
            .snapshot()
            .await?
            .stamps
            .iter()
            .filter(|(_, modified)| *modified > at)
            .map(|(path, _)| path.as_path())
            .collect())
    }

    async fn snapshot(&self) -> ModelResult<&Snapshot> {
        self.snapshot
            .get_or_try_init(|| take_snapshot(&self.files))
            .await
    }
}

async fn take_snapshot(files: &[PathBuf]) -> ModelResult<Snapshot> {
    let stamps = try_join_all(files.iter().map(|path| stamp(path))).await?;

    let mut parts: Vec<String> = stamps
        .iter()
        .map(|(path, modified)| {
            let millis = modified
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0);
            format!("{}>{}", path.display(), millis)
        })
        .collect();
    parts.sort();

    Ok(Snapshot {
        stamps,
        fingerprint: parts.join("|"),
    })
}

async fn stamp(path: &Path) -> ModelResult<(PathBuf, SystemTime)> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ModelError::read(path, e))?;
    let modified = metadata.modified().map_err(|e| ModelError::read(path, e))?;
    Ok((path.to_path_buf(), modified))
}
