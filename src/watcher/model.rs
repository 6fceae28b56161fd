//! Model directory watching.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ConfigProvider, WorkspaceLayout};
use crate::error::{ModelError, ModelResult};

/// Kind of change seen in the model directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

/// A change that invalidated the model cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChange {
    pub kind: ChangeKind,
    pub paths: Vec<PathBuf>,
}

/// Callback invoked after the cache has been cleared.
pub type ChangeObserver = Arc<dyn Fn(&ModelChange) + Send + Sync>;

/// Clears a provider's cache whenever anything under a workspace's model
/// directory is added, changed or removed.
pub struct ModelWatcher {
    /// Provider whose cache is invalidated.
    provider: Arc<ConfigProvider>,
    /// Directory being watched.
    watch_path: PathBuf,
    /// Writes here come from the provider itself and are ignored.
    remote_cache_dir: PathBuf,
    /// Optional diagnostic hook.
    observer: Option<ChangeObserver>,
    /// OS watch handle while watching.
    watcher: Option<RecommendedWatcher>,
    /// Task draining watch events.
    task: Option<JoinHandle<()>>,
}

impl ModelWatcher {
    /// Creates a stopped watcher for `workspace_path`'s model directory.
    pub fn new(provider: Arc<ConfigProvider>, workspace_path: &Path) -> Self {
        let layout = WorkspaceLayout::new(workspace_path);
        Self {
            provider,
            watch_path: layout.model_dir(),
            remote_cache_dir: layout.remote_cache_dir(),
            observer: None,
            watcher: None,
            task: None,
        }
    }

    /// Sets the callback run after each invalidation.
    pub fn with_observer(mut self, observer: ChangeObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Starts watching, replacing any previous watch. Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self) -> ModelResult<()> {
        self.stop();

        if !self.watch_path.is_dir() {
            return Err(ModelError::WatchFailed {
                path: self.watch_path.clone(),
                message: "not a directory".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => warn!(error = %e, "Model watch error"),
            },
            Config::default(),
        )?;

        watcher.watch(&self.watch_path, RecursiveMode::Recursive)?;

        let handler = ChangeHandler {
            provider: Arc::clone(&self.provider),
            remote_cache_dir: self.remote_cache_dir.clone(),
            observer: self.observer.clone(),
        };
        self.task = Some(tokio::spawn(handler.run(rx)));
        self.watcher = Some(watcher);

        info!(path = %self.watch_path.display(), "Started watching model directory");
        Ok(())
    }

    /// Stops watching and releases the OS watch handle.
    pub fn stop(&mut self) {
        let was_watching = self.watcher.take().is_some();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if was_watching {
            info!(path = %self.watch_path.display(), "Stopped watching model directory");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn watch_path(&self) -> &Path {
        &self.watch_path
    }
}

impl Drop for ModelWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved into the event task.
struct ChangeHandler {
    provider: Arc<ConfigProvider>,
    remote_cache_dir: PathBuf,
    observer: Option<ChangeObserver>,
}

impl ChangeHandler {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = rx.recv().await {
            let Some(change) = self.classify(event) else {
                continue;
            };

            self.provider.clear_cache().await;
            debug!(kind = ?change.kind, paths = ?change.paths, "Model changed, cache cleared");

            if let Some(observer) = &self.observer {
                observer(&change);
            }
        }
        debug!("Model watch channel closed");
    }

    /// Maps a raw event to a model change, dropping access events and writes
    /// to the remote partial cache.
    fn classify(&self, event: Event) -> Option<ModelChange> {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Added,
            EventKind::Modify(_) => ChangeKind::Changed,
            EventKind::Remove(_) => ChangeKind::Removed,
            _ => return None,
        };

        let paths: Vec<PathBuf> = event
            .paths
            .into_iter()
            .filter(|path| !path.starts_with(&self.remote_cache_dir))
            .collect();

        if paths.is_empty() {
            return None;
        }
        Some(ModelChange { kind, paths })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ProviderSettings;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    fn handler(root: &Path) -> ChangeHandler {
        ChangeHandler {
            provider: Arc::new(ConfigProvider::new(ProviderSettings::default()).unwrap()),
            remote_cache_dir: WorkspaceLayout::new(root).remote_cache_dir(),
            observer: None,
        }
    }

    #[test]
    fn classifies_relevant_events() {
        let root = Path::new("/work/site");
        let handler = handler(root);

        let created = Event::new(EventKind::Create(CreateKind::File))
            .add_path(root.join("model/includes/menu.yaml"));
        assert_eq!(handler.classify(created).unwrap().kind, ChangeKind::Added);

        let modified = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(root.join("model/base.yaml"));
        assert_eq!(handler.classify(modified).unwrap().kind, ChangeKind::Changed);

        let accessed = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(root.join("model/base.yaml"));
        assert!(handler.classify(accessed).is_none());
    }

    #[test]
    fn ignores_remote_cache_writes() {
        let root = Path::new("/work/site");
        let handler = handler(root);

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(root.join("model/partialsRemoteCache/https%3A%2F%2Fexample.com%2Fp.yaml"));
        assert!(handler.classify(event).is_none());
    }

    #[tokio::test]
    async fn start_requires_a_model_directory() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ConfigProvider::new(ProviderSettings::default()).unwrap());
        let mut watcher = ModelWatcher::new(provider, dir.path());

        assert!(matches!(
            watcher.start(),
            Err(ModelError::WatchFailed { .. })
        ));
        assert!(!watcher.is_watching());
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_releases() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("model")).unwrap();
        let provider = Arc::new(ConfigProvider::new(ProviderSettings::default()).unwrap());
        let mut watcher = ModelWatcher::new(provider, dir.path());

        watcher.start().unwrap();
        watcher.start().unwrap();
        assert!(watcher.is_watching());
        assert_eq!(watcher.watch_path(), dir.path().join("model"));

        watcher.stop();
        assert!(!watcher.is_watching());
    }
}
