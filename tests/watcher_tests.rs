use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use site_model::config::ConfigProvider;
use site_model::settings::ProviderSettings;
use site_model::watcher::{ModelChange, ModelWatcher};
use tokio::sync::mpsc;

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

const BASE: &str = "\
serve:
  - key: default
    config: config.toml
build:
  - key: default
    config: config.toml
";

#[tokio::test]
async fn adding_an_include_clears_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("model/base.yaml"), BASE);

    let provider = Arc::new(ConfigProvider::new(ProviderSettings::default()).unwrap());
    let first = provider
        .read_or_create_minimal_model_config(dir.path(), "site")
        .await
        .unwrap();
    assert!(first.menu.is_none());
    assert_eq!(provider.cached_models().await, 1);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = ModelWatcher::new(Arc::clone(&provider), dir.path()).with_observer(
        Arc::new(move |change: &ModelChange| {
            let _ = tx.send(change.clone());
        }),
    );
    watcher.start().unwrap();

    // A new file is not part of the cache token; only the watcher notices it.
    write(
        &dir.path().join("model/includes/menu.yaml"),
        "- key: main\n  menuItems: []\n",
    );

    let change = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("no change observed")
        .unwrap();
    assert!(change
        .paths
        .iter()
        .any(|path| path.ends_with("menu.yaml") || path.ends_with("includes")));
    assert_eq!(provider.cached_models().await, 0);

    let second = provider
        .read_or_create_minimal_model_config(dir.path(), "site")
        .await
        .unwrap();
    assert_eq!(second.menu.as_ref().unwrap()[0].key, "main");

    watcher.stop();
    assert!(!watcher.is_watching());
}

#[tokio::test]
async fn stopped_watcher_leaves_the_cache_alone() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("model/base.yaml"), BASE);

    let provider = Arc::new(ConfigProvider::new(ProviderSettings::default()).unwrap());
    let mut watcher = ModelWatcher::new(Arc::clone(&provider), dir.path());
    watcher.start().unwrap();
    watcher.stop();

    provider
        .read_or_create_minimal_model_config(dir.path(), "site")
        .await
        .unwrap();
    write(&dir.path().join("model/includes/extra.yaml"), "note: hi\n");
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(provider.cached_models().await, 1);
}
