//! `_mergePartial` reference parsing and resolution.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::document::{PartialFragment, MERGE_PARTIAL_KEY};
use super::layout::{find_fragment, WorkspaceLayout};
use super::parse_info::ParseInfoEntry;
use crate::error::{ModelError, ModelResult};
use crate::format::{read_fragment_as, ConfigFormat};

const FILE_SCHEME: &str = "file://";
const HTTP_SCHEME: &str = "http://";
const HTTPS_SCHEME: &str = "https://";
const BUNDLED_SCHEME: &str = "dogfood_site://";

static TEMP_SEQUENCE: AtomicUsize = AtomicUsize::new(0);

/// Where a partial lives, parsed once from the `_mergePartial` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartialSource {
    /// `file://<path>`: copied into the remote cache before reading.
    LocalFile(PathBuf),
    /// `http://` or `https://`: fetched into the remote cache before reading.
    RemoteHttp(String),
    /// `dogfood_site://<name>`: shipped with the application.
    BundledDefault(String),
    /// Anything else: a name under the workspace's `model/partials`.
    NamedLocalPartial(String),
}

impl PartialSource {
    pub fn parse(reference: &str) -> Self {
        if let Some(path) = reference.strip_prefix(FILE_SCHEME) {
            PartialSource::LocalFile(PathBuf::from(path))
        } else if reference.starts_with(HTTP_SCHEME) || reference.starts_with(HTTPS_SCHEME) {
            PartialSource::RemoteHttp(reference.to_string())
        } else if let Some(name) = reference.strip_prefix(BUNDLED_SCHEME) {
            PartialSource::BundledDefault(name.to_string())
        } else {
            PartialSource::NamedLocalPartial(reference.to_string())
        }
    }

    /// Whether resolution goes through `partialsRemoteCache`.
    pub fn is_cached(&self) -> bool {
        matches!(self, PartialSource::LocalFile(_) | PartialSource::RemoteHttp(_))
    }
}

/// Outcome of resolving a single entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PartialResolution {
    /// The entry, merged with its partial if it referenced one.
    Resolved {
        entry: Value,
        contributed: Option<ParseInfoEntry>,
    },
    /// The entry referenced a partial that could not be located.
    Unresolved {
        entry_key: String,
        reference: String,
        reason: String,
    },
}

impl PartialResolution {
    /// Turns an unresolved reference into a hard error.
    pub fn into_result(self) -> ModelResult<(Value, Option<ParseInfoEntry>)> {
        match self {
            PartialResolution::Resolved { entry, contributed } => Ok((entry, contributed)),
            PartialResolution::Unresolved {
                entry_key,
                reference,
                reason,
            } => Err(ModelError::UnresolvedPartial {
                entry_key,
                reference,
                reason,
            }),
        }
    }
}

/// Fetches remote partial content.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PartialFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> ModelResult<Vec<u8>>;
}

/// [`PartialFetcher`] backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PartialFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> ModelResult<Vec<u8>> {
        let fetch_failed = |message: String| ModelError::FetchFailed {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Resolves `_mergePartial` references for one workspace.
pub struct PartialResolver<'a> {
    pub layout: &'a WorkspaceLayout,
    pub bundled_dir: Option<&'a Path>,
    pub disable_cache: bool,
    pub fetcher: &'a dyn PartialFetcher,
}

impl PartialResolver<'_> {
    /// Resolves one section entry. Entries without a reference pass through.
    pub async fn resolve(&self, entry: Value) -> ModelResult<PartialResolution> {
        // Non-mapping entries are left for the validator to report.
        let reference = match entry.get(MERGE_PARTIAL_KEY).and_then(Value::as_str) {
            Some(reference) => reference.to_string(),
            None => {
                return Ok(PartialResolution::Resolved {
                    entry,
                    contributed: None,
                })
            }
        };

        let entry_key = entry
            .get("key")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();
        let source = PartialSource::parse(&reference);

        let located = match self.locate(&source, &reference).await? {
            Some(located) => located,
            None => {
                return Ok(PartialResolution::Unresolved {
                    entry_key,
                    reason: self.describe_missing(&source),
                    reference,
                })
            }
        };

        let (path, format) = located;
        let value = read_fragment_as(&path, format).await?;
        let partial = PartialFragment::from_value(&path, value)?;

        debug!(entry = %entry_key, partial = %path.display(), "Merging partial");

        // Bundled partials ship with the application and are not traced.
        let contributed = match source {
            PartialSource::BundledDefault(_) => None,
            _ => Some(ParseInfoEntry::new(format!("partial:{}", entry_key), &path)),
        };

        let merged = match entry {
            Value::Object(map) => Value::Object(partial.apply_to(&map)),
            other => other,
        };

        Ok(PartialResolution::Resolved {
            entry: merged,
            contributed,
        })
    }

    /// Finds the file to parse for a source, populating the remote cache when needed.
    async fn locate(
        &self,
        source: &PartialSource,
        reference: &str,
    ) -> ModelResult<Option<(PathBuf, ConfigFormat)>> {
        match source {
            PartialSource::LocalFile(origin) => {
                let format = ConfigFormat::from_path(origin)?;
                let cached = self.cache_path(reference);
                if self.needs_refresh(&cached).await {
                    if !tokio::fs::try_exists(origin).await.unwrap_or(false) {
                        return Ok(None);
                    }
                    let body = tokio::fs::read(origin)
                        .await
                        .map_err(|e| ModelError::read(origin, e))?;
                    self.ensure_cache_dir().await?;
                    write_atomically(&cached, &body).await?;
                    info!(from = %origin.display(), to = %cached.display(), "Cached file partial");
                }
                Ok(Some((cached, format)))
            }
            PartialSource::RemoteHttp(url) => {
                let format = ConfigFormat::from_path(Path::new(url_path(url)))?;
                let cached = self.cache_path(reference);
                if self.needs_refresh(&cached).await {
                    let body = self.fetcher.fetch(url).await?;
                    self.ensure_cache_dir().await?;
                    write_atomically(&cached, &body).await?;
                    info!(url = %url, to = %cached.display(), "Cached remote partial");
                }
                Ok(Some((cached, format)))
            }
            PartialSource::BundledDefault(name) => match self.bundled_dir {
                Some(dir) => find_fragment(&dir.join("partials"), name),
                None => Ok(None),
            },
            PartialSource::NamedLocalPartial(name) => {
                find_fragment(&self.layout.partials_dir(), name)
            }
        }
    }

    fn cache_path(&self, reference: &str) -> PathBuf {
        self.layout
            .remote_cache_dir()
            .join(urlencoding::encode(reference).as_ref())
    }

    async fn needs_refresh(&self, cached: &Path) -> bool {
        self.disable_cache || !tokio::fs::try_exists(cached).await.unwrap_or(false)
    }

    async fn ensure_cache_dir(&self) -> ModelResult<()> {
        let dir = self.layout.remote_cache_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ModelError::write(dir, e))
    }

    fn describe_missing(&self, source: &PartialSource) -> String {
        match source {
            PartialSource::LocalFile(path) => format!("file '{}' does not exist", path.display()),
            PartialSource::RemoteHttp(url) => format!("'{}' could not be located", url),
            PartialSource::BundledDefault(name) => match self.bundled_dir {
                Some(dir) => format!(
                    "no bundled partial named '{}' in '{}'",
                    name,
                    dir.join("partials").display()
                ),
                None => "no bundled model directory is configured".to_string(),
            },
            PartialSource::NamedLocalPartial(name) => format!(
                "no partial named '{}' in '{}'",
                name,
                self.layout.partials_dir().display()
            ),
        }
    }
}

/// Writes `contents` to a uniquely named sibling of `target`, then renames it
/// into place so readers never observe a partial write.
async fn write_atomically(target: &Path, contents: &[u8]) -> ModelResult<()> {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = target.with_file_name(format!(
        ".{}.{}.{}.tmp",
        name,
        std::process::id(),
        TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    ));

    tokio::fs::write(&temp, contents)
        .await
        .map_err(|e| ModelError::write(&temp, e))?;
    if let Err(e) = tokio::fs::rename(&temp, target).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(ModelError::write(target, e));
    }
    Ok(())
}

/// Strips the query string and fragment so the extension can be read.
fn url_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_every_scheme() {
        assert_eq!(
            PartialSource::parse("file:///tmp/p.yaml"),
            PartialSource::LocalFile(PathBuf::from("/tmp/p.yaml"))
        );
        assert_eq!(
            PartialSource::parse("https://example.com/p.yaml"),
            PartialSource::RemoteHttp("https://example.com/p.yaml".to_string())
        );
        assert_eq!(
            PartialSource::parse("dogfood_site://page"),
            PartialSource::BundledDefault("page".to_string())
        );
        assert_eq!(
            PartialSource::parse("page"),
            PartialSource::NamedLocalPartial("page".to_string())
        );
        assert!(PartialSource::parse("http://x/p.json").is_cached());
        assert!(!PartialSource::parse("page").is_cached());
    }

    #[test]
    fn url_path_drops_query() {
        assert_eq!(
            url_path("https://example.com/p.yaml?ref=main#top"),
            "https://example.com/p.yaml"
        );
    }

    #[tokio::test]
    async fn remote_partials_are_fetched_once_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path());

        let mut fetcher = MockPartialFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url| url.ends_with("/partials/post.yaml"))
            .times(1)
            .returning(|_| Ok(b"fields:\n  - key: title\n    type: string\n".to_vec()));

        let resolver = PartialResolver {
            layout: &layout,
            bundled_dir: None,
            disable_cache: false,
            fetcher: &fetcher,
        };

        let entry = json!({
            "key": "posts",
            "_mergePartial": "https://example.com/partials/post.yaml",
            "fields": []
        });

        for _ in 0..2 {
            let (merged, contributed) = resolver
                .resolve(entry.clone())
                .await
                .unwrap()
                .into_result()
                .unwrap();
            assert_eq!(merged["fields"][0]["key"], json!("title"));
            assert!(contributed.is_some());
        }

        let cached = layout
            .remote_cache_dir()
            .join(urlencoding::encode("https://example.com/partials/post.yaml").as_ref());
        assert!(cached.exists());
    }

    #[tokio::test]
    async fn disabled_cache_refetches() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path());

        let mut fetcher = MockPartialFetcher::new();
        fetcher
            .expect_fetch()
            .times(2)
            .returning(|_| Ok(b"{\"title\": \"Remote\"}".to_vec()));

        let resolver = PartialResolver {
            layout: &layout,
            bundled_dir: None,
            disable_cache: true,
            fetcher: &fetcher,
        };

        let entry = json!({"key": "posts", "_mergePartial": "http://example.com/p.json"});
        for _ in 0..2 {
            let resolution = resolver.resolve(entry.clone()).await.unwrap();
            assert!(matches!(resolution, PartialResolution::Resolved { .. }));
        }
    }

    #[tokio::test]
    async fn fetch_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path());

        let mut fetcher = MockPartialFetcher::new();
        fetcher.expect_fetch().returning(|url| {
            Err(ModelError::FetchFailed {
                url: url.to_string(),
                message: "HTTP 404 Not Found".to_string(),
            })
        });

        let resolver = PartialResolver {
            layout: &layout,
            bundled_dir: None,
            disable_cache: false,
            fetcher: &fetcher,
        };

        let entry = json!({"key": "posts", "_mergePartial": "https://example.com/missing.yaml"});
        let err = resolver.resolve(entry).await.unwrap_err();
        assert!(matches!(err, ModelError::FetchFailed { .. }));
        assert!(!layout.remote_cache_dir().exists());
    }

    #[tokio::test]
    async fn missing_named_partial_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path());
        let fetcher = MockPartialFetcher::new();

        let resolver = PartialResolver {
            layout: &layout,
            bundled_dir: None,
            disable_cache: false,
            fetcher: &fetcher,
        };

        let entry = json!({"key": "posts", "_mergePartial": "nope"});
        match resolver.resolve(entry).await.unwrap() {
            PartialResolution::Unresolved {
                entry_key,
                reference,
                ..
            } => {
                assert_eq!(entry_key, "posts");
                assert_eq!(reference, "nope");
            }
            other => panic!("expected unresolved, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn concurrent_resolutions_of_one_url_leave_one_complete_copy() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path());
        let body = "fields:\n  - key: image\n    type: image\n  - key: caption\n";

        let mut fetcher = MockPartialFetcher::new();
        fetcher
            .expect_fetch()
            .times(2)
            .returning(move |_| Ok(body.as_bytes().to_vec()));

        let resolver = PartialResolver {
            layout: &layout,
            bundled_dir: None,
            disable_cache: true,
            fetcher: &fetcher,
        };

        let reference = "https://example.com/gallery.yaml";
        let entries = ["hero", "gallery"]
            .map(|key| json!({"key": key, "_mergePartial": reference}));
        let resolutions =
            futures::future::try_join_all(entries.into_iter().map(|entry| resolver.resolve(entry)))
                .await
                .unwrap();

        for resolution in resolutions {
            let (merged, _) = resolution.into_result().unwrap();
            assert_eq!(merged["fields"][1]["key"], json!("caption"));
        }

        let names: Vec<String> = std::fs::read_dir(layout.remote_cache_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![urlencoding::encode(reference).into_owned()]);
        let cached = layout.remote_cache_dir().join(&names[0]);
        assert_eq!(std::fs::read_to_string(cached).unwrap(), body);
    }
}
