//! Bringing plugin bundles in from outside the managed tree.
//!
//! Local paths are validated in place; remote zips are downloaded and
//! extracted into a staging directory under the OS temp dir. Staging never
//! outlives a failed import, and `cleanup` is safe to call in every state.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use url::Url;
use uuid::Uuid;
use zip::ZipArchive;

use crate::error::PluginError;
use crate::manifest::PluginManifest;
use crate::paths::manifest_path_in;

/// Capability to fetch raw bytes from a URL; injected so tests can serve
/// archives from a local server.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, PluginError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("claude-plugins/0.1 (+https://github.com/junyeong-ai)"),
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, PluginError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PluginError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(PluginError::Download {
                url: url.to_string(),
                reason: format!("status {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| PluginError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

pub struct PluginImporter {
    fetcher: Arc<dyn Fetcher>,
    staging: Option<PathBuf>,
}

impl PluginImporter {
    pub fn new() -> Self {
        Self::with_fetcher(Arc::new(HttpFetcher::new()))
    }

    pub fn with_fetcher(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            staging: None,
        }
    }

    pub fn staging_path(&self) -> Option<&Path> {
        self.staging.as_deref()
    }

    /// Validate a local plugin directory and hand the path back unchanged;
    /// copying into the managed tree is the orchestrator's job.
    pub async fn import_from_path(&self, path: &Path) -> Result<PathBuf, PluginError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| PluginError::SourceNotFound {
                path: path.to_path_buf(),
            })?;
        if !metadata.is_dir() {
            return Err(PluginError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        if !PluginManifest::exists_in(path) {
            return Err(PluginError::ManifestNotFound {
                path: manifest_path_in(path),
            });
        }
        Ok(path.to_path_buf())
    }

    /// Download a zip archive and extract it into a fresh staging directory,
    /// returning the staging path with the manifest at its root.
    ///
    /// Any failure removes the staging directory before the error propagates.
    pub async fn import_from_url(&mut self, url: &str) -> Result<PathBuf, PluginError> {
        let parsed = Url::parse(url).map_err(|e| PluginError::Download {
            url: url.to_string(),
            reason: format!("invalid URL: {e}"),
        })?;

        let bytes = self.fetcher.fetch(&parsed).await?;

        let staging =
            std::env::temp_dir().join(format!("claude-plugins-import-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&staging).await?;
        self.staging = Some(staging.clone());

        match Self::stage_archive(&bytes, &staging).await {
            Ok(()) => Ok(staging),
            Err(e) => {
                self.cleanup().await;
                Err(e)
            }
        }
    }

    /// Best-effort removal of the staging directory; never masks an error.
    pub async fn cleanup(&mut self) {
        if let Some(staging) = self.staging.take()
            && let Err(e) = tokio::fs::remove_dir_all(&staging).await
        {
            tracing::debug!(staging = %staging.display(), error = %e, "Failed to remove staging dir");
        }
    }

    async fn stage_archive(bytes: &[u8], staging: &Path) -> Result<(), PluginError> {
        extract_zip(bytes, staging)?;
        strip_single_root(staging).await?;
        if !PluginManifest::exists_in(staging) {
            return Err(PluginError::ManifestNotFound {
                path: manifest_path_in(staging),
            });
        }
        Ok(())
    }
}

impl Default for PluginImporter {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_zip(bytes: &[u8], dest: &Path) -> Result<(), PluginError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| PluginError::Archive {
        reason: format!("not a readable zip archive: {e}"),
    })?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| PluginError::Archive {
            reason: format!("unreadable zip entry: {e}"),
        })?;
        let raw = entry.name().replace('\\', "/");
        let rel = sanitize_entry_path(Path::new(&raw))?;
        let out = dest.join(&rel);

        if entry.is_dir() {
            std::fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(&out)?;
        std::io::copy(&mut entry, &mut file)?;
    }
    Ok(())
}

/// Reject entry paths that would land outside the extraction root.
fn sanitize_entry_path(path: &Path) -> Result<PathBuf, PluginError> {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                return Err(PluginError::Archive {
                    reason: format!("entry escapes extraction root: {}", path.display()),
                });
            }
            Component::CurDir => {}
            Component::Normal(part) => cleaned.push(part),
        }
    }
    if cleaned.as_os_str().is_empty() {
        return Err(PluginError::Archive {
            reason: "entry has an empty path".into(),
        });
    }
    Ok(cleaned)
}

/// Zips of a repository usually nest everything under one top-level folder;
/// hoist its contents so the manifest lands at the staging root.
async fn strip_single_root(staging: &Path) -> Result<(), PluginError> {
    if PluginManifest::exists_in(staging) {
        return Ok(());
    }

    let mut entries = tokio::fs::read_dir(staging).await?;
    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        children.push(entry);
    }
    let [only] = children.as_slice() else {
        return Ok(());
    };
    if !only.file_type().await?.is_dir() {
        return Ok(());
    }

    let top = only.path();
    let mut nested = tokio::fs::read_dir(&top).await?;
    while let Some(entry) = nested.next_entry().await? {
        tokio::fs::rename(entry.path(), staging.join(entry.file_name())).await?;
    }
    tokio::fs::remove_dir(&top).await?;
    Ok(())
}
