// Cache store for reading and writing cached responses.
// Stores raw bodies with a metadata record; serves them in any representation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{FetchError, Result};
use crate::http::{Payload, Representation};

use super::paths::CacheLayout;

/// Metadata stored next to each cached body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry {
    /// URL the body was fetched from.
    pub url: String,
    /// Representation requested when the body was captured.
    pub representation: Representation,
    /// Whether this entry survives transient cleanup.
    pub permanent: bool,
    /// When the body was cached.
    pub cached_at: DateTime<Utc>,
}

impl CachedEntry {
    pub fn new(url: &str, representation: Representation, permanent: bool) -> Self {
        Self {
            url: url.to_string(),
            representation,
            permanent,
            cached_at: Utc::now(),
        }
    }
}

/// URL-keyed store of successful GET responses.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Whether an entry exists for `url`, in any representation.
    async fn exists(&self, url: &str) -> bool;

    /// Persist `body` under `url`, replacing any previous entry.
    async fn store(
        &self,
        url: &str,
        representation: Representation,
        body: &[u8],
        permanent: bool,
    ) -> Result<()>;

    /// Materialize the stored body for `url` as `representation`.
    async fn load(&self, url: &str, representation: Representation) -> Result<Payload>;
}

/// Response cache on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileCache {
    layout: CacheLayout,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: CacheLayout::new(root),
        }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Read the metadata for `url`, preferring the permanent entry.
    pub async fn entry(&self, url: &str) -> Result<Option<CachedEntry>> {
        for permanent in [true, false] {
            let path = self.layout.meta_path(url, permanent);
            match fs::read(&path).await {
                Ok(contents) => return Ok(Some(serde_json::from_slice(&contents)?)),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// When the entry for `url` was captured.
    pub async fn cached_at(&self, url: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.entry(url).await?.map(|entry| entry.cached_at))
    }

    /// Delete every transient entry. Returns how many were removed.
    pub async fn clear_transient(&self) -> Result<usize> {
        let dir = self.layout.transient_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(".meta.json") {
                removed += 1;
            }
            fs::remove_file(entry.path()).await?;
        }

        debug!(removed, dir = %dir.display(), "cleared transient cache");
        Ok(removed)
    }

    async fn remove_entry(&self, url: &str, permanent: bool) -> Result<()> {
        for path in [
            self.layout.meta_path(url, permanent),
            self.layout.body_path(url, permanent),
        ] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResponseCache for FileCache {
    async fn exists(&self, url: &str) -> bool {
        for permanent in [true, false] {
            match fs::try_exists(self.layout.meta_path(url, permanent)).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    warn!(%url, error = %e, "cache lookup failed, treating as miss");
                    return false;
                }
            }
        }
        false
    }

    async fn store(
        &self,
        url: &str,
        representation: Representation,
        body: &[u8],
        permanent: bool,
    ) -> Result<()> {
        let entry = CachedEntry::new(url, representation, permanent);
        write_atomic(&self.layout.body_path(url, permanent), body).await?;
        let meta = serde_json::to_vec_pretty(&entry)?;
        write_atomic(&self.layout.meta_path(url, permanent), &meta).await?;

        // One entry per URL: drop the copy with the other permanence once
        // the new one is fully written.
        self.remove_entry(url, !permanent).await?;

        debug!(%url, permanent, bytes = body.len(), "cached response");
        Ok(())
    }

    async fn load(&self, url: &str, representation: Representation) -> Result<Payload> {
        let entry = self
            .entry(url)
            .await?
            .ok_or_else(|| FetchError::Other(format!("no cache entry for {}", url)))?;
        let path = self.layout.body_path(url, entry.permanent);

        if representation == Representation::Filename {
            if !fs::try_exists(&path).await? {
                return Err(FetchError::Other(format!(
                    "cached body for {} is missing: {}",
                    url,
                    path.display()
                )));
            }
            return Ok(Payload::Filename(path));
        }

        let body = fs::read(&path).await?;
        Payload::decode(&body, representation)
    }
}

/// Write a file atomically via a temp file and rename.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    fs::rename(&temp_path, path).await?;

    Ok(())
}
