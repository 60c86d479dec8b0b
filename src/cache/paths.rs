// Cache path utilities.
// Lays out cached responses on disk, keyed by a hash of the URL.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use sha2::{Digest, Sha256};
use url::Url;

/// Longest file extension carried over from a URL.
const MAX_EXTENSION_LEN: usize = 8;

/// Get the base cache directory (~/.cache/mangofetch on Linux).
pub fn default_cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "mangofetch").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Stable key for a URL: hex SHA-256 of the full URL string.
pub fn url_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extension of the last path segment, if it looks like one.
fn url_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Directory layout of a response cache.
///
/// ```text
/// {root}/permanent/{hash}.{ext}        body
/// {root}/permanent/{hash}.meta.json    entry metadata
/// {root}/transient/...                 same, for transient entries
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn permanent_dir(&self) -> PathBuf {
        self.root.join("permanent")
    }

    pub fn transient_dir(&self) -> PathBuf {
        self.root.join("transient")
    }

    /// Directory holding entries of the given permanence.
    pub fn entry_dir(&self, permanent: bool) -> PathBuf {
        if permanent {
            self.permanent_dir()
        } else {
            self.transient_dir()
        }
    }

    /// Path of the cached body for `url`.
    pub fn body_path(&self, url: &str, permanent: bool) -> PathBuf {
        let ext = url_extension(url).unwrap_or_else(|| "bin".to_string());
        self.entry_dir(permanent)
            .join(format!("{}.{}", url_key(url), ext))
    }

    /// Path of the metadata record for `url`.
    pub fn meta_path(&self, url: &str, permanent: bool) -> PathBuf {
        self.entry_dir(permanent)
            .join(format!("{}.meta.json", url_key(url)))
    }
}
