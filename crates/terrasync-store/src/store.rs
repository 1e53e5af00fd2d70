//! Content store adapter
//!
//! Fingerprints are pure over file bytes. The memo cache is keyed by
//! absolute path and invalidated whenever mtime or size differ, so a cache
//! hit never masks a content change that touched either. Hashing runs on
//! the blocking pool.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::trace;

use terrasync_core::domain::newtypes::Fingerprint;
use terrasync_core::ports::content_store::IContentStore;

/// Cache key metadata: a fingerprint is reused only while both match
#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheStamp {
    modified: SystemTime,
    size: u64,
}

/// Fingerprint store with a (mtime, size)-keyed memo cache
#[derive(Debug, Default)]
pub struct ContentStore {
    cache: DashMap<PathBuf, (CacheStamp, Fingerprint)>,
}

impl ContentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries (test/diagnostic aid)
    #[must_use]
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    fn stamp(path: &Path) -> anyhow::Result<CacheStamp> {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("failed to stat '{}'", path.display()))?;
        Ok(CacheStamp {
            modified: meta.modified()?,
            size: meta.len(),
        })
    }

    fn hash_file(path: &Path) -> anyhow::Result<Fingerprint> {
        let mut file = File::open(path)
            .with_context(|| format!("failed to open '{}' for hashing", path.display()))?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file
                .read(&mut buf)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Fingerprint::from_digest(&hasher.finalize().into()))
    }

    /// Fingerprint raw bytes already in memory
    #[must_use]
    pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Fingerprint::from_digest(&hasher.finalize().into())
    }
}

#[async_trait::async_trait]
impl IContentStore for ContentStore {
    async fn fingerprint(&self, path: &Path) -> anyhow::Result<Fingerprint> {
        let stamp = Self::stamp(path)?;
        if let Some(entry) = self.cache.get(path) {
            let (cached_stamp, fingerprint) = entry.value();
            if *cached_stamp == stamp {
                trace!(path = %path.display(), "fingerprint cache hit");
                return Ok(fingerprint.clone());
            }
        }

        let owned = path.to_path_buf();
        let fingerprint =
            tokio::task::spawn_blocking(move || Self::hash_file(&owned)).await??;
        self.cache
            .insert(path.to_path_buf(), (stamp, fingerprint.clone()));
        Ok(fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fingerprint_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"hello").unwrap();

        let store = ContentStore::new();
        let first = store.fingerprint(&path).await.unwrap();
        let second = store.fingerprint(&path).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, ContentStore::fingerprint_bytes(b"hello"));
    }

    #[tokio::test]
    async fn test_changed_detects_content_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"one").unwrap();

        let store = ContentStore::new();
        let before = store.fingerprint(&path).await.unwrap();
        assert!(!store.changed(&path, &before).await.unwrap());

        fs::write(&path, b"two longer content").unwrap();
        assert!(store.changed(&path, &before).await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_populated_and_reused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"cached").unwrap();

        let store = ContentStore::new();
        assert_eq!(store.cached_entries(), 0);
        store.fingerprint(&path).await.unwrap();
        assert_eq!(store.cached_entries(), 1);
        store.fingerprint(&path).await.unwrap();
        assert_eq!(store.cached_entries(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_file_errors() {
        let store = ContentStore::new();
        let missing = Path::new("/nonexistent/terrasync/file");
        assert!(store.fingerprint(missing).await.is_err());
    }

    #[test]
    fn test_known_sha256() {
        // sha256 of the empty input
        assert_eq!(
            ContentStore::fingerprint_bytes(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
