//! Content store port
//!
//! Deterministic content fingerprints over file bytes, with an
//! implementation-side metadata cache (path + mtime + size) so unchanged
//! files are not re-hashed. Pure with respect to file content: the same
//! bytes always produce the same fingerprint.

use std::path::Path;

use crate::domain::newtypes::Fingerprint;

/// Port trait for content fingerprinting
#[async_trait::async_trait]
pub trait IContentStore: Send + Sync {
    /// Compute (or look up) the content fingerprint of a file
    ///
    /// Fails if the file is unreadable; the caller decides whether that
    /// aborts the whole operation.
    async fn fingerprint(&self, path: &Path) -> anyhow::Result<Fingerprint>;

    /// Whether the file's content differs from a previously recorded digest
    async fn changed(&self, path: &Path, previous: &Fingerprint) -> anyhow::Result<bool> {
        Ok(self.fingerprint(path).await? != *previous)
    }
}
