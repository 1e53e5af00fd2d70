//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] with `tokio::fs`. Writes go to a
//! temporary file in the same directory followed by a rename, so a crash
//! mid-write never leaves a half-written project file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use tracing::{debug, instrument};

use terrasync_core::ports::local_filesystem::{FileState, ILocalFileSystem};

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem
///
/// Zero-sized; every operation derives its context from the path arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystem {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn read_file(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        let data = tokio::fs::read(path).await?;
        debug!(bytes = data.len(), "file read");
        Ok(data)
    }

    #[instrument(skip(self, data), fields(path = %path.display(), bytes = data.len()))]
    async fn write_file_atomic(&self, path: &Path, data: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Temp file in the same directory so the rename stays on one
        // filesystem and is atomic
        let tmp_path = {
            let mut p = path.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove_file(&self, path: &Path) -> anyhow::Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(from = %from.display(), to = %to.display()))]
    async fn rename(&self, from: &Path, to: &Path) -> anyhow::Result<()> {
        tokio::fs::rename(from, to).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn state(&self, path: &Path) -> anyhow::Result<FileState> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(FileState {
                    exists: false,
                    size: 0,
                    modified: None,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let modified = metadata.modified().ok().and_then(|st| {
            st.duration_since(std::time::UNIX_EPOCH)
                .ok()
                .and_then(|dur| DateTime::from_timestamp(dur.as_secs() as i64, dur.subsec_nanos()))
        });

        Ok(FileState {
            exists: true,
            size: metadata.len(),
            modified,
        })
    }
}
