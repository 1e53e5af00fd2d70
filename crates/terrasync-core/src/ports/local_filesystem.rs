//! Local filesystem port
//!
//! File I/O inside the working copy, kept behind a trait so the orchestrator
//! can be exercised against a virtual filesystem in tests. Writes are atomic
//! per file (temp file + rename) so a mid-write crash never leaves a
//! half-written file.

use std::path::Path;

use chrono::{DateTime, Utc};

/// Filesystem metadata snapshot for one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileState {
    pub exists: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Port trait for local file operations
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Read a whole file
    async fn read_file(&self, path: &Path) -> anyhow::Result<Vec<u8>>;

    /// Write a whole file atomically, creating parent directories
    async fn write_file_atomic(&self, path: &Path, data: &[u8]) -> anyhow::Result<()>;

    /// Remove a file; removing a missing file is not an error
    async fn remove_file(&self, path: &Path) -> anyhow::Result<()>;

    /// Rename within the same directory tree
    async fn rename(&self, from: &Path, to: &Path) -> anyhow::Result<()>;

    /// Stat a path
    async fn state(&self, path: &Path) -> anyhow::Result<FileState>;
}
