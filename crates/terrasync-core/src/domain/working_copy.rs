//! The local working copy
//!
//! A working copy is a directory holding a checkout of a project at some base
//! version, plus a `.terrasync/` metadata directory the core owns:
//!
//! - `metadata.json` - project reference, base version, and the
//!   file-to-fingerprint ledger recorded at checkout/last-sync time
//! - `base/` - verbatim copies of structured files at the base version,
//!   the "old values" source for record-level diffing
//! - `conflicts.json` - the conflict log
//!
//! The ledger is rewritten only at orchestrator checkpoints (after a
//! successful apply/commit), never mid-transfer, so a crash leaves it
//! consistent with what is actually on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conflict::{Conflict, ConflictLog};
use super::errors::{DomainError, SyncError};
use super::newtypes::{Fingerprint, ProjectRef, RelPath, VersionNumber};

/// Name of the metadata directory inside a working copy
pub const METADATA_DIR: &str = ".terrasync";

const METADATA_FILE: &str = "metadata.json";
const BASE_DIR: &str = "base";
const CONFLICTS_FILE: &str = "conflicts.json";

/// One ledger entry: what we knew about a file at the last checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub fingerprint: Fingerprint,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Persistent working-copy state (`metadata.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingCopyMeta {
    pub project: ProjectRef,
    pub base_version: VersionNumber,
    /// Per-file content fingerprints recorded at checkout/last-sync time
    pub ledger: BTreeMap<RelPath, FileRecord>,
}

/// A local checkout of a project at a known base version
#[derive(Debug)]
pub struct WorkingCopy {
    root: PathBuf,
    meta: WorkingCopyMeta,
}

impl WorkingCopy {
    /// Initialize a fresh working copy in `root`, creating the metadata dir
    ///
    /// Fails if the directory is already a working copy.
    pub fn init(
        root: impl Into<PathBuf>,
        project: ProjectRef,
        base_version: VersionNumber,
    ) -> Result<Self, SyncError> {
        let root = root.into();
        let meta_dir = root.join(METADATA_DIR);
        if meta_dir.join(METADATA_FILE).exists() {
            return Err(SyncError::Io {
                path: root.display().to_string(),
                message: "directory is already a terrasync working copy".to_string(),
            });
        }
        fs::create_dir_all(meta_dir.join(BASE_DIR))
            .map_err(|e| SyncError::io(meta_dir.display(), &e))?;
        let copy = Self {
            root,
            meta: WorkingCopyMeta {
                project,
                base_version,
                ledger: BTreeMap::new(),
            },
        };
        copy.save()?;
        Ok(copy)
    }

    /// Open an existing working copy
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let root = root.into();
        let meta_path = root.join(METADATA_DIR).join(METADATA_FILE);
        let bytes = fs::read(&meta_path).map_err(|e| SyncError::io(meta_path.display(), &e))?;
        let meta: WorkingCopyMeta =
            serde_json::from_slice(&bytes).map_err(|e| SyncError::Io {
                path: meta_path.display().to_string(),
                message: format!("corrupt working-copy metadata: {e}"),
            })?;
        Ok(Self { root, meta })
    }

    /// Whether `root` looks like a working copy
    pub fn exists(root: &Path) -> bool {
        root.join(METADATA_DIR).join(METADATA_FILE).exists()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project(&self) -> &ProjectRef {
        &self.meta.project
    }

    pub fn base_version(&self) -> VersionNumber {
        self.meta.base_version
    }

    pub fn ledger(&self) -> &BTreeMap<RelPath, FileRecord> {
        &self.meta.ledger
    }

    /// Absolute path of a project file inside the working copy
    pub fn file_path(&self, path: &RelPath) -> PathBuf {
        path.to_fs_path(&self.root)
    }

    /// Absolute path of a file's base-version snapshot
    pub fn base_path(&self, path: &RelPath) -> PathBuf {
        path.to_fs_path(&self.root.join(METADATA_DIR).join(BASE_DIR))
    }

    // ------------------------------------------------------------------
    // Checkpoint mutation
    // ------------------------------------------------------------------

    /// Advance the base version and replace the ledger, then persist
    ///
    /// This is the single checkpoint through which sync commits its result
    /// to the working copy's metadata.
    pub fn checkpoint(
        &mut self,
        base_version: VersionNumber,
        ledger: BTreeMap<RelPath, FileRecord>,
    ) -> Result<(), SyncError> {
        self.meta.base_version = base_version;
        self.meta.ledger = ledger;
        self.save()
    }

    /// Persist `metadata.json` atomically (temp file + rename)
    pub fn save(&self) -> Result<(), SyncError> {
        let meta_dir = self.root.join(METADATA_DIR);
        let target = meta_dir.join(METADATA_FILE);
        let bytes = serde_json::to_vec_pretty(&self.meta).map_err(|e| SyncError::Io {
            path: target.display().to_string(),
            message: e.to_string(),
        })?;
        write_atomic(&target, &bytes).map_err(|e| SyncError::io(target.display(), &e))
    }

    // ------------------------------------------------------------------
    // Base snapshots
    // ------------------------------------------------------------------

    /// Read a base-version snapshot, `None` if the file did not exist at base
    pub fn read_base(&self, path: &RelPath) -> Result<Option<Vec<u8>>, SyncError> {
        let base = self.base_path(path);
        match fs::read(&base) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::io(base.display(), &e)),
        }
    }

    /// Write (or replace) a base-version snapshot
    pub fn write_base(&self, path: &RelPath, bytes: &[u8]) -> Result<(), SyncError> {
        let base = self.base_path(path);
        if let Some(parent) = base.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::io(parent.display(), &e))?;
        }
        write_atomic(&base, bytes).map_err(|e| SyncError::io(base.display(), &e))
    }

    /// Remove a base-version snapshot; missing files are fine
    pub fn remove_base(&self, path: &RelPath) -> Result<(), SyncError> {
        let base = self.base_path(path);
        match fs::remove_file(&base) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::io(base.display(), &e)),
        }
    }

    // ------------------------------------------------------------------
    // Conflict log
    // ------------------------------------------------------------------

    pub fn load_conflict_log(&self) -> Result<ConflictLog, SyncError> {
        let path = self.root.join(METADATA_DIR).join(CONFLICTS_FILE);
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| SyncError::Io {
                path: path.display().to_string(),
                message: format!("corrupt conflict log: {e}"),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ConflictLog::default()),
            Err(e) => Err(SyncError::io(path.display(), &e)),
        }
    }

    /// Append conflicts under the given version and persist the log
    pub fn append_conflicts(
        &self,
        version: VersionNumber,
        conflicts: &[Conflict],
    ) -> Result<(), SyncError> {
        if conflicts.is_empty() {
            return Ok(());
        }
        let mut log = self.load_conflict_log()?;
        log.append(version, conflicts);
        let path = self.root.join(METADATA_DIR).join(CONFLICTS_FILE);
        let bytes = serde_json::to_vec_pretty(&log).map_err(|e| SyncError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        write_atomic(&path, &bytes).map_err(|e| SyncError::io(path.display(), &e))
    }

    /// Validate that a path does not escape into the metadata directory
    pub fn validate_project_path(path: &RelPath) -> Result<(), DomainError> {
        if path.as_str() == METADATA_DIR || path.as_str().starts_with(&format!("{METADATA_DIR}/")) {
            return Err(DomainError::InvalidPath(format!(
                "'{path}' is inside the metadata directory"
            )));
        }
        Ok(())
    }
}

/// Write a file atomically: temp file in the same directory, then rename
fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let tmp = dir.join(format!(
        ".{}.tmp",
        target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string())
    ));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, target)
}
