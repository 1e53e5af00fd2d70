//! Working-copy change detection
//!
//! Walks the working copy tree and compares every file against the
//! fingerprint ledger: absent-before/present-after is an add,
//! present-before/absent-after a removal, fingerprint mismatch an update.
//! Structured files recurse into record-level diffing against the base
//! snapshot. A rename is reported as removal plus add; rename detection is
//! deliberately not implemented.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, instrument, warn};

use terrasync_core::domain::diff::{FileChange, FileKind, ProjectDiff};
use terrasync_core::domain::newtypes::RelPath;
use terrasync_core::domain::record::Table;
use terrasync_core::domain::working_copy::{WorkingCopy, METADATA_DIR};
use terrasync_core::ports::content_store::IContentStore;

use crate::table::diff_tables;

/// Detects local changes in a working copy relative to its base version
pub struct ChangeDetector {
    content_store: Arc<dyn IContentStore>,
}

impl ChangeDetector {
    pub fn new(content_store: Arc<dyn IContentStore>) -> Self {
        Self { content_store }
    }

    /// Compute the local diff of `working_copy` against its ledger
    ///
    /// Deterministic: identical working-copy state always yields an
    /// identical (key-sorted) diff.
    #[instrument(skip_all, fields(root = %working_copy.root().display()))]
    pub async fn detect(&self, working_copy: &WorkingCopy) -> anyhow::Result<ProjectDiff> {
        let mut on_disk = BTreeSet::new();
        collect_files(working_copy.root(), working_copy.root(), &mut on_disk)?;

        let mut diff = ProjectDiff::new();

        for path in &on_disk {
            let fs_path = working_copy.file_path(path);
            let fingerprint = self
                .content_store
                .fingerprint(&fs_path)
                .await
                .with_context(|| format!("failed to fingerprint '{path}'"))?;

            match working_copy.ledger().get(path) {
                None => {
                    diff.insert(path.clone(), FileChange::Added { fingerprint });
                }
                Some(record) if record.fingerprint == fingerprint => {}
                Some(_) => {
                    let table = match FileKind::of(path) {
                        FileKind::Structured => {
                            match self.structured_update(working_copy, path)? {
                                // bytes differ but no record changed
                                // (formatting, reordering): not a change
                                None => continue,
                                Some(table_diff) => Some(table_diff),
                            }
                        }
                        FileKind::Opaque => None,
                    };
                    diff.insert(path.clone(), FileChange::Updated { fingerprint, table });
                }
            }
        }

        for path in working_copy.ledger().keys() {
            if !on_disk.contains(path) {
                diff.insert(path.clone(), FileChange::Removed);
            }
        }

        debug!(counts = ?diff.counts(), "local change detection finished");
        Ok(diff)
    }

    /// Record-level diff for a structured file with changed bytes
    fn structured_update(
        &self,
        working_copy: &WorkingCopy,
        path: &RelPath,
    ) -> anyhow::Result<Option<terrasync_core::domain::record::TableDiff>> {
        let base_bytes = working_copy
            .read_base(path)?
            .with_context(|| format!("no base snapshot for structured file '{path}'"))?;
        let base = Table::from_json_bytes(path.as_str(), &base_bytes)?;

        let current_bytes = fs::read(working_copy.file_path(path))
            .with_context(|| format!("failed to read '{path}'"))?;
        let current = Table::from_json_bytes(path.as_str(), &current_bytes)?;

        let table_diff = diff_tables(&base, &current)?;
        if table_diff.is_empty() {
            Ok(None)
        } else {
            Ok(Some(table_diff))
        }
    }
}

/// Recursively collect regular files, skipping the metadata directory
fn collect_files(
    dir: &Path,
    root: &Path,
    out: &mut BTreeSet<RelPath>,
) -> anyhow::Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory '{}'", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.file_name().is_some_and(|n| n == METADATA_DIR) {
            continue;
        }
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&path, root, out)?;
        } else if file_type.is_file() {
            match RelPath::from_fs_path(&path, root) {
                Ok(rel) => {
                    out.insert(rel);
                }
                Err(err) => {
                    warn!(path = %path.display(), %err, "skipping unrepresentable path");
                }
            }
        }
    }
    Ok(())
}
