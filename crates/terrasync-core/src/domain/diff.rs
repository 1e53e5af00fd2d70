//! File-level project diffs
//!
//! A [`ProjectDiff`] describes every file that differs between two project
//! states. Files absent from the map are unchanged. For structured files an
//! update additionally carries the record-level [`TableDiff`].
//!
//! Rename detection is not implemented: a renamed file is reported as
//! `Removed` plus `Added`. The enum has no rename variant, which makes the
//! policy explicit to consumers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::newtypes::{Fingerprint, RelPath};
use super::record::TableDiff;

/// How a file participates in diffing and merging
///
/// Resolved once from the path when a diff is constructed; structured files
/// get record-level treatment, opaque files whole-content treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// JSON table with keyed records (`.gtab`)
    Structured,
    /// Any other file; compared by fingerprint only
    Opaque,
}

impl FileKind {
    #[must_use]
    pub fn of(path: &RelPath) -> Self {
        match path.extension() {
            Some("gtab") => FileKind::Structured,
            _ => FileKind::Opaque,
        }
    }
}

/// One file's change between two project states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "lowercase")]
pub enum FileChange {
    Added {
        fingerprint: Fingerprint,
    },
    Removed,
    Updated {
        fingerprint: Fingerprint,
        /// Record-level decomposition; present only for structured files
        #[serde(skip_serializing_if = "Option::is_none", default)]
        table: Option<TableDiff>,
    },
}

/// Counts per change class, for summaries and logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
}

/// Complete diff between two project states, keyed by path
///
/// `BTreeMap` keeps serialization key-sorted, so identical inputs always
/// produce identical diff documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDiff {
    pub files: BTreeMap<RelPath, FileChange>,
}

impl ProjectDiff {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn insert(&mut self, path: RelPath, change: FileChange) {
        self.files.insert(path, change);
    }

    pub fn get(&self, path: &RelPath) -> Option<&FileChange> {
        self.files.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &RelPath> {
        self.files.keys()
    }

    #[must_use]
    pub fn counts(&self) -> ChangeCounts {
        let mut counts = ChangeCounts::default();
        for change in self.files.values() {
            match change {
                FileChange::Added { .. } => counts.added += 1,
                FileChange::Removed => counts.removed += 1,
                FileChange::Updated { .. } => counts.updated += 1,
            }
        }
        counts
    }

    /// Sequential composition: `self` applied first, then `next`
    ///
    /// Collapses a run of per-version diffs into one cumulative diff.
    /// Structured updates compose at record level via [`TableDiff::compose`].
    #[must_use]
    pub fn compose(&self, next: &ProjectDiff) -> ProjectDiff {
        let mut files = self.files.clone();
        for (path, second) in &next.files {
            let merged = match (files.remove(path), second) {
                (None, change) => Some(change.clone()),
                // added then updated: still an add, at the later content
                (
                    Some(FileChange::Added { .. }),
                    FileChange::Updated { fingerprint, .. },
                ) => Some(FileChange::Added {
                    fingerprint: fingerprint.clone(),
                }),
                // added then removed: cancels out
                (Some(FileChange::Added { .. }), FileChange::Removed) => None,
                (
                    Some(FileChange::Updated { table: first_table, .. }),
                    FileChange::Updated { fingerprint, table: second_table },
                ) => {
                    let table = match (first_table, second_table) {
                        (Some(a), Some(b)) => Some(a.compose(b)),
                        (a, b) => b.clone().or(a),
                    };
                    Some(FileChange::Updated {
                        fingerprint: fingerprint.clone(),
                        table,
                    })
                }
                // removed then re-added: an update relative to the original base
                (Some(FileChange::Removed), FileChange::Added { fingerprint }) => {
                    Some(FileChange::Updated {
                        fingerprint: fingerprint.clone(),
                        table: None,
                    })
                }
                // remaining pairings are inconsistent histories; the later
                // change is authoritative
                (Some(_), change) => Some(change.clone()),
            };
            if let Some(change) = merged {
                files.insert(path.clone(), change);
            }
        }
        ProjectDiff { files }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(seed: u8) -> Fingerprint {
        Fingerprint::from_digest(&[seed; 32])
    }

    fn path(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    #[test]
    fn test_file_kind_resolution() {
        assert_eq!(FileKind::of(&path("data/rivers.gtab")), FileKind::Structured);
        assert_eq!(FileKind::of(&path("map.qgz")), FileKind::Opaque);
        assert_eq!(FileKind::of(&path("README")), FileKind::Opaque);
    }

    #[test]
    fn test_counts() {
        let mut diff = ProjectDiff::new();
        diff.insert(path("a"), FileChange::Added { fingerprint: fp(1) });
        diff.insert(path("b"), FileChange::Removed);
        diff.insert(
            path("c"),
            FileChange::Updated {
                fingerprint: fp(2),
                table: None,
            },
        );
        let counts = diff.counts();
        assert_eq!(counts.added, 1);
        assert_eq!(counts.removed, 1);
        assert_eq!(counts.updated, 1);
    }

    #[test]
    fn test_compose_added_then_removed_cancels() {
        let mut first = ProjectDiff::new();
        first.insert(path("a"), FileChange::Added { fingerprint: fp(1) });
        let mut second = ProjectDiff::new();
        second.insert(path("a"), FileChange::Removed);
        assert!(first.compose(&second).is_empty());
    }

    #[test]
    fn test_compose_added_then_updated_stays_added() {
        let mut first = ProjectDiff::new();
        first.insert(path("a"), FileChange::Added { fingerprint: fp(1) });
        let mut second = ProjectDiff::new();
        second.insert(
            path("a"),
            FileChange::Updated {
                fingerprint: fp(2),
                table: None,
            },
        );
        let composed = first.compose(&second);
        assert_eq!(
            composed.get(&path("a")),
            Some(&FileChange::Added { fingerprint: fp(2) })
        );
    }

    #[test]
    fn test_compose_removed_then_added_becomes_updated() {
        let mut first = ProjectDiff::new();
        first.insert(path("a"), FileChange::Removed);
        let mut second = ProjectDiff::new();
        second.insert(path("a"), FileChange::Added { fingerprint: fp(3) });
        let composed = first.compose(&second);
        assert!(matches!(
            composed.get(&path("a")),
            Some(FileChange::Updated { .. })
        ));
    }

    #[test]
    fn test_serialization_is_key_sorted() {
        let mut diff = ProjectDiff::new();
        diff.insert(path("zebra.txt"), FileChange::Removed);
        diff.insert(path("alpha.txt"), FileChange::Removed);
        let json = serde_json::to_string(&diff).unwrap();
        assert!(json.find("alpha.txt").unwrap() < json.find("zebra.txt").unwrap());
    }
}
