//! Rebase of local changes over remote history
//!
//! Re-expresses a local diff against the state the project will be in once
//! the pulled remote changes are applied. Remote-only changes never appear
//! in the output; they reach the working copy through the base snapshots.
//! Collisions are resolved by policy (remote wins, local preserved) and
//! reported, never prompted on.

use tracing::debug;

use terrasync_core::domain::conflict::{Conflict, ConflictResolution};
use terrasync_core::domain::diff::{FileChange, ProjectDiff};
use terrasync_core::domain::newtypes::RelPath;
use terrasync_core::domain::record::{FieldValue, RecordChange, Row, TableDiff};

use crate::error::RebaseError;
use crate::namer::ConflictNamer;

/// Result of rebasing a local diff over composed remote changes
#[derive(Debug, Clone)]
pub struct RebaseOutcome {
    /// Local changes, re-expressed relative to the post-pull project state
    ///
    /// Fingerprints on structured entries are carried over from the input
    /// and are provisional; callers materialize the merged content and
    /// re-detect before pushing.
    pub merged: ProjectDiff,
    /// Every collision encountered, with the resolution that was applied
    pub conflicts: Vec<Conflict>,
}

impl RebaseOutcome {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Rebase `local` over `remote`, both expressed against the same base
///
/// `remote` is the composition of every pulled version diff. Pure except
/// for conflict copy names, which carry a date and a random suffix.
pub fn rebase(local: &ProjectDiff, remote: &ProjectDiff) -> Result<RebaseOutcome, RebaseError> {
    let mut merged = ProjectDiff::new();
    let mut conflicts = Vec::new();

    for (path, local_change) in &local.files {
        let Some(remote_change) = remote.get(path) else {
            merged.insert(path.clone(), local_change.clone());
            continue;
        };

        match (local_change, remote_change) {
            // Record-level three-way merge for structured files
            (
                FileChange::Updated {
                    fingerprint,
                    table: Some(local_table),
                },
                FileChange::Updated {
                    table: Some(remote_table),
                    ..
                },
            ) => {
                let rebased =
                    rebase_table(path, local_table, remote_table, &mut conflicts)?;
                if !rebased.is_empty() {
                    merged.insert(
                        path.clone(),
                        FileChange::Updated {
                            fingerprint: fingerprint.clone(),
                            table: Some(rebased),
                        },
                    );
                }
            }

            // Whole-content collision: remote wins in place, local bytes
            // preserved under a conflict copy name
            (
                FileChange::Added { fingerprint: ours } | FileChange::Updated { fingerprint: ours, .. },
                FileChange::Added { fingerprint: theirs } | FileChange::Updated { fingerprint: theirs, .. },
            ) => {
                if ours != theirs {
                    let copy_name = ConflictNamer::generate(path.file_name());
                    conflicts.push(Conflict::file(path.clone(), copy_name));
                }
                // identical content means both sides converged
            }

            // Local edit survives a remote deletion as a re-creation
            (
                FileChange::Added { fingerprint } | FileChange::Updated { fingerprint, .. },
                FileChange::Removed,
            ) => {
                debug!(path = %path, "remote removed a locally edited file, keeping local");
                merged.insert(
                    path.clone(),
                    FileChange::Added {
                        fingerprint: fingerprint.clone(),
                    },
                );
            }

            // Remote touched a file we deleted: the remote content survives
            (FileChange::Removed, FileChange::Added { .. } | FileChange::Updated { .. }) => {
                debug!(path = %path, "remote updated a locally deleted file, dropping deletion");
            }

            (FileChange::Removed, FileChange::Removed) => {}
        }
    }

    Ok(RebaseOutcome { merged, conflicts })
}

/// Per-record merge of two table diffs over the same base
fn rebase_table(
    path: &RelPath,
    local: &TableDiff,
    remote: &TableDiff,
    conflicts: &mut Vec<Conflict>,
) -> Result<TableDiff, RebaseError> {
    if local.key_field != remote.key_field {
        return Err(RebaseError::KeyFieldMismatch {
            path: path.to_string(),
            local: local.key_field.clone(),
            remote: remote.key_field.clone(),
        });
    }

    let mut rebased = TableDiff::new(local.key_field.clone());

    for (key, local_change) in &local.rows {
        let Some(remote_change) = remote.rows.get(key) else {
            rebased.rows.insert(key.clone(), local_change.clone());
            continue;
        };

        match (local_change, remote_change) {
            (
                RecordChange::Updated { old, new },
                RecordChange::Updated { new: remote_new, .. },
            ) => {
                let mut kept_old = Row::new();
                let mut kept_new = Row::new();
                for (field, local_value) in new {
                    match remote_new.get(field) {
                        Some(remote_value) if remote_value == local_value => {}
                        Some(remote_value) => {
                            conflicts.push(Conflict::field(
                                path.clone(),
                                key.clone(),
                                field.clone(),
                                local_value.clone(),
                                remote_value.clone(),
                            ));
                        }
                        None => {
                            kept_old.insert(
                                field.clone(),
                                old.get(field).cloned().unwrap_or(FieldValue::Null),
                            );
                            kept_new.insert(field.clone(), local_value.clone());
                        }
                    }
                }
                if !kept_new.is_empty() {
                    rebased.rows.insert(
                        key.clone(),
                        RecordChange::Updated {
                            old: kept_old,
                            new: kept_new,
                        },
                    );
                }
            }

            // Both sides created the same key: treated as an update
            // collision, remote fields winning
            (
                RecordChange::Inserted { fields },
                RecordChange::Inserted { fields: remote_fields },
            ) => {
                let mut kept_old = Row::new();
                let mut kept_new = Row::new();
                for (field, local_value) in fields {
                    match remote_fields.get(field) {
                        Some(remote_value) if remote_value == local_value => {}
                        Some(remote_value) => {
                            conflicts.push(Conflict {
                                path: path.clone(),
                                record: Some(key.clone()),
                                field: Some(field.clone()),
                                local: Some(local_value.clone()),
                                remote: Some(remote_value.clone()),
                                resolution: ConflictResolution::InsertCollision,
                            });
                        }
                        None => {
                            kept_old.insert(field.clone(), FieldValue::Null);
                            kept_new.insert(field.clone(), local_value.clone());
                        }
                    }
                }
                if !kept_new.is_empty() {
                    rebased.rows.insert(
                        key.clone(),
                        RecordChange::Updated {
                            old: kept_old,
                            new: kept_new,
                        },
                    );
                }
            }

            // The deleted row comes back carrying the local edit
            (RecordChange::Updated { new, .. }, RecordChange::Deleted { old }) => {
                let mut fields = old.clone();
                for (field, value) in new {
                    fields.insert(field.clone(), value.clone());
                }
                rebased
                    .rows
                    .insert(key.clone(), RecordChange::Inserted { fields });
                conflicts.push(Conflict {
                    path: path.clone(),
                    record: Some(key.clone()),
                    field: None,
                    local: None,
                    remote: None,
                    resolution: ConflictResolution::LocalEditReinserted,
                });
            }

            // Remote edit revives a record we deleted
            (RecordChange::Deleted { .. }, RecordChange::Updated { .. }) => {
                debug!(path = %path, record = %key, "remote updated a locally deleted record");
            }

            (RecordChange::Deleted { .. }, RecordChange::Deleted { .. }) => {}

            // An insert on one side cannot collide with an update or delete
            // on the other unless histories diverged; keep the local change
            (local_change, _) => {
                debug!(path = %path, record = %key, "inconsistent change pair, keeping local");
                rebased.rows.insert(key.clone(), local_change.clone());
            }
        }
    }

    Ok(rebased)
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrasync_core::domain::newtypes::{Fingerprint, RecordKey};

    fn fp(byte: char) -> Fingerprint {
        Fingerprint::new(byte.to_string().repeat(64)).unwrap()
    }

    fn rel(path: &str) -> RelPath {
        RelPath::new(path).unwrap()
    }

    fn key(k: &str) -> RecordKey {
        RecordKey::new(k).unwrap()
    }

    fn row(pairs: &[(&str, FieldValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn table_update(path: &str, fingerprint: char, diff: TableDiff) -> ProjectDiff {
        let mut project = ProjectDiff::new();
        project.insert(
            rel(path),
            FileChange::Updated {
                fingerprint: fp(fingerprint),
                table: Some(diff),
            },
        );
        project
    }

    #[test]
    fn test_rebase_over_nothing_is_identity() {
        let mut local = ProjectDiff::new();
        local.insert(rel("notes.txt"), FileChange::Added { fingerprint: fp('a') });

        let outcome = rebase(&local, &ProjectDiff::new()).unwrap();
        assert_eq!(outcome.merged, local);
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_remote_only_changes_are_not_replayed() {
        let mut remote = ProjectDiff::new();
        remote.insert(rel("notes.txt"), FileChange::Added { fingerprint: fp('b') });

        let outcome = rebase(&ProjectDiff::new(), &remote).unwrap();
        assert!(outcome.merged.is_empty());
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_disjoint_record_keys_merge_without_conflicts() {
        let mut local_table = TableDiff::new("fid");
        local_table.rows.insert(
            key("1"),
            RecordChange::Updated {
                old: row(&[("name", text("old"))]),
                new: row(&[("name", text("mine"))]),
            },
        );
        let mut remote_table = TableDiff::new("fid");
        remote_table.rows.insert(
            key("2"),
            RecordChange::Updated {
                old: row(&[("name", text("old"))]),
                new: row(&[("name", text("theirs"))]),
            },
        );

        let local = table_update("data/rivers.gtab", 'a', local_table.clone());
        let remote = table_update("data/rivers.gtab", 'b', remote_table);

        let outcome = rebase(&local, &remote).unwrap();
        assert!(outcome.is_clean());
        match outcome.merged.get(&rel("data/rivers.gtab")) {
            Some(FileChange::Updated { table: Some(t), .. }) => {
                assert_eq!(t.rows.len(), 1);
                assert!(t.rows.contains_key(&key("1")));
            }
            other => panic!("expected structured update, got {other:?}"),
        }
    }

    #[test]
    fn test_disjoint_fields_on_same_record_union() {
        let mut local_table = TableDiff::new("fid");
        local_table.rows.insert(
            key("7"),
            RecordChange::Updated {
                old: row(&[("name", text("A"))]),
                new: row(&[("name", text("B"))]),
            },
        );
        let mut remote_table = TableDiff::new("fid");
        remote_table.rows.insert(
            key("7"),
            RecordChange::Updated {
                old: row(&[("geom", text("POINT(0 0)"))]),
                new: row(&[("geom", text("POINT(1 1)"))]),
            },
        );

        let local = table_update("data/rivers.gtab", 'a', local_table);
        let remote = table_update("data/rivers.gtab", 'b', remote_table);

        let outcome = rebase(&local, &remote).unwrap();
        assert!(outcome.is_clean());
        match outcome.merged.get(&rel("data/rivers.gtab")) {
            Some(FileChange::Updated { table: Some(t), .. }) => {
                match t.rows.get(&key("7")) {
                    Some(RecordChange::Updated { new, .. }) => {
                        assert_eq!(new.get("name"), Some(&text("B")));
                        assert!(!new.contains_key("geom"));
                    }
                    other => panic!("expected update, got {other:?}"),
                }
            }
            other => panic!("expected structured update, got {other:?}"),
        }
    }

    #[test]
    fn test_same_field_collision_remote_wins_local_logged() {
        let mut local_table = TableDiff::new("fid");
        local_table.rows.insert(
            key("7"),
            RecordChange::Updated {
                old: row(&[("name", text("A"))]),
                new: row(&[("name", text("B"))]),
            },
        );
        let mut remote_table = TableDiff::new("fid");
        remote_table.rows.insert(
            key("7"),
            RecordChange::Updated {
                old: row(&[("name", text("A"))]),
                new: row(&[("name", text("C"))]),
            },
        );

        let local = table_update("data/rivers.gtab", 'a', local_table);
        let remote = table_update("data/rivers.gtab", 'b', remote_table);

        let outcome = rebase(&local, &remote).unwrap();
        // nothing left to push for this record: the remote value stands
        assert!(outcome.merged.is_empty());
        assert_eq!(outcome.conflicts.len(), 1);
        let conflict = &outcome.conflicts[0];
        assert_eq!(conflict.resolution, ConflictResolution::RemoteFieldKept);
        assert_eq!(conflict.local, Some(text("B")));
        assert_eq!(conflict.remote, Some(text("C")));
        assert_eq!(conflict.field.as_deref(), Some("name"));
    }

    #[test]
    fn test_converged_field_edits_are_not_conflicts() {
        let mut local_table = TableDiff::new("fid");
        local_table.rows.insert(
            key("7"),
            RecordChange::Updated {
                old: row(&[("name", text("A"))]),
                new: row(&[("name", text("B"))]),
            },
        );
        let remote_table = local_table.clone();

        let local = table_update("data/rivers.gtab", 'a', local_table);
        let remote = table_update("data/rivers.gtab", 'b', remote_table);

        let outcome = rebase(&local, &remote).unwrap();
        assert!(outcome.merged.is_empty());
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_insert_insert_collision() {
        let mut local_table = TableDiff::new("fid");
        local_table.rows.insert(
            key("9"),
            RecordChange::Inserted {
                fields: row(&[("name", text("mine")), ("note", text("extra"))]),
            },
        );
        let mut remote_table = TableDiff::new("fid");
        remote_table.rows.insert(
            key("9"),
            RecordChange::Inserted {
                fields: row(&[("name", text("theirs"))]),
            },
        );

        let local = table_update("data/rivers.gtab", 'a', local_table);
        let remote = table_update("data/rivers.gtab", 'b', remote_table);

        let outcome = rebase(&local, &remote).unwrap();
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(
            outcome.conflicts[0].resolution,
            ConflictResolution::InsertCollision
        );
        // the local-only field still gets pushed as an update
        match outcome.merged.get(&rel("data/rivers.gtab")) {
            Some(FileChange::Updated { table: Some(t), .. }) => match t.rows.get(&key("9")) {
                Some(RecordChange::Updated { new, .. }) => {
                    assert_eq!(new.get("note"), Some(&text("extra")));
                    assert!(!new.contains_key("name"));
                }
                other => panic!("expected update, got {other:?}"),
            },
            other => panic!("expected structured update, got {other:?}"),
        }
    }

    #[test]
    fn test_local_update_vs_remote_delete_reinserts() {
        let mut local_table = TableDiff::new("fid");
        local_table.rows.insert(
            key("3"),
            RecordChange::Updated {
                old: row(&[("name", text("A"))]),
                new: row(&[("name", text("B"))]),
            },
        );
        let mut remote_table = TableDiff::new("fid");
        remote_table.rows.insert(
            key("3"),
            RecordChange::Deleted {
                old: row(&[("name", text("A")), ("geom", text("POINT(0 0)"))]),
            },
        );

        let local = table_update("data/rivers.gtab", 'a', local_table);
        let remote = table_update("data/rivers.gtab", 'b', remote_table);

        let outcome = rebase(&local, &remote).unwrap();
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(
            outcome.conflicts[0].resolution,
            ConflictResolution::LocalEditReinserted
        );
        match outcome.merged.get(&rel("data/rivers.gtab")) {
            Some(FileChange::Updated { table: Some(t), .. }) => match t.rows.get(&key("3")) {
                Some(RecordChange::Inserted { fields }) => {
                    // base row with the local edit layered over it
                    assert_eq!(fields.get("name"), Some(&text("B")));
                    assert_eq!(fields.get("geom"), Some(&text("POINT(0 0)")));
                }
                other => panic!("expected insert, got {other:?}"),
            },
            other => panic!("expected structured update, got {other:?}"),
        }
    }

    #[test]
    fn test_local_delete_vs_remote_update_drops_deletion() {
        let mut local_table = TableDiff::new("fid");
        local_table.rows.insert(
            key("3"),
            RecordChange::Deleted {
                old: row(&[("name", text("A"))]),
            },
        );
        let mut remote_table = TableDiff::new("fid");
        remote_table.rows.insert(
            key("3"),
            RecordChange::Updated {
                old: row(&[("name", text("A"))]),
                new: row(&[("name", text("C"))]),
            },
        );

        let local = table_update("data/rivers.gtab", 'a', local_table);
        let remote = table_update("data/rivers.gtab", 'b', remote_table);

        let outcome = rebase(&local, &remote).unwrap();
        assert!(outcome.merged.is_empty());
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_opaque_both_updated_creates_conflict_copy() {
        let mut local = ProjectDiff::new();
        local.insert(
            rel("survey.qgz"),
            FileChange::Updated { fingerprint: fp('a'), table: None },
        );
        let mut remote = ProjectDiff::new();
        remote.insert(
            rel("survey.qgz"),
            FileChange::Updated { fingerprint: fp('b'), table: None },
        );

        let outcome = rebase(&local, &remote).unwrap();
        assert!(outcome.merged.is_empty());
        assert_eq!(outcome.conflicts.len(), 1);
        match &outcome.conflicts[0].resolution {
            ConflictResolution::ConflictCopyCreated { copy_name } => {
                assert!(copy_name.starts_with("survey (conflicted copy "));
                assert!(copy_name.ends_with(").qgz"));
            }
            other => panic!("expected conflict copy, got {other:?}"),
        }
    }

    #[test]
    fn test_opaque_converged_content_is_silent() {
        let mut local = ProjectDiff::new();
        local.insert(
            rel("survey.qgz"),
            FileChange::Updated { fingerprint: fp('a'), table: None },
        );
        let remote = local.clone();

        let outcome = rebase(&local, &remote).unwrap();
        assert!(outcome.merged.is_empty());
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_local_edit_survives_remote_file_removal() {
        let mut local = ProjectDiff::new();
        local.insert(
            rel("survey.qgz"),
            FileChange::Updated { fingerprint: fp('a'), table: None },
        );
        let mut remote = ProjectDiff::new();
        remote.insert(rel("survey.qgz"), FileChange::Removed);

        let outcome = rebase(&local, &remote).unwrap();
        assert_eq!(
            outcome.merged.get(&rel("survey.qgz")),
            Some(&FileChange::Added { fingerprint: fp('a') })
        );
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_key_field_mismatch_is_an_error() {
        let mut local_table = TableDiff::new("fid");
        local_table
            .rows
            .insert(key("1"), RecordChange::Deleted { old: Row::new() });
        let mut remote_table = TableDiff::new("id");
        remote_table
            .rows
            .insert(key("1"), RecordChange::Deleted { old: Row::new() });

        let local = table_update("data/rivers.gtab", 'a', local_table);
        let remote = table_update("data/rivers.gtab", 'b', remote_table);
        assert!(matches!(
            rebase(&local, &remote),
            Err(RebaseError::KeyFieldMismatch { .. })
        ));
    }
}
