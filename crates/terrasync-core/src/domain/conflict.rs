//! Conflicts produced by the rebase engine
//!
//! A conflict records a collision between a local and a remote change to the
//! same record (or the same opaque file) together with the resolution policy
//! that was applied. Conflicts are collected, never prompted on: the merged
//! result always adopts the policy outcome and the losing local value is
//! preserved here so no user edit is silently discarded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{RecordKey, RelPath, VersionNumber};
use super::record::FieldValue;

/// Resolution policy applied to a conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Both sides changed the same field to different values; the remote
    /// value went into the merged record, the local value lives in this log
    RemoteFieldKept,
    /// Opaque file changed on both sides; remote content took the primary
    /// path and the local bytes were preserved under `copy_name`
    ConflictCopyCreated { copy_name: String },
    /// Local updated a record that remote deleted; the record was
    /// re-inserted carrying the local edit
    LocalEditReinserted,
    /// Local and remote both inserted the same key; treated as an update
    /// conflict, remote fields winning per-field
    InsertCollision,
}

/// One collision between a local and a remote change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub path: RelPath,
    /// Record identity, `None` for whole-file conflicts
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub record: Option<RecordKey>,
    /// Field name, `None` for whole-file and whole-record conflicts
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub field: Option<String>,
    /// The local value that lost (or was re-inserted)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub local: Option<FieldValue>,
    /// The remote value that won
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub remote: Option<FieldValue>,
    pub resolution: ConflictResolution,
}

impl Conflict {
    /// Whole-file conflict on an opaque file
    pub fn file(path: RelPath, copy_name: String) -> Self {
        Self {
            path,
            record: None,
            field: None,
            local: None,
            remote: None,
            resolution: ConflictResolution::ConflictCopyCreated { copy_name },
        }
    }

    /// Same-field collision within a record
    pub fn field(
        path: RelPath,
        record: RecordKey,
        field: impl Into<String>,
        local: FieldValue,
        remote: FieldValue,
    ) -> Self {
        Self {
            path,
            record: Some(record),
            field: Some(field.into()),
            local: Some(local),
            remote: Some(remote),
            resolution: ConflictResolution::RemoteFieldKept,
        }
    }
}

/// A conflict as persisted in the working copy's conflict log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub recorded_at: DateTime<Utc>,
    /// The version the sync landed on when the conflict was recorded
    pub version: VersionNumber,
    #[serde(flatten)]
    pub conflict: Conflict,
}

/// The per-working-copy conflict log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictLog {
    pub entries: Vec<ConflictEntry>,
}

impl ConflictLog {
    pub fn append(&mut self, version: VersionNumber, conflicts: &[Conflict]) {
        let now = Utc::now();
        for conflict in conflicts {
            self.entries.push(ConflictEntry {
                recorded_at: now,
                version,
                conflict: conflict.clone(),
            });
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
