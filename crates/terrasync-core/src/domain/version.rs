//! Immutable version snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::diff::ProjectDiff;
use super::newtypes::VersionNumber;

/// An immutable, numbered snapshot of a project's state
///
/// Carries the diff that produced it relative to the prior version, so a
/// history view can render record-level change summaries without refetching
/// file content. Versions form a total order; there is no branching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    number: VersionNumber,
    author: String,
    created: DateTime<Utc>,
    changes: ProjectDiff,
}

impl Version {
    pub fn new(
        number: VersionNumber,
        author: impl Into<String>,
        created: DateTime<Utc>,
        changes: ProjectDiff,
    ) -> Self {
        Self {
            number,
            author: author.into(),
            created,
            changes,
        }
    }

    pub fn number(&self) -> VersionNumber {
        self.number
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn changes(&self) -> &ProjectDiff {
        &self.changes
    }
}
