//! Project metadata

use serde::{Deserialize, Serialize};

use super::newtypes::{ProjectRef, VersionNumber};

/// Access permission level the caller holds on a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Owner,
    Editor,
    Reader,
}

impl AccessLevel {
    /// Whether this level permits committing new versions
    #[must_use]
    pub fn can_push(&self) -> bool {
        matches!(self, AccessLevel::Owner | AccessLevel::Editor)
    }

    /// Whether this level permits deleting the project from the server
    #[must_use]
    pub fn can_delete(&self) -> bool {
        matches!(self, AccessLevel::Owner)
    }
}

/// Server-side project metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub project: ProjectRef,
    /// Current (latest) server-side version
    pub version: VersionNumber,
    pub permission: AccessLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_levels() {
        assert!(AccessLevel::Owner.can_push());
        assert!(AccessLevel::Editor.can_push());
        assert!(!AccessLevel::Reader.can_push());
        assert!(AccessLevel::Owner.can_delete());
        assert!(!AccessLevel::Editor.can_delete());
    }
}
