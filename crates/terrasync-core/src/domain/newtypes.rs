//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and
//! values. Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// ProjectRef
// ============================================================================

/// Fully-qualified project reference: `workspace/name`
///
/// Both components must be non-empty and must not contain path separators,
/// since they are embedded into URLs and local directory names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectRef {
    workspace: String,
    name: String,
}

impl ProjectRef {
    /// Create a validated project reference
    pub fn new(workspace: impl Into<String>, name: impl Into<String>) -> Result<Self, DomainError> {
        let workspace = workspace.into();
        let name = name.into();
        for part in [&workspace, &name] {
            if part.is_empty() {
                return Err(DomainError::InvalidProjectRef(
                    "workspace and name must be non-empty".to_string(),
                ));
            }
            if part.contains('/') || part.contains('\\') {
                return Err(DomainError::InvalidProjectRef(format!(
                    "'{part}' must not contain path separators"
                )));
            }
        }
        Ok(Self { workspace, name })
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for ProjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workspace, self.name)
    }
}

impl FromStr for ProjectRef {
    type Err = DomainError;

    /// Parse `workspace/name`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((workspace, name)) => Self::new(workspace, name),
            None => Err(DomainError::InvalidProjectRef(format!(
                "expected 'workspace/name', got '{s}'"
            ))),
        }
    }
}

// ============================================================================
// VersionNumber
// ============================================================================

/// A project version number
///
/// Strictly increasing and gapless per project. `v0` denotes the empty
/// project before any content was committed. Displayed in the Mergin-style
/// `v{n}` notation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct VersionNumber(u64);

impl VersionNumber {
    pub const INITIAL: Self = Self(0);

    #[must_use]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The version directly following this one
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// True for `v0`, the empty project
    #[must_use]
    pub const fn is_initial(&self) -> bool {
        self.0 == 0
    }
}

impl Display for VersionNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for VersionNumber {
    type Err = DomainError;

    /// Accepts both `v5` and `5`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('v').unwrap_or(s);
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| DomainError::InvalidVersion(format!("'{s}' is not a version number")))
    }
}

// ============================================================================
// RelPath
// ============================================================================

/// A validated path relative to the working-copy root
///
/// Always uses forward slashes, never starts with `/`, and contains no
/// `.` or `..` components. This is the path form used in diffs, the
/// fingerprint ledger, and the remote file endpoints.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelPath(String);

impl RelPath {
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();
        if path.is_empty() {
            return Err(DomainError::InvalidPath("path must be non-empty".to_string()));
        }
        if path.starts_with('/') || path.contains('\\') {
            return Err(DomainError::InvalidPath(format!(
                "'{path}' must be relative with forward slashes"
            )));
        }
        if path.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
            return Err(DomainError::InvalidPath(format!(
                "'{path}' contains empty, '.' or '..' components"
            )));
        }
        Ok(Self(path))
    }

    /// Build a `RelPath` from a filesystem path relative to `root`
    pub fn from_fs_path(path: &Path, root: &Path) -> Result<Self, DomainError> {
        let relative = path.strip_prefix(root).map_err(|_| {
            DomainError::InvalidPath(format!("'{}' is not under the root", path.display()))
        })?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component.as_os_str().to_str() {
                Some(s) => parts.push(s),
                None => {
                    return Err(DomainError::InvalidPath(format!(
                        "'{}' is not valid UTF-8",
                        path.display()
                    )))
                }
            }
        }
        Self::new(parts.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve against a working-copy root directory
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for part in self.0.split('/') {
            out.push(part);
        }
        out
    }

    /// Final path component
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Extension without the leading dot, if any
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rsplit_once('.').map(|(_, ext)| ext).filter(|e| !e.is_empty())
    }
}

impl Display for RelPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RelPath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Content fingerprint: lowercase hex SHA-256 over file bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(hex: impl Into<String>) -> Result<Self, DomainError> {
        let hex = hex.into();
        if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
        {
            return Err(DomainError::InvalidFingerprint(format!(
                "expected 64 lowercase hex characters, got '{hex}'"
            )));
        }
        Ok(Self(hex))
    }

    /// Encode a raw SHA-256 digest
    #[must_use]
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        use std::fmt::Write;
        let mut hex = String::with_capacity(64);
        for byte in digest {
            // writing to a String cannot fail
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// RecordKey
// ============================================================================

/// Stable identity of a record within a structured table
///
/// The canonical string rendering of the table's key-field value. Record
/// diffs and merges are keyed on this, never on row position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(key: impl Into<String>) -> Result<Self, DomainError> {
        let key = key.into();
        if key.is_empty() {
            return Err(DomainError::InvalidRecordKey(
                "record key must be non-empty".to_string(),
            ));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
