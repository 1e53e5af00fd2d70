//! Domain error types
//!
//! Two layers of errors live here:
//! - [`DomainError`] for validation failures when constructing domain values.
//! - [`SyncError`] / [`SyncFailure`] for the outcome taxonomy of a sync
//!   operation. Lower-level components never retry on their own; they bubble
//!   these up and the orchestrator decides retry vs. abort vs. partial success.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use super::newtypes::VersionNumber;

/// Errors that can occur when constructing or validating domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid project reference
    #[error("Invalid project reference: {0}")]
    InvalidProjectRef(String),

    /// Invalid version number
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Invalid relative path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid content fingerprint
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// Invalid record key
    #[error("Invalid record key: {0}")]
    InvalidRecordKey(String),

    /// Invalid structured table content
    #[error("Invalid table in '{path}': {reason}")]
    InvalidTable { path: String, reason: String },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Phase of the sync protocol in which a failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Pull,
    Rebase,
    Apply,
    Push,
}

impl Display for SyncPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Pull => "pull",
            SyncPhase::Rebase => "rebase",
            SyncPhase::Apply => "apply",
            SyncPhase::Push => "push",
        };
        f.write_str(name)
    }
}

/// The sync outcome error taxonomy
///
/// Retry policy (enforced by the orchestrator, nowhere else):
/// - `NetworkFailure` is transient: bounded backoff, then surfaced.
/// - `VersionOutdated` triggers a bounded re-pull loop; past the cap it
///   becomes `Contention`.
/// - Everything else is surfaced immediately.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local file unreadable or unwritable
    #[error("I/O failure on '{path}': {message}")]
    Io { path: String, message: String },

    /// Transport-level failure talking to the remote service
    #[error("Network failure: {message}")]
    NetworkFailure { message: String },

    /// The caller's access level does not permit the operation
    #[error("Permission denied for project '{project}'")]
    PermissionDenied { project: String },

    /// Commit rejected: someone else committed since our parent version
    #[error("Version outdated: committed against {parent}, server is at {latest}")]
    VersionOutdated {
        parent: VersionNumber,
        latest: VersionNumber,
    },

    /// Received version sequence is not contiguous; client and server
    /// histories have desynchronized and a re-clone is required
    #[error("History gap: expected {expected}, server returned {got}")]
    HistoryGap {
        expected: VersionNumber,
        got: VersionNumber,
    },

    /// The re-pull cap was exhausted under sustained concurrent pushes
    #[error("Contention: push still outdated after {attempts} attempts")]
    Contention { attempts: u32 },

    /// A sync is already running for this project
    #[error("A sync operation is already in progress for this project")]
    SyncInProgress,

    /// Cancellation was requested and honored
    #[error("Sync cancelled during {phase}")]
    Cancelled { phase: SyncPhase },

    /// Failure outside the taxonomy, carrying its full context chain
    #[error("{message}")]
    Other { message: String },
}

impl SyncError {
    /// Transient errors may be retried with backoff by the orchestrator
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::NetworkFailure { .. })
    }

    pub fn io(path: impl Display, err: &std::io::Error) -> Self {
        SyncError::Io {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

/// A failed sync, attributed to the phase it failed in
///
/// User-visible failures always state the phase and whether local data was
/// modified before the failure.
#[derive(Debug, Error)]
pub struct SyncFailure {
    pub phase: SyncPhase,
    /// True if the working copy was changed before the failure
    pub local_modified: bool,
    #[source]
    pub error: SyncError,
}

impl SyncFailure {
    pub fn new(phase: SyncPhase, local_modified: bool, error: SyncError) -> Self {
        Self {
            phase,
            local_modified,
            error,
        }
    }
}

impl Display for SyncFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = if self.local_modified {
            "working copy was modified"
        } else {
            "working copy untouched"
        };
        write!(f, "sync failed during {} ({state}): {}", self.phase, self.error)
    }
}
