//! Domain entities and business logic
//!
//! This module contains the core domain types for terrasync:
//! - Newtypes for type-safe identifiers and validated domain values
//! - Project and version metadata
//! - Structured-record and file-level diff types
//! - Conflict types produced by the rebase engine
//! - The working copy (local checkout metadata, fingerprint ledger)
//! - Domain-specific error types

pub mod conflict;
pub mod diff;
pub mod errors;
pub mod newtypes;
pub mod project;
pub mod record;
pub mod version;
pub mod working_copy;

// Re-export commonly used types
pub use conflict::{Conflict, ConflictEntry, ConflictLog, ConflictResolution};
pub use diff::{ChangeCounts, FileChange, FileKind, ProjectDiff};
pub use errors::{DomainError, SyncError, SyncFailure, SyncPhase};
pub use newtypes::{Fingerprint, ProjectRef, RecordKey, RelPath, VersionNumber};
pub use project::{AccessLevel, ProjectInfo};
pub use record::{FieldValue, RecordChange, Row, Table, TableDiff};
pub use version::Version;
pub use working_copy::{FileRecord, WorkingCopy, WorkingCopyMeta, METADATA_DIR};
