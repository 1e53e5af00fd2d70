//! Terrasync Diff - change detection
//!
//! Compares a working copy against its last-known-synced state (the
//! fingerprint ledger plus base-version snapshots) and produces a
//! [`ProjectDiff`](terrasync_core::domain::ProjectDiff): added/removed/updated
//! files, decomposed to record level for structured tables.

mod detector;
pub mod table;

pub use detector::ChangeDetector;
pub use table::diff_tables;
