//! Terrasync Merge - rebase engine
//!
//! Re-expresses a local diff over pulled remote history and resolves every
//! collision by policy: remote wins, the losing local value is preserved
//! either in the conflict log or as an on-disk conflict copy.

mod error;
mod namer;
mod rebase;

pub use error::RebaseError;
pub use namer::ConflictNamer;
pub use rebase::{rebase, RebaseOutcome};
