//! Rebase error types

use thiserror::Error;

/// Errors raised while rebasing local changes over remote history
#[derive(Debug, Error)]
pub enum RebaseError {
    /// The two sides disagree on which field identifies records
    #[error("key field mismatch in '{path}': local diff keyed by '{local}', remote by '{remote}'")]
    KeyFieldMismatch {
        path: String,
        local: String,
        remote: String,
    },
}
