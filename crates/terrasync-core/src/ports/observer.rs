//! Sync progress observer port
//!
//! Long sync operations report progress through this interface at defined
//! checkpoints (per phase, per file) instead of embedding host callbacks in
//! control flow. Observers must be cheap and non-blocking; cancellation is
//! handled separately via a cancellation token, not through the observer.

use crate::domain::errors::SyncPhase;
use crate::domain::newtypes::RelPath;

/// Direction of a single file transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Download,
    Upload,
}

/// Port trait for sync progress reporting
pub trait ISyncObserver: Send + Sync {
    /// The orchestrator entered a new phase
    fn phase_changed(&self, phase: SyncPhase) {
        let _ = phase;
    }

    /// One file finished transferring
    fn file_transferred(&self, path: &RelPath, direction: TransferDirection) {
        let _ = (path, direction);
    }
}

/// Observer that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ISyncObserver for NoopObserver {}
