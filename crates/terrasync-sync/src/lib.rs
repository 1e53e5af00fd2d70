//! Terrasync Sync - orchestration layer
//!
//! Drives the pull, rebase, apply, push protocol against the remote
//! versioning service, plus the project lifecycle operations (download,
//! create, status, remove). All retry policy lives here: adapters report
//! each failure once, the orchestrator decides what is worth retrying.

pub mod filesystem;
pub mod orchestrator;
pub mod retry;

pub use filesystem::LocalFileSystem;
pub use orchestrator::{StatusReport, SyncOrchestrator, SyncResult};
pub use retry::{with_retry, RetryPolicy};
