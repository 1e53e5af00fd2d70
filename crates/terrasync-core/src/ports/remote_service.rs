//! Remote service port (driven/secondary port)
//!
//! Interface to the versioning server. The primary implementation is the
//! HTTP client in `terrasync-history`; the trait keeps the orchestrator
//! testable against in-memory fakes.
//!
//! ## Design notes
//!
//! - Methods return `anyhow::Result`; implementations attach a typed
//!   [`SyncError`](crate::domain::SyncError) as the root cause so the
//!   orchestrator can classify failures by downcasting, without string
//!   sniffing.
//! - `commit` is atomic on the server: either a complete new version is
//!   created or none is. File payloads for added/updated files travel
//!   within the same commit request.

use std::collections::BTreeMap;

use crate::domain::diff::ProjectDiff;
use crate::domain::newtypes::{ProjectRef, RelPath, VersionNumber};
use crate::domain::project::ProjectInfo;
use crate::domain::version::Version;

/// File contents accompanying a commit, keyed by project path
pub type FilePayloads = BTreeMap<RelPath, Vec<u8>>;

/// Port trait for remote versioning service operations
#[async_trait::async_trait]
pub trait IRemoteService: Send + Sync {
    /// Create a new, empty project (at `v0`)
    async fn create_project(&self, project: &ProjectRef) -> anyhow::Result<ProjectInfo>;

    /// Fetch current project metadata (latest version, caller's permission)
    async fn project_info(&self, project: &ProjectRef) -> anyhow::Result<ProjectInfo>;

    /// Fetch versions after `since`, in ascending order
    ///
    /// The returned sequence starts at `since + 1` and is contiguous;
    /// implementations must fail with `HistoryGap` otherwise.
    async fn versions_since(
        &self,
        project: &ProjectRef,
        since: VersionNumber,
    ) -> anyhow::Result<Vec<Version>>;

    /// Commit a new version on top of `parent`
    ///
    /// The server enforces `parent == latest`; a stale parent fails with
    /// `VersionOutdated` and nothing is committed.
    async fn commit(
        &self,
        project: &ProjectRef,
        parent: VersionNumber,
        diff: &ProjectDiff,
        files: &FilePayloads,
    ) -> anyhow::Result<Version>;

    /// Download one file's content as of the given version
    async fn download_file(
        &self,
        project: &ProjectRef,
        version: VersionNumber,
        path: &RelPath,
    ) -> anyhow::Result<Vec<u8>>;

    /// Delete the project from the server (irreversible)
    async fn delete_project(&self, project: &ProjectRef) -> anyhow::Result<()>;
}
