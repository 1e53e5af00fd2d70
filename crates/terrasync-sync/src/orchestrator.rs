//! Sync orchestration
//!
//! The [`SyncOrchestrator`] drives the pull, rebase, apply, push cycle for
//! one working copy at a time and owns every retry decision:
//!
//! 1. **Pull**: fetch versions since the base, compose their diffs
//! 2. **Rebase**: re-express local changes over the pulled history
//! 3. **Apply**: stage remote content in memory, then write file-atomically
//! 4. **Push**: commit the rebased local diff with the pulled-to parent
//!
//! Nothing on disk changes until the push parent is settled: a commit
//! rejected with `VersionOutdated` triggers a bounded re-pull loop, and
//! when that cap is exhausted the working copy is still at its pre-sync
//! base. The ledger checkpoint happens once, after a successful apply.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use terrasync_core::config::Config;
use terrasync_core::domain::conflict::{Conflict, ConflictResolution};
use terrasync_core::domain::diff::{FileChange, FileKind, ProjectDiff};
use terrasync_core::domain::errors::{SyncError, SyncFailure, SyncPhase};
use terrasync_core::domain::newtypes::{ProjectRef, RelPath, VersionNumber};
use terrasync_core::domain::record::{Table, TableDiff};
use terrasync_core::domain::working_copy::{FileRecord, WorkingCopy};
use terrasync_core::ports::{
    FilePayloads, IContentStore, ILocalFileSystem, IRemoteService, ISyncObserver, NoopObserver,
    TransferDirection,
};
use terrasync_diff::ChangeDetector;
use terrasync_history::VersionLog;
use terrasync_merge::rebase;
use terrasync_store::ContentStore;

use crate::retry::{with_retry, RetryPolicy};

// ============================================================================
// Results
// ============================================================================

/// Summary of a completed sync
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// The version the working copy now sits at
    pub new_base_version: VersionNumber,
    /// Number of remote file changes applied to the working copy
    pub applied_files: u32,
    /// Whether a new version was committed to the server
    pub pushed: bool,
    /// Collisions resolved by policy during this sync
    pub conflicts: Vec<Conflict>,
}

/// Snapshot of a working copy's standing, computed without modifying anything
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub project: ProjectRef,
    pub base_version: VersionNumber,
    pub latest_version: VersionNumber,
    pub local_changes: ProjectDiff,
}

/// Outcome of one pull-rebase-push attempt
enum Attempt {
    Done(SyncResult),
    /// Commit rejected with a stale parent; nothing was written locally
    Outdated,
}

/// Everything the apply step will do to disk, staged in memory first
///
/// Staging keeps failure handling honest: any error before the staged
/// writes leaves the working copy byte-for-byte untouched.
#[derive(Default)]
struct StagedApply {
    base_writes: Vec<(RelPath, Vec<u8>)>,
    base_removals: Vec<RelPath>,
    file_writes: Vec<(RelPath, Vec<u8>)>,
    file_removals: Vec<RelPath>,
    /// Local files to rename aside before remote content takes their path
    conflict_renames: Vec<(RelPath, String)>,
    applied_files: u32,
}

/// How one remote file change will be materialized
enum RemotePlan {
    Remove { keep_local_file: bool },
    /// Structured update with a record diff and an available base snapshot
    MergeTable(TableDiff),
    /// Full content must be fetched at the pulled-to version
    Fetch,
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Drives the sync protocol against the remote service
///
/// ## Dependencies
///
/// - `remote`: versioning server operations (`IRemoteService`)
/// - `content_store`: content fingerprints (`IContentStore`)
/// - `filesystem`: working-copy file I/O (`ILocalFileSystem`)
/// - `observer`: progress callbacks at phase/file checkpoints
pub struct SyncOrchestrator {
    remote: Arc<dyn IRemoteService>,
    content_store: Arc<dyn IContentStore>,
    filesystem: Arc<dyn ILocalFileSystem>,
    observer: Arc<dyn ISyncObserver>,
    retry: RetryPolicy,
    transfer_concurrency: usize,
    contention_retries: u32,
    /// One async mutex per project; a second concurrent sync fails fast
    locks: DashMap<String, Arc<Mutex<()>>>,
    cancel: CancellationToken,
}

impl SyncOrchestrator {
    pub fn new(
        remote: Arc<dyn IRemoteService>,
        content_store: Arc<dyn IContentStore>,
        filesystem: Arc<dyn ILocalFileSystem>,
        config: &Config,
    ) -> Self {
        Self {
            remote,
            content_store,
            filesystem,
            observer: Arc::new(NoopObserver),
            retry: RetryPolicy {
                max_retries: config.transfer.network_retries,
                base_delay: Duration::from_secs(config.transfer.backoff_base_secs),
            },
            transfer_concurrency: config.transfer.concurrency.max(1),
            contention_retries: config.sync.contention_retries,
            locks: DashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a progress observer
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ISyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Token callers can use to cancel in-flight syncs between transfers
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // ========================================================================
    // sync
    // ========================================================================

    /// Run one full sync of the working copy at `root`
    ///
    /// Conflicts never fail a sync; they are resolved by policy and
    /// reported in the result. Failures always carry the phase and whether
    /// the working copy was modified.
    #[tracing::instrument(skip(self), fields(root = %root.display()))]
    pub async fn sync(&self, root: &Path) -> Result<SyncResult, SyncFailure> {
        let mut working_copy = WorkingCopy::open(root)
            .map_err(|e| SyncFailure::new(SyncPhase::Pull, false, e))?;
        let project = working_copy.project().clone();

        let lock = self
            .locks
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let Ok(_guard) = lock.try_lock() else {
            return Err(SyncFailure::new(
                SyncPhase::Pull,
                false,
                SyncError::SyncInProgress,
            ));
        };

        info!(project = %project, base = %working_copy.base_version(), "starting sync");

        let detector = ChangeDetector::new(self.content_store.clone());
        // the version log enforces gapless numbering and keeps already
        // fetched versions across contention re-pulls
        let log = VersionLog::new(self.remote.clone(), project.clone());
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.sync_attempt(&mut working_copy, &detector, &log).await? {
                Attempt::Done(result) => {
                    info!(
                        project = %project,
                        version = %result.new_base_version,
                        applied = result.applied_files,
                        pushed = result.pushed,
                        conflicts = result.conflicts.len(),
                        "sync completed"
                    );
                    return Ok(result);
                }
                Attempt::Outdated => {
                    if attempts > self.contention_retries {
                        warn!(project = %project, attempts, "contention retry cap exhausted");
                        return Err(SyncFailure::new(
                            SyncPhase::Push,
                            false,
                            SyncError::Contention { attempts },
                        ));
                    }
                    info!(project = %project, attempt = attempts, "push outdated, re-pulling");
                }
            }
        }
    }

    /// One pull-rebase-apply-push pass over the working copy
    async fn sync_attempt(
        &self,
        working_copy: &mut WorkingCopy,
        detector: &ChangeDetector,
        log: &VersionLog,
    ) -> Result<Attempt, SyncFailure> {
        let project = working_copy.project().clone();
        let base = working_copy.base_version();
        let root = working_copy.root().to_path_buf();

        // ---- pull -------------------------------------------------------
        self.observer.phase_changed(SyncPhase::Pull);
        self.check_cancelled(SyncPhase::Pull)?;

        let versions = with_retry("versions_since", self.retry, || async {
            log.versions_since(base).await
        })
        .await
        .map_err(|e| self.failure(SyncPhase::Pull, false, &root, e))?;

        let pulled_to = versions.last().map_or(base, |v| v.number());
        let remote_diff = versions
            .iter()
            .fold(ProjectDiff::new(), |acc, v| acc.compose(v.changes()));
        debug!(
            versions = versions.len(),
            pulled_to = %pulled_to,
            remote_files = remote_diff.files.len(),
            "pull complete"
        );

        // ---- rebase -----------------------------------------------------
        self.observer.phase_changed(SyncPhase::Rebase);
        let local_diff = detector
            .detect(working_copy)
            .await
            .map_err(|e| self.failure(SyncPhase::Rebase, false, &root, e))?;
        let outcome = rebase(&local_diff, &remote_diff)
            .map_err(|e| self.failure(SyncPhase::Rebase, false, &root, anyhow::Error::new(e)))?;
        debug!(
            local_files = local_diff.files.len(),
            rebased_files = outcome.merged.files.len(),
            conflicts = outcome.conflicts.len(),
            "rebase complete"
        );

        // ---- apply (staged in memory first) -----------------------------
        self.observer.phase_changed(SyncPhase::Apply);
        let staged = self
            .stage(working_copy, &project, pulled_to, &remote_diff, &outcome.merged, &outcome.conflicts)
            .await
            .map_err(|e| self.failure(SyncPhase::Apply, false, &root, e))?;

        // ---- push -------------------------------------------------------
        let (push_diff, payloads) = self
            .prepare_push(working_copy, &outcome.merged, &staged)
            .await
            .map_err(|e| self.failure(SyncPhase::Push, false, &root, e))?;

        // the ledger tracks exactly what the server knows; conflict copies
        // stay out of it and surface as additions on the next sync
        let mut tracked: BTreeSet<RelPath> = working_copy.ledger().keys().cloned().collect();
        for (path, change) in remote_diff.files.iter().chain(&push_diff.files) {
            match change {
                FileChange::Removed => {
                    tracked.remove(path);
                }
                FileChange::Added { .. } | FileChange::Updated { .. } => {
                    tracked.insert(path.clone());
                }
            }
        }

        if push_diff.is_empty() {
            self.check_cancelled(SyncPhase::Apply)?;
            let result = self
                .commit_locally(working_copy, pulled_to, staged, outcome.conflicts, &tracked, false)
                .await?;
            return Ok(Attempt::Done(result));
        }

        self.observer.phase_changed(SyncPhase::Push);
        self.check_cancelled(SyncPhase::Push)?;

        // fail fast on access level before uploading any payload
        let info = with_retry("project_info", self.retry, || async {
            self.remote.project_info(&project).await
        })
        .await
        .map_err(|e| self.failure(SyncPhase::Push, false, &root, e))?;
        if !info.permission.can_push() {
            return Err(SyncFailure::new(
                SyncPhase::Push,
                false,
                SyncError::PermissionDenied {
                    project: project.to_string(),
                },
            ));
        }

        let committed = with_retry("commit", self.retry, || async {
            self.remote
                .commit(&project, pulled_to, &push_diff, &payloads)
                .await
        })
        .await;

        let version = match committed {
            Ok(version) => version,
            Err(err) => {
                if matches!(
                    err.downcast_ref::<SyncError>(),
                    Some(SyncError::VersionOutdated { .. })
                ) {
                    return Ok(Attempt::Outdated);
                }
                return Err(self.failure(SyncPhase::Push, false, &root, err));
            }
        };

        for path in payloads.keys() {
            self.observer.file_transferred(path, TransferDirection::Upload);
        }

        // the version now exists server-side, so the local apply must run
        // even if cancellation is requested at this point
        let result = self
            .commit_locally(working_copy, version.number(), staged, outcome.conflicts, &tracked, true)
            .await?;

        // base snapshots advance to the content that was pushed
        for (path, change) in &push_diff.files {
            if FileKind::of(path) != FileKind::Structured {
                continue;
            }
            let written = match change {
                FileChange::Removed => working_copy.remove_base(path),
                FileChange::Added { .. } | FileChange::Updated { .. } => {
                    match payloads.get(path) {
                        Some(bytes) => working_copy.write_base(path, bytes),
                        None => Ok(()),
                    }
                }
            };
            written.map_err(|e| SyncFailure::new(SyncPhase::Push, true, e))?;
        }

        Ok(Attempt::Done(result))
    }

    /// Write the staged apply to disk, checkpoint the ledger, log conflicts
    async fn commit_locally(
        &self,
        working_copy: &mut WorkingCopy,
        version: VersionNumber,
        staged: StagedApply,
        conflicts: Vec<Conflict>,
        tracked: &BTreeSet<RelPath>,
        pushed: bool,
    ) -> Result<SyncResult, SyncFailure> {
        let applied_files = staged.applied_files;
        self.apply_staged(working_copy, &staged)
            .await
            .map_err(|e| {
                let root = working_copy.root().to_path_buf();
                self.failure(SyncPhase::Apply, true, &root, e)
            })?;

        self.checkpoint(working_copy, version, tracked)
            .await
            .map_err(|e| {
                let root = working_copy.root().to_path_buf();
                self.failure(SyncPhase::Apply, true, &root, e)
            })?;

        working_copy
            .append_conflicts(version, &conflicts)
            .map_err(|e| SyncFailure::new(SyncPhase::Apply, true, e))?;

        Ok(SyncResult {
            new_base_version: version,
            applied_files,
            pushed,
            conflicts,
        })
    }

    // ========================================================================
    // Apply staging
    // ========================================================================

    /// Plan and prefetch every remote change without touching the disk
    async fn stage(
        &self,
        working_copy: &WorkingCopy,
        project: &ProjectRef,
        pulled_to: VersionNumber,
        remote_diff: &ProjectDiff,
        merged: &ProjectDiff,
        conflicts: &[Conflict],
    ) -> anyhow::Result<StagedApply> {
        let mut plans: BTreeMap<RelPath, RemotePlan> = BTreeMap::new();
        let mut downloads: Vec<RelPath> = Vec::new();

        for (path, change) in &remote_diff.files {
            WorkingCopy::validate_project_path(path)?;
            let plan = match change {
                FileChange::Removed => RemotePlan::Remove {
                    keep_local_file: merged.get(path).is_some(),
                },
                FileChange::Updated {
                    table: Some(table), ..
                } if working_copy.read_base(path)?.is_some() => {
                    RemotePlan::MergeTable(table.clone())
                }
                FileChange::Added { .. } | FileChange::Updated { .. } => {
                    downloads.push(path.clone());
                    RemotePlan::Fetch
                }
            };
            plans.insert(path.clone(), plan);
        }

        let mut fetched = self.download_all(project, pulled_to, downloads).await?;

        let copy_names: BTreeMap<&RelPath, &str> = conflicts
            .iter()
            .filter_map(|c| match &c.resolution {
                ConflictResolution::ConflictCopyCreated { copy_name } => {
                    Some((&c.path, copy_name.as_str()))
                }
                _ => None,
            })
            .collect();

        let mut staged = StagedApply::default();
        for (path, plan) in plans {
            match plan {
                RemotePlan::Remove { keep_local_file } => {
                    staged.base_removals.push(path.clone());
                    if !keep_local_file {
                        staged.file_removals.push(path);
                    }
                }
                RemotePlan::MergeTable(remote_table) => {
                    let base_bytes = working_copy
                        .read_base(&path)?
                        .ok_or_else(|| anyhow::anyhow!("base snapshot vanished for '{path}'"))?;
                    let base_table = Table::from_json_bytes(path.as_str(), &base_bytes)?;
                    let new_base = base_table.apply(&remote_table)?;
                    let new_base_bytes = new_base.to_json_bytes()?;

                    let working_bytes = match merged.get(&path) {
                        Some(FileChange::Updated {
                            table: Some(local_table),
                            ..
                        }) => new_base.apply(local_table)?.to_json_bytes()?,
                        _ => new_base_bytes.clone(),
                    };

                    staged.base_writes.push((path.clone(), new_base_bytes));
                    staged.file_writes.push((path, working_bytes));
                }
                RemotePlan::Fetch => {
                    let bytes = fetched
                        .remove(&path)
                        .ok_or_else(|| anyhow::anyhow!("no content fetched for '{path}'"))?;
                    if let Some(copy_name) = copy_names.get(&path) {
                        staged
                            .conflict_renames
                            .push((path.clone(), (*copy_name).to_string()));
                    }
                    if FileKind::of(&path) == FileKind::Structured {
                        staged.base_writes.push((path.clone(), bytes.clone()));
                    }
                    staged.file_writes.push((path, bytes));
                }
            }
            staged.applied_files += 1;
        }

        Ok(staged)
    }

    /// Fetch file contents through a bounded transfer pool
    ///
    /// Each transfer re-checks the cancellation token once it holds a
    /// permit: the transfer in flight finishes, everything still queued is
    /// aborted, and the whole fetch fails with `Cancelled`.
    async fn download_all(
        &self,
        project: &ProjectRef,
        version: VersionNumber,
        paths: Vec<RelPath>,
    ) -> anyhow::Result<BTreeMap<RelPath, Vec<u8>>> {
        let semaphore = Arc::new(Semaphore::new(self.transfer_concurrency));
        let mut join_set: JoinSet<anyhow::Result<(RelPath, Vec<u8>)>> = JoinSet::new();

        for path in paths {
            if self.cancel.is_cancelled() {
                return Err(anyhow::Error::new(SyncError::Cancelled {
                    phase: SyncPhase::Apply,
                }));
            }
            let remote = Arc::clone(&self.remote);
            let project = project.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let retry = self.retry;
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                if cancel.is_cancelled() {
                    return Err(anyhow::Error::new(SyncError::Cancelled {
                        phase: SyncPhase::Apply,
                    }));
                }
                let bytes = with_retry("download_file", retry, || async {
                    remote.download_file(&project, version, &path).await
                })
                .await?;
                Ok((path, bytes))
            });
        }

        let mut fetched = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            let (path, bytes) = match joined? {
                Ok(transfer) => transfer,
                Err(err) => {
                    join_set.abort_all();
                    return Err(err);
                }
            };
            self.observer
                .file_transferred(&path, TransferDirection::Download);
            fetched.insert(path, bytes);
        }
        Ok(fetched)
    }

    /// Turn the rebased local diff into a commit: exact fingerprints over
    /// the content that will be on disk, plus the payload bytes
    async fn prepare_push(
        &self,
        working_copy: &WorkingCopy,
        merged: &ProjectDiff,
        staged: &StagedApply,
    ) -> anyhow::Result<(ProjectDiff, FilePayloads)> {
        let mut push_diff = merged.clone();
        let mut payloads = FilePayloads::new();

        for (path, change) in &mut push_diff.files {
            let fingerprint = match change {
                FileChange::Removed => continue,
                FileChange::Added { fingerprint } => fingerprint,
                FileChange::Updated { fingerprint, .. } => fingerprint,
            };
            let bytes = match staged.file_writes.iter().find(|(p, _)| p == path) {
                Some((_, bytes)) => bytes.clone(),
                None => {
                    self.filesystem
                        .read_file(&working_copy.file_path(path))
                        .await?
                }
            };
            *fingerprint = ContentStore::fingerprint_bytes(&bytes);
            payloads.insert(path.clone(), bytes);
        }

        Ok((push_diff, payloads))
    }

    /// Write staged changes to the working copy, file-atomically
    async fn apply_staged(
        &self,
        working_copy: &WorkingCopy,
        staged: &StagedApply,
    ) -> anyhow::Result<()> {
        for (path, copy_name) in &staged.conflict_renames {
            let from = working_copy.file_path(path);
            let to = from.with_file_name(copy_name);
            if self.filesystem.state(&from).await?.exists {
                info!(path = %path, copy = %copy_name, "preserving local content as conflict copy");
                self.filesystem.rename(&from, &to).await?;
            }
        }
        for (path, bytes) in &staged.file_writes {
            self.filesystem
                .write_file_atomic(&working_copy.file_path(path), bytes)
                .await?;
        }
        for path in &staged.file_removals {
            self.filesystem
                .remove_file(&working_copy.file_path(path))
                .await?;
        }
        for (path, bytes) in &staged.base_writes {
            working_copy.write_base(path, bytes)?;
        }
        for path in &staged.base_removals {
            working_copy.remove_base(path)?;
        }
        Ok(())
    }

    /// Rewrite the fingerprint ledger from the tracked files actually on
    /// disk and advance the base version
    async fn checkpoint(
        &self,
        working_copy: &mut WorkingCopy,
        version: VersionNumber,
        tracked: &BTreeSet<RelPath>,
    ) -> anyhow::Result<()> {
        let mut ledger = BTreeMap::new();
        for path in tracked {
            let fs_path = working_copy.file_path(path);
            let state = self.filesystem.state(&fs_path).await?;
            if !state.exists {
                continue;
            }
            let fingerprint = self.content_store.fingerprint(&fs_path).await?;
            ledger.insert(
                path.clone(),
                FileRecord {
                    fingerprint,
                    size: state.size,
                    modified: state.modified.unwrap_or_else(Utc::now),
                },
            );
        }
        working_copy.checkpoint(version, ledger)?;
        Ok(())
    }

    // ========================================================================
    // Failure classification
    // ========================================================================

    fn check_cancelled(&self, phase: SyncPhase) -> Result<(), SyncFailure> {
        if self.cancel.is_cancelled() {
            return Err(SyncFailure::new(
                phase,
                false,
                SyncError::Cancelled { phase },
            ));
        }
        Ok(())
    }

    /// Attribute an error to a phase, preserving its typed root cause
    ///
    /// Untyped causes are classified by their chain: I/O errors keep the
    /// `Io` kind with the working-copy path, everything else stays `Other`
    /// rather than masquerading as a local failure.
    fn failure(
        &self,
        phase: SyncPhase,
        local_modified: bool,
        root: &Path,
        err: anyhow::Error,
    ) -> SyncFailure {
        let error = match err.downcast::<SyncError>() {
            Ok(error) => error,
            Err(err) if err.chain().any(|c| c.is::<std::io::Error>()) => SyncError::Io {
                path: root.display().to_string(),
                message: format!("{err:#}"),
            },
            Err(err) => SyncError::Other {
                message: format!("{err:#}"),
            },
        };
        SyncFailure::new(phase, local_modified, error)
    }

    // ========================================================================
    // Project operations
    // ========================================================================

    /// Clone a project at its latest version into a fresh working copy
    #[tracing::instrument(skip(self), fields(project = %project, root = %root.display()))]
    pub async fn download(&self, project: &ProjectRef, root: &Path) -> anyhow::Result<VersionNumber> {
        if WorkingCopy::exists(root) {
            anyhow::bail!("'{}' is already a terrasync working copy", root.display());
        }

        let log = VersionLog::new(self.remote.clone(), project.clone());
        let versions = with_retry("versions_since", self.retry, || async {
            log.versions_since(VersionNumber::INITIAL).await
        })
        .await?;
        let latest = versions.last().map_or(VersionNumber::INITIAL, |v| v.number());

        // composing the full history yields the surviving file set
        let full = versions
            .iter()
            .fold(ProjectDiff::new(), |acc, v| acc.compose(v.changes()));
        let paths: Vec<RelPath> = full
            .files
            .iter()
            .filter(|(_, change)| !matches!(change, FileChange::Removed))
            .map(|(path, _)| path.clone())
            .collect();

        let fetched = self.download_all(project, latest, paths).await?;

        let mut working_copy = WorkingCopy::init(root, project.clone(), latest)?;
        for (path, bytes) in &fetched {
            self.filesystem
                .write_file_atomic(&working_copy.file_path(path), bytes)
                .await?;
            if FileKind::of(path) == FileKind::Structured {
                working_copy.write_base(path, bytes)?;
            }
        }
        let tracked: BTreeSet<RelPath> = fetched.keys().cloned().collect();
        self.checkpoint(&mut working_copy, latest, &tracked).await?;

        info!(project = %project, version = %latest, files = fetched.len(), "project downloaded");
        Ok(latest)
    }

    /// Create a new project on the server, initializing `root` as its
    /// working copy; optionally push the directory's current content as v1
    #[tracing::instrument(skip(self), fields(project = %project, root = %root.display()))]
    pub async fn create(
        &self,
        project: &ProjectRef,
        root: &Path,
        push_existing: bool,
    ) -> anyhow::Result<VersionNumber> {
        if WorkingCopy::exists(root) {
            anyhow::bail!("'{}' is already a terrasync working copy", root.display());
        }

        let info = with_retry("create_project", self.retry, || async {
            self.remote.create_project(project).await
        })
        .await?;
        WorkingCopy::init(root, project.clone(), info.version)?;
        info!(project = %project, "project created");

        if push_existing {
            let result = self.sync(root).await.map_err(anyhow::Error::new)?;
            Ok(result.new_base_version)
        } else {
            Ok(info.version)
        }
    }

    /// Compare the working copy against its base and the server, read-only
    pub async fn status(&self, root: &Path) -> anyhow::Result<StatusReport> {
        let working_copy = WorkingCopy::open(root)?;
        let info = with_retry("project_info", self.retry, || async {
            self.remote.project_info(working_copy.project()).await
        })
        .await?;
        let detector = ChangeDetector::new(self.content_store.clone());
        let local_changes = detector.detect(&working_copy).await?;
        Ok(StatusReport {
            project: working_copy.project().clone(),
            base_version: working_copy.base_version(),
            latest_version: info.version,
            local_changes,
        })
    }

    /// Delete the local working copy directory (irreversible)
    pub async fn remove_local(&self, root: &Path) -> anyhow::Result<()> {
        if !WorkingCopy::exists(root) {
            anyhow::bail!("'{}' is not a terrasync working copy", root.display());
        }
        tokio::fs::remove_dir_all(root).await?;
        info!(root = %root.display(), "working copy removed");
        Ok(())
    }

    /// Delete the project from the server (irreversible)
    pub async fn remove_remote(&self, project: &ProjectRef) -> anyhow::Result<()> {
        let info = with_retry("project_info", self.retry, || async {
            self.remote.project_info(project).await
        })
        .await?;
        if !info.permission.can_delete() {
            return Err(anyhow::Error::new(SyncError::PermissionDenied {
                project: project.to_string(),
            }));
        }

        with_retry("delete_project", self.retry, || async {
            self.remote.delete_project(project).await
        })
        .await?;
        info!(project = %project, "remote project deleted");
        Ok(())
    }
}
