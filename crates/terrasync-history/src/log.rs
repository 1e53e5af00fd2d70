//! Cached, restartable view of a project's version sequence
//!
//! Versions are retrieved lazily and cached, so an interrupted pull can
//! resume from the last fully-applied version without refetching or
//! re-applying anything. Every received sequence is checked for gapless,
//! strictly-increasing numbering; a violation means client and server have
//! desynchronized and surfaces as `HistoryGap`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, instrument};

use terrasync_core::domain::errors::SyncError;
use terrasync_core::domain::newtypes::{ProjectRef, VersionNumber};
use terrasync_core::domain::version::Version;
use terrasync_core::ports::remote_service::IRemoteService;

/// Per-project version log with a local cache
pub struct VersionLog {
    remote: Arc<dyn IRemoteService>,
    project: ProjectRef,
    cache: Mutex<BTreeMap<VersionNumber, Version>>,
}

impl VersionLog {
    pub fn new(remote: Arc<dyn IRemoteService>, project: ProjectRef) -> Self {
        Self {
            remote,
            project,
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn project(&self) -> &ProjectRef {
        &self.project
    }

    /// Latest version currently on the server
    pub async fn latest_version(&self) -> anyhow::Result<VersionNumber> {
        let info = self.remote.project_info(&self.project).await?;
        Ok(info.version)
    }

    /// Versions after `since`, ascending, contiguous
    ///
    /// Cached versions are served locally; only the uncovered suffix is
    /// fetched. Returns an empty vector when the server has nothing newer.
    #[instrument(skip(self), fields(project = %self.project, since = %since))]
    pub async fn versions_since(
        &self,
        since: VersionNumber,
    ) -> anyhow::Result<Vec<Version>> {
        let mut cache = self.cache.lock().await;

        // serve the contiguous cached prefix, then fetch the remainder
        let mut out = Vec::new();
        let mut cursor = since;
        while let Some(version) = cache.get(&cursor.next()) {
            out.push(version.clone());
            cursor = cursor.next();
        }

        let fetched = self.remote.versions_since(&self.project, cursor).await?;
        validate_contiguous(cursor, &fetched)?;
        for version in fetched {
            cache.insert(version.number(), version.clone());
            out.push(version);
        }

        debug!(
            returned = out.len(),
            cached = cache.len(),
            "version sequence assembled"
        );
        Ok(out)
    }
}

/// Enforce the gapless, strictly-increasing numbering invariant
fn validate_contiguous(since: VersionNumber, versions: &[Version]) -> Result<(), SyncError> {
    let mut expected = since.next();
    for version in versions {
        if version.number() != expected {
            return Err(SyncError::HistoryGap {
                expected,
                got: version.number(),
            });
        }
        expected = expected.next();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use terrasync_core::domain::diff::ProjectDiff;

    fn version(n: u64) -> Version {
        Version::new(VersionNumber::new(n), "alice", Utc::now(), ProjectDiff::new())
    }

    #[test]
    fn test_contiguous_sequence_accepted() {
        let versions = vec![version(3), version(4), version(5)];
        assert!(validate_contiguous(VersionNumber::new(2), &versions).is_ok());
    }

    #[test]
    fn test_empty_sequence_accepted() {
        assert!(validate_contiguous(VersionNumber::new(2), &[]).is_ok());
    }

    #[test]
    fn test_gap_detected() {
        let versions = vec![version(3), version(5)];
        let err = validate_contiguous(VersionNumber::new(2), &versions).unwrap_err();
        match err {
            SyncError::HistoryGap { expected, got } => {
                assert_eq!(expected, VersionNumber::new(4));
                assert_eq!(got, VersionNumber::new(5));
            }
            other => panic!("expected HistoryGap, got {other}"),
        }
    }

    #[test]
    fn test_wrong_start_detected() {
        let versions = vec![version(4)];
        assert!(matches!(
            validate_contiguous(VersionNumber::new(2), &versions),
            Err(SyncError::HistoryGap { .. })
        ));
    }
}
