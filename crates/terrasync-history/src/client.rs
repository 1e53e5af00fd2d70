//! HTTP client for the terrasync versioning server
//!
//! Endpoints:
//! - `POST /projects` - create a project
//! - `GET  /projects/{workspace}/{name}` - project metadata
//! - `GET  /projects/{workspace}/{name}/versions?since=N` - version list
//! - `POST /projects/{workspace}/{name}/versions` - commit (atomic: the
//!   diff and all file payloads travel in one request; either a complete
//!   new version is created or none is)
//! - `GET  /projects/{workspace}/{name}/files/{version}/{path}` - content
//! - `DELETE /projects/{workspace}/{name}` - delete project
//!
//! Failures carry a typed [`SyncError`] as the anyhow root cause:
//! 409 → `VersionOutdated`, 403 → `PermissionDenied`, 5xx and transport
//! errors → `NetworkFailure`. The client never retries on its own; retry
//! policy belongs to the orchestrator.

use std::collections::BTreeMap;

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use terrasync_core::domain::diff::ProjectDiff;
use terrasync_core::domain::errors::SyncError;
use terrasync_core::domain::newtypes::{ProjectRef, RelPath, VersionNumber};
use terrasync_core::domain::project::{AccessLevel, ProjectInfo};
use terrasync_core::domain::version::Version;
use terrasync_core::ports::remote_service::{FilePayloads, IRemoteService};

// ============================================================================
// Wire DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct ProjectInfoDto {
    workspace: String,
    name: String,
    version: VersionNumber,
    permission: AccessLevel,
}

impl ProjectInfoDto {
    fn into_domain(self) -> anyhow::Result<ProjectInfo> {
        Ok(ProjectInfo {
            project: ProjectRef::new(self.workspace, self.name)?,
            version: self.version,
            permission: self.permission,
        })
    }
}

#[derive(Debug, Serialize)]
struct CreateProjectRequest<'a> {
    workspace: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    versions: Vec<Version>,
}

#[derive(Debug, Serialize)]
struct CommitRequest<'a> {
    parent: VersionNumber,
    author: &'a str,
    diff: &'a ProjectDiff,
    /// Contents for added/updated files, base64 over the wire
    files: BTreeMap<&'a str, String>,
}

#[derive(Debug, Deserialize)]
struct ConflictBody {
    latest: Option<VersionNumber>,
}

// ============================================================================
// HistoryClient
// ============================================================================

/// Typed HTTP client for the versioning server
///
/// Authentication is an explicit bearer token threaded through the
/// constructor; there is no ambient session.
pub struct HistoryClient {
    client: Client,
    base_url: Url,
    token: String,
    author: String,
}

impl HistoryClient {
    pub fn new(
        base_url: impl AsRef<str>,
        token: impl Into<String>,
        author: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .with_context(|| format!("invalid server URL '{}'", base_url.as_ref()))?;
        Ok(Self {
            client: Client::new(),
            base_url,
            token: token.into(),
            author: author.into(),
        })
    }

    fn project_url(&self, project: &ProjectRef, tail: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("server URL cannot be a base"))?;
            segments.extend(["projects", project.workspace(), project.name()]);
            segments.extend(tail);
        }
        Ok(url)
    }

    /// Map transport errors to the typed taxonomy
    fn transport(err: reqwest::Error) -> anyhow::Error {
        anyhow::Error::new(SyncError::NetworkFailure {
            message: err.to_string(),
        })
    }

    /// Convert a non-success response into a typed error
    async fn fail(project: &ProjectRef, response: Response) -> anyhow::Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                anyhow::Error::new(SyncError::PermissionDenied {
                    project: project.to_string(),
                })
            }
            StatusCode::CONFLICT => {
                let latest = serde_json::from_str::<ConflictBody>(&body)
                    .ok()
                    .and_then(|b| b.latest)
                    .unwrap_or_default();
                anyhow::Error::new(SyncError::VersionOutdated {
                    // parent is filled in by the commit caller's context
                    parent: VersionNumber::INITIAL,
                    latest,
                })
            }
            s if s.is_server_error() => anyhow::Error::new(SyncError::NetworkFailure {
                message: format!("server error {s}: {body}"),
            }),
            s => anyhow::anyhow!("request failed with {s}: {body}"),
        }
    }

    async fn send(
        &self,
        project: &ProjectRef,
        request: reqwest::RequestBuilder,
    ) -> anyhow::Result<Response> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(Self::transport)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::fail(project, response).await)
        }
    }
}

#[async_trait::async_trait]
impl IRemoteService for HistoryClient {
    #[instrument(skip(self), fields(project = %project))]
    async fn create_project(&self, project: &ProjectRef) -> anyhow::Result<ProjectInfo> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("server URL cannot be a base"))?
            .push("projects");
        let body = CreateProjectRequest {
            workspace: project.workspace(),
            name: project.name(),
        };
        let response = self.send(project, self.client.post(url).json(&body)).await?;
        let dto: ProjectInfoDto = response.json().await.map_err(Self::transport)?;
        dto.into_domain()
    }

    #[instrument(skip(self), fields(project = %project))]
    async fn project_info(&self, project: &ProjectRef) -> anyhow::Result<ProjectInfo> {
        let url = self.project_url(project, &[])?;
        let response = self.send(project, self.client.get(url)).await?;
        let dto: ProjectInfoDto = response.json().await.map_err(Self::transport)?;
        dto.into_domain()
    }

    #[instrument(skip(self), fields(project = %project, since = %since))]
    async fn versions_since(
        &self,
        project: &ProjectRef,
        since: VersionNumber,
    ) -> anyhow::Result<Vec<Version>> {
        let mut url = self.project_url(project, &["versions"])?;
        url.query_pairs_mut()
            .append_pair("since", &since.as_u64().to_string());
        let response = self.send(project, self.client.get(url)).await?;
        let body: VersionsResponse = response.json().await.map_err(Self::transport)?;
        debug!(count = body.versions.len(), "fetched versions");
        Ok(body.versions)
    }

    #[instrument(skip(self, diff, files), fields(project = %project, parent = %parent))]
    async fn commit(
        &self,
        project: &ProjectRef,
        parent: VersionNumber,
        diff: &ProjectDiff,
        files: &FilePayloads,
    ) -> anyhow::Result<Version> {
        let url = self.project_url(project, &["versions"])?;
        let encoded: BTreeMap<&str, String> = files
            .iter()
            .map(|(path, bytes)| (path.as_str(), BASE64.encode(bytes)))
            .collect();
        let body = CommitRequest {
            parent,
            author: &self.author,
            diff,
            files: encoded,
        };
        let result = self.send(project, self.client.post(url).json(&body)).await;
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                // attach the real parent version to VersionOutdated
                return Err(match err.downcast::<SyncError>() {
                    Ok(SyncError::VersionOutdated { latest, .. }) => {
                        anyhow::Error::new(SyncError::VersionOutdated { parent, latest })
                    }
                    Ok(other) => anyhow::Error::new(other),
                    Err(err) => err,
                });
            }
        };
        let version: Version = response.json().await.map_err(Self::transport)?;
        Ok(version)
    }

    #[instrument(skip(self), fields(project = %project, version = %version, path = %path))]
    async fn download_file(
        &self,
        project: &ProjectRef,
        version: VersionNumber,
        path: &RelPath,
    ) -> anyhow::Result<Vec<u8>> {
        let version_str = version.as_u64().to_string();
        let mut segments = vec!["files", version_str.as_str()];
        segments.extend(path.as_str().split('/'));
        let url = self.project_url(project, &segments)?;
        let response = self.send(project, self.client.get(url)).await?;
        let bytes = response.bytes().await.map_err(Self::transport)?;
        Ok(bytes.to_vec())
    }

    #[instrument(skip(self), fields(project = %project))]
    async fn delete_project(&self, project: &ProjectRef) -> anyhow::Result<()> {
        let url = self.project_url(project, &[])?;
        self.send(project, self.client.delete(url)).await?;
        Ok(())
    }
}
