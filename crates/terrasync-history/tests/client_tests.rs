//! Integration tests for the versioning server client
//!
//! Uses wiremock to stand in for the remote service and exercises the
//! status-to-error mapping, version sequence validation, and commit flow.

use std::collections::BTreeMap;
use std::sync::Arc;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use terrasync_core::domain::diff::ProjectDiff;
use terrasync_core::domain::errors::SyncError;
use terrasync_core::domain::newtypes::{ProjectRef, RelPath, VersionNumber};
use terrasync_core::ports::remote_service::IRemoteService;
use terrasync_history::{HistoryClient, VersionLog};

fn project() -> ProjectRef {
    ProjectRef::new("survey", "rivers").unwrap()
}

async fn client(server: &MockServer) -> HistoryClient {
    HistoryClient::new(server.uri(), "test-token", "alice").unwrap()
}

fn version_json(n: u64) -> serde_json::Value {
    serde_json::json!({
        "number": n,
        "author": "bob",
        "created": "2026-02-07T12:00:00Z",
        "changes": { "files": {} }
    })
}

#[tokio::test]
async fn test_project_info_parses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/survey/rivers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "workspace": "survey",
            "name": "rivers",
            "version": 7,
            "permission": "editor"
        })))
        .mount(&server)
        .await;

    let info = client(&server).await.project_info(&project()).await.unwrap();
    assert_eq!(info.version, VersionNumber::new(7));
    assert!(info.permission.can_push());
}

#[tokio::test]
async fn test_versions_since_sends_query_and_parses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/survey/rivers/versions"))
        .and(query_param("since", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "versions": [version_json(6), version_json(7)]
        })))
        .mount(&server)
        .await;

    let versions = client(&server)
        .await
        .versions_since(&project(), VersionNumber::new(5))
        .await
        .unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].number(), VersionNumber::new(6));
    assert_eq!(versions[1].author(), "bob");
}

#[tokio::test]
async fn test_commit_conflict_maps_to_version_outdated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/projects/survey/rivers/versions"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(serde_json::json!({ "latest": 9 })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .commit(
            &project(),
            VersionNumber::new(7),
            &ProjectDiff::new(),
            &BTreeMap::new(),
        )
        .await
        .unwrap_err();

    match err.downcast_ref::<SyncError>() {
        Some(SyncError::VersionOutdated { parent, latest }) => {
            assert_eq!(*parent, VersionNumber::new(7));
            assert_eq!(*latest, VersionNumber::new(9));
        }
        other => panic!("expected VersionOutdated, got {other:?}"),
    }
}

#[tokio::test]
async fn test_forbidden_maps_to_permission_denied() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/projects/survey/rivers/versions"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .commit(
            &project(),
            VersionNumber::new(1),
            &ProjectDiff::new(),
            &BTreeMap::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::PermissionDenied { .. })
    ));
}

#[tokio::test]
async fn test_server_error_maps_to_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/survey/rivers"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).await.project_info(&project()).await.unwrap_err();
    let sync_err = err.downcast_ref::<SyncError>().expect("typed error");
    assert!(sync_err.is_transient());
}

#[tokio::test]
async fn test_commit_success_returns_new_version() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/projects/survey/rivers/versions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(version_json(8)))
        .mount(&server)
        .await;

    let mut files = BTreeMap::new();
    files.insert(RelPath::new("notes.txt").unwrap(), b"hello".to_vec());

    let version = client(&server)
        .await
        .commit(
            &project(),
            VersionNumber::new(7),
            &ProjectDiff::new(),
            &files,
        )
        .await
        .unwrap();
    assert_eq!(version.number(), VersionNumber::new(8));
}

#[tokio::test]
async fn test_download_file_hits_versioned_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/survey/rivers/files/3/data/rivers.gtab"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"content".to_vec()))
        .mount(&server)
        .await;

    let bytes = client(&server)
        .await
        .download_file(
            &project(),
            VersionNumber::new(3),
            &RelPath::new("data/rivers.gtab").unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(bytes, b"content");
}

#[tokio::test]
async fn test_version_log_rejects_gapped_sequence() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/survey/rivers/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "versions": [version_json(6), version_json(8)]
        })))
        .mount(&server)
        .await;

    let log = VersionLog::new(Arc::new(client(&server).await), project());
    let err = log.versions_since(VersionNumber::new(5)).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::HistoryGap { .. })
    ));
}

#[tokio::test]
async fn test_version_log_serves_cached_prefix() {
    let server = MockServer::start().await;
    // first call returns v6..v7; expect exactly one hit for since=5
    Mock::given(method("GET"))
        .and(path("/projects/survey/rivers/versions"))
        .and(query_param("since", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "versions": [version_json(6), version_json(7)]
        })))
        .expect(1)
        .mount(&server)
        .await;
    // the restarted pull only asks for what is beyond the cache
    Mock::given(method("GET"))
        .and(path("/projects/survey/rivers/versions"))
        .and(query_param("since", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "versions": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let log = VersionLog::new(Arc::new(client(&server).await), project());
    let first = log.versions_since(VersionNumber::new(5)).await.unwrap();
    assert_eq!(first.len(), 2);

    let second = log.versions_since(VersionNumber::new(5)).await.unwrap();
    assert_eq!(second.len(), 2);
}
