//! GitHub client against a mock HTTP server

use chartrelay_core::{Chart, ChartKind, ChartManifest, PipelineConfig};
use chartrelay_repo::{
    CommitApi, CommitMessage, CommittableBranch, CreateCommitOnBranchInput, FileAddition,
    FileChanges, GitHubClient, IssueTracker, NewRelease, ReleaseApi, RepoError,
    ResolvedCredentials,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> GitHubClient {
    let yaml = format!(
        "repository:\n  owner: acme\n  name: charts\n\
         github:\n  apiUrl: {uri}\n  uploadsUrl: {uri}\n  graphqlUrl: {uri}/graphql\n",
        uri = server.uri()
    );
    let config = PipelineConfig::from_yaml(&yaml).unwrap();
    let token = ResolvedCredentials::Bearer {
        token: "s3cret".to_string(),
    };
    GitHubClient::new(&config, Some(token)).unwrap()
}

fn release_json(id: u64, tag: &str) -> serde_json::Value {
    json!({
        "id": id,
        "tag_name": tag,
        "name": tag,
        "draft": false,
        "prerelease": false,
        "published_at": "2024-05-01T12:00:00Z",
        "assets": []
    })
}

fn chart(name: &str) -> Chart {
    Chart {
        name: name.to_string(),
        kind: ChartKind::Application,
        version: "1.0.0".to_string(),
        directory: format!("application/{}", name).into(),
        metadata: ChartManifest {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            ..Default::default()
        },
        icon_file: None,
    }
}

#[tokio::test]
async fn test_missing_release_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/charts/releases/tags/nginx-1.0.0"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .expect(1)
        .mount(&server)
        .await;

    let release = client(&server).get_release_by_tag("nginx-1.0.0").await.unwrap();
    assert!(release.is_none());
}

#[tokio::test]
async fn test_existing_release_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/charts/releases/tags/nginx-1.0.0"))
        .and(header("authorization", "Bearer s3cret"))
        .and(header("accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json(42, "nginx-1.0.0")))
        .mount(&server)
        .await;

    let release = client(&server)
        .get_release_by_tag("nginx-1.0.0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(release.id, 42);
    assert!(release.timestamp().is_some());
}

#[tokio::test]
async fn test_list_releases_single_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/charts/releases"))
        .and(query_param("per_page", "100"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            release_json(1, "nginx-1.0.0"),
            release_json(2, "common-0.1.0")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let releases = client(&server).list_releases().await.unwrap();
    assert_eq!(releases.len(), 2);
}

#[tokio::test]
async fn test_create_release_and_upload_asset() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/charts/releases"))
        .and(body_partial_json(json!({"tag_name": "nginx-1.0.0", "body": "notes"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(release_json(7, "nginx-1.0.0")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/charts/releases/7/assets"))
        .and(query_param("name", "nginx-1.0.0.tgz"))
        .and(query_param("label", "application"))
        .and(header("content-type", "application/gzip"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 9,
            "name": "nginx-1.0.0.tgz",
            "label": "application",
            "size": 4,
            "url": format!("{}/repos/acme/charts/releases/assets/9", server.uri()),
            "browser_download_url": "https://github.com/acme/charts/releases/download/nginx-1.0.0/nginx-1.0.0.tgz"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let github = client(&server);
    let release = github
        .create_release(&NewRelease::new("nginx-1.0.0", "notes"))
        .await
        .unwrap();
    let asset = github
        .upload_asset(&release, "nginx-1.0.0.tgz", "application", b"data".to_vec())
        .await
        .unwrap();

    assert_eq!(asset.id, 9);
    assert_eq!(asset.label.as_deref(), Some("application"));
}

#[tokio::test]
async fn test_download_asset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/charts/releases/assets/9"))
        .and(header("accept", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive".to_vec()))
        .mount(&server)
        .await;

    let asset: chartrelay_repo::ReleaseAsset = serde_json::from_value(json!({
        "id": 9,
        "name": "nginx-1.0.0.tgz",
        "url": format!("{}/repos/acme/charts/releases/assets/9", server.uri()),
        "browser_download_url": "https://example.com/nginx-1.0.0.tgz"
    }))
    .unwrap();

    let data = client(&server).download_asset(&asset).await.unwrap();
    assert_eq!(data, b"archive");
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/charts/releases"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .create_release(&NewRelease::new("nginx-1.0.0", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::AuthFailed { message } if message == "Bad credentials"));
}

#[tokio::test]
async fn test_delete_missing_tag_is_ok() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/repos/acme/charts/git/refs/tags/nginx-1.0.0"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({"message": "Reference does not exist"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    client(&server).delete_tag("nginx-1.0.0").await.unwrap();
}

#[tokio::test]
async fn test_delete_package_falls_back_to_user() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(
            "/orgs/acme/packages/container/charts%2Fapplication%2Fnginx",
        ))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(
            "/user/packages/container/charts%2Fapplication%2Fnginx",
        ))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .delete_package("charts/application/nginx")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_closed_issues_skip_pull_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/charts/issues"))
        .and(query_param("state", "closed"))
        .and(query_param("labels", "nginx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"number": 3, "title": "Crash on start", "html_url": "https://github.com/acme/charts/issues/3"},
            {"number": 4, "title": "Bump", "html_url": "https://github.com/acme/charts/pull/4", "pull_request": {}}
        ])))
        .mount(&server)
        .await;

    let issues = client(&server).closed_issues(&chart("nginx")).await;
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].number, 3);
}

#[tokio::test]
async fn test_closed_issues_failure_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/charts/issues"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(client(&server).closed_issues(&chart("nginx")).await.is_empty());
}

fn commit_input() -> CreateCommitOnBranchInput {
    CreateCommitOnBranchInput {
        branch: CommittableBranch {
            repository_name_with_owner: "acme/charts".to_string(),
            branch_name: "main".to_string(),
        },
        expected_head_oid: "abc123".to_string(),
        file_changes: FileChanges {
            additions: vec![FileAddition::new("docs/index.yaml", b"apiVersion: v1\n")],
            deletions: vec![],
        },
        message: CommitMessage::parse("chore: update chart index"),
    }
}

#[tokio::test]
async fn test_signed_commit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "variables": {"input": {"expectedHeadOid": "abc123"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"createCommitOnBranch": {"commit": {"oid": "def456", "url": "https://github.com/acme/charts/commit/def456"}}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let commit = client(&server)
        .create_commit_on_branch(&commit_input())
        .await
        .unwrap();
    assert_eq!(commit.oid, "def456");
}

#[tokio::test]
async fn test_signed_commit_on_moved_branch_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "Expected branch to point to \"abc123\" but it did not"}]
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_commit_on_branch(&commit_input())
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::GraphQl { .. }));
}
