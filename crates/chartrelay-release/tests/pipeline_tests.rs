//! End-to-end pipeline runs against in-memory collaborators

use chartrelay_core::{ArtifactStore, ChangedFile, Chart, ChartKind, ChartRef, FsStore, PipelineConfig};
use chartrelay_release::mock::{MockPackagingTool, MockVcs, chart_archive};
use chartrelay_release::{Collaborators, ReleasePipeline, Stage};
use chartrelay_repo::mock::{MockCommitApi, MockIssueTracker, MockOciPublisher, MockReleaseApi};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const CONFIG: &str = r#"
repository:
  owner: acme
  name: charts
  url: https://github.com/acme/charts
  branch: main
packaging:
  concurrency: 2
"#;

struct Harness {
    dir: TempDir,
    releases: MockReleaseApi,
    packager: MockPackagingTool,
    vcs: MockVcs,
    commits: MockCommitApi,
    issues: MockIssueTracker,
    registry: Option<MockOciPublisher>,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            releases: MockReleaseApi::new(),
            packager: MockPackagingTool::new(),
            vcs: MockVcs::new("head-1"),
            commits: MockCommitApi::new(),
            issues: MockIssueTracker::new(),
            registry: None,
        }
    }

    fn store(&self) -> FsStore {
        FsStore::new(self.dir.path())
    }

    fn add_chart(&self, root: &str, name: &str, version: &str) {
        let manifest = format!(
            "apiVersion: v2\nname: {name}\nversion: {version}\ndescription: The {name} chart\n"
        );
        self.store()
            .write(
                &Path::new(root).join(name).join("Chart.yaml"),
                manifest.as_bytes(),
            )
            .unwrap();
    }

    fn pipeline(&self, yaml: &str) -> ReleasePipeline {
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        let collaborators = Collaborators {
            store: Arc::new(self.store()),
            vcs: Arc::new(self.vcs.clone()),
            packager: Arc::new(self.packager.clone()),
            releases: Arc::new(self.releases.clone()),
            issues: Arc::new(self.issues.clone()),
            commits: Arc::new(self.commits.clone()),
            registry: self
                .registry
                .clone()
                .map(|r| Arc::new(r) as Arc<dyn chartrelay_repo::OciPublisher>),
        };
        ReleasePipeline::new(config, collaborators).unwrap()
    }

    fn read(&self, path: &str) -> String {
        self.store().read_to_string(Path::new(path)).unwrap()
    }
}

fn touched(paths: &[&str]) -> Vec<ChangedFile> {
    paths.iter().map(|p| ChangedFile::modified(*p)).collect()
}

#[tokio::test]
async fn test_run_publishes_indexes_and_commits() {
    let h = Harness::new();
    h.add_chart("application", "nginx", "1.0.0");
    h.add_chart("library", "common", "0.1.0");
    let pipeline = h.pipeline(CONFIG);

    let report = pipeline
        .run(&touched(&[
            "application/nginx/values.yaml",
            "library/common/Chart.yaml",
        ]))
        .await
        .unwrap();

    assert_eq!(report.detected.application.len(), 1);
    assert_eq!(report.detected.library.len(), 1);
    assert_eq!(report.published.published, 2);
    assert_eq!(report.failed(), 0);

    let release = h
        .releases
        .releases()
        .into_iter()
        .find(|r| r.tag_name == "nginx-1.0.0")
        .unwrap();
    let asset = release.chart_asset().unwrap();
    assert_eq!(asset.name, "nginx-1.0.0.tgz");
    assert_eq!(asset.label.as_deref(), Some("application"));

    assert_eq!(report.index.indexed, 2);
    let index = h.read("docs/application/nginx/index.yaml");
    assert!(index.contains("nginx-1.0.0.tgz"));
    assert!(index.contains("version: 1.0.0"));

    let commit = report.commit.unwrap();
    assert_eq!(commit.oid, "commit-1");
    let request = &h.commits.requests()[0];
    assert_eq!(request.expected_head_oid, "head-1");
    assert_eq!(request.branch.branch_name, "main");
    assert_eq!(request.file_changes.additions.len(), 2);
}

#[tokio::test]
async fn test_second_run_creates_nothing() {
    let h = Harness::new();
    h.add_chart("application", "nginx", "1.0.0");
    h.add_chart("application", "redis", "2.0.0");
    let changed = touched(&["application/nginx/Chart.yaml", "application/redis/Chart.yaml"]);

    let pipeline = h.pipeline(CONFIG);
    let first = pipeline.run(&changed).await.unwrap();
    assert_eq!(first.published.published, 2);
    h.vcs.commit_staged();

    let creates = h.releases.operation_counts().creates;
    let uploads = h.releases.operation_counts().uploads;

    let second = pipeline.run(&changed).await.unwrap();
    assert_eq!(second.published.published, 0);
    assert_eq!(second.published.skipped, 2);
    assert!(second.commit.is_none());

    assert_eq!(h.releases.operation_counts().creates, creates);
    assert_eq!(h.releases.operation_counts().uploads, uploads);
    assert_eq!(h.releases.release_count(), 2);
    assert_eq!(h.commits.call_count(), 1);
}

#[tokio::test]
async fn test_failing_chart_does_not_block_others() {
    let h = Harness::new();
    for name in ["alpha", "beta", "gamma"] {
        h.add_chart("application", name, "1.0.0");
    }
    h.packager.fail_package("beta");
    let pipeline = h.pipeline(CONFIG);

    let charts: Vec<ChartRef> = ["alpha", "beta", "gamma"]
        .iter()
        .map(|n| ChartRef::new(ChartKind::Application, "application", *n))
        .collect();
    let summary = pipeline.package_and_publish(&charts).await.unwrap();

    assert_eq!(summary.published, 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.failures[0].chart, "beta");
    assert_eq!(summary.failures[0].stage, Stage::Package);
    assert_eq!(summary.packages.len(), 2);
    assert_eq!(h.releases.release_count(), 2);
}

#[tokio::test]
async fn test_invalid_manifest_is_isolated() {
    let h = Harness::new();
    h.add_chart("application", "nginx", "1.0.0");
    h.store()
        .write(Path::new("application/broken/Chart.yaml"), b"name: [")
        .unwrap();
    let pipeline = h.pipeline(CONFIG);

    let report = pipeline
        .run(&touched(&["application/nginx/Chart.yaml", "application/broken/Chart.yaml"]))
        .await
        .unwrap();

    assert_eq!(report.published.published, 1);
    assert_eq!(report.published.failures[0].stage, Stage::Manifest);
}

#[tokio::test]
async fn test_prerelease_version_is_rejected() {
    let mut h = Harness::new();
    h.registry = Some(MockOciPublisher::new());
    h.add_chart("application", "nginx", "1.0.0-rc.1");
    h.add_chart("application", "redis", "2.0.0");
    let pipeline = h.pipeline(&format!("{CONFIG}oci:\n  enabled: true\n  registry: ghcr.io/acme\n"));

    let report = pipeline
        .run(&touched(&["application/nginx/Chart.yaml", "application/redis/Chart.yaml"]))
        .await
        .unwrap();

    assert_eq!(report.published.published, 1);
    assert_eq!(report.published.failures.len(), 1);
    assert_eq!(report.published.failures[0].chart, "nginx");
    assert_eq!(report.published.failures[0].stage, Stage::Manifest);
    assert_eq!(h.packager.counts().packages, 1);

    let tags: Vec<String> = h.releases.releases().into_iter().map(|r| r.tag_name).collect();
    assert_eq!(tags, vec!["redis-2.0.0".to_string()]);
    assert_eq!(
        h.registry.as_ref().unwrap().pushed(),
        vec!["application/redis:2.0.0".to_string()]
    );
}

#[tokio::test]
async fn test_manifest_name_must_match_directory() {
    let h = Harness::new();
    h.store()
        .write(
            Path::new("application/web/Chart.yaml"),
            b"apiVersion: v2\nname: nginx\nversion: 1.0.0\n",
        )
        .unwrap();
    h.add_chart("application", "redis", "2.0.0");
    let pipeline = h.pipeline(CONFIG);

    let report = pipeline
        .run(&touched(&["application/web/Chart.yaml", "application/redis/Chart.yaml"]))
        .await
        .unwrap();

    assert_eq!(report.published.published, 1);
    assert_eq!(report.published.failures[0].chart, "web");
    assert_eq!(report.published.failures[0].stage, Stage::Manifest);
    assert_eq!(h.releases.release_count(), 1);
    assert!(h.releases.releases().iter().all(|r| r.tag_name != "nginx-1.0.0"));

    // every published release is indexed
    assert_eq!(report.index.indexed, 1);
    assert!(h.read("docs/application/redis/index.yaml").contains("redis-2.0.0.tgz"));
}

#[tokio::test]
async fn test_dependency_update_is_retried_once() {
    let h = Harness::new();
    h.add_chart("application", "nginx", "1.0.0");
    h.packager.fail_dependencies("nginx");
    let pipeline = h.pipeline(CONFIG);

    let chart = ChartRef::new(ChartKind::Application, "application", "nginx");
    let summary = pipeline.package_and_publish(&[chart]).await.unwrap();

    assert_eq!(summary.failures[0].stage, Stage::Dependencies);
    assert_eq!(h.packager.counts().dependency_updates, 2);
    assert_eq!(h.packager.counts().packages, 0);
    assert_eq!(h.releases.operation_counts().creates, 0);
}

#[tokio::test]
async fn test_upload_failure_rolls_back_release() {
    let h = Harness::new();
    h.add_chart("application", "nginx", "1.0.0");
    h.releases.fail_uploads_for("nginx-1.0.0");
    let pipeline = h.pipeline(CONFIG);

    let chart = ChartRef::new(ChartKind::Application, "application", "nginx");
    let summary = pipeline.package_and_publish(&[chart]).await.unwrap();

    assert_eq!(summary.failures[0].stage, Stage::UploadAsset);
    assert_eq!(h.releases.release_count(), 0);
    assert_eq!(h.releases.deleted_tags(), vec!["nginx-1.0.0".to_string()]);
}

#[tokio::test]
async fn test_release_notes_list_closed_issues() {
    let mut h = Harness::new();
    h.issues = MockIssueTracker::new().with_issue("nginx", 12, "Fix probes");
    h.add_chart("application", "nginx", "1.0.0");
    let pipeline = h.pipeline(CONFIG);

    let chart = ChartRef::new(ChartKind::Application, "application", "nginx");
    pipeline.package_and_publish(&[chart]).await.unwrap();

    let body = h.releases.releases()[0].body.clone().unwrap();
    assert!(body.contains("### Closed issues"));
    assert!(body.contains("#12"));
    assert_eq!(h.issues.call_count(), 1);
}

#[tokio::test]
async fn test_verify_existing_reports_drift() {
    let h = Harness::new();
    h.add_chart("application", "nginx", "1.0.0");
    h.add_chart("application", "redis", "1.0.0");

    let store = h.store();
    let redis = Chart::load(
        &store,
        &ChartRef::new(ChartKind::Application, "application", "redis"),
        "Chart.yaml",
    )
    .unwrap();
    h.releases
        .add_release("nginx-1.0.0", "nginx-1.0.0.tgz", b"published elsewhere");
    h.releases
        .add_release("redis-1.0.0", "redis-1.0.0.tgz", &chart_archive(&redis).unwrap());

    let pipeline = h.pipeline(&format!("{CONFIG}release:\n  verifyExisting: true\n"));
    let charts = [
        ChartRef::new(ChartKind::Application, "application", "nginx"),
        ChartRef::new(ChartKind::Application, "application", "redis"),
    ];
    let summary = pipeline.package_and_publish(&charts).await.unwrap();

    assert_eq!(summary.drifted, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.published, 0);
    assert_eq!(h.releases.operation_counts().creates, 0);
}

#[tokio::test]
async fn test_index_is_deterministic() {
    let h = Harness::new();
    h.add_chart("application", "nginx", "1.1.0");
    let pipeline = h.pipeline(CONFIG);

    let store = h.store();
    let chart = Chart::load(
        &store,
        &ChartRef::new(ChartKind::Application, "application", "nginx"),
        "Chart.yaml",
    )
    .unwrap();
    h.releases
        .add_release("nginx-1.1.0", "nginx-1.1.0.tgz", &chart_archive(&chart).unwrap());
    h.releases.add_release(
        "nginx-1.0.0",
        "nginx-1.0.0.tgz",
        &release_archive("nginx", "1.0.0"),
    );

    pipeline.regenerate_index().await.unwrap();
    let first = h.read("docs/application/nginx/index.yaml");
    pipeline.regenerate_index().await.unwrap();
    let second = h.read("docs/application/nginx/index.yaml");

    assert_eq!(first, second);
    let newest = first.find("version: 1.1.0").unwrap();
    let oldest = first.find("version: 1.0.0").unwrap();
    assert!(newest < oldest);
}

#[tokio::test]
async fn test_index_ignores_other_charts_sharing_a_prefix() {
    let h = Harness::new();
    h.add_chart("application", "nginx", "1.0.0");
    h.add_chart("application", "nginx-ingress", "4.0.0");
    h.releases.add_release(
        "nginx-1.0.0",
        "nginx-1.0.0.tgz",
        &release_archive("nginx", "1.0.0"),
    );
    h.releases.add_release(
        "nginx-ingress-4.0.0",
        "nginx-ingress-4.0.0.tgz",
        &release_archive("nginx-ingress", "4.0.0"),
    );
    let pipeline = h.pipeline(CONFIG);

    let summary = pipeline.regenerate_index().await.unwrap();
    assert_eq!(summary.indexed, 2);

    let index = h.read("docs/application/nginx/index.yaml");
    assert!(!index.contains("nginx-ingress"));
}

#[tokio::test]
async fn test_redirect_written_only_with_docs_url() {
    let h = Harness::new();
    h.add_chart("application", "nginx", "1.0.0");

    let without = h.pipeline(CONFIG);
    without.regenerate_index().await.unwrap();
    assert!(!h.dir.path().join("docs/application/nginx/index.html").exists());

    let with = h.pipeline(&format!("{CONFIG}pages:\n  docsUrl: https://docs.acme.dev/charts\n"));
    let summary = with.regenerate_index().await.unwrap();
    assert_eq!(summary.skipped, 1);
    let html = h.read("docs/application/nginx/index.html");
    assert!(html.contains("https://docs.acme.dev/charts/application/nginx"));
}

#[tokio::test]
async fn test_deleted_chart_removes_releases_and_registry_package() {
    let mut h = Harness::new();
    h.registry = Some(MockOciPublisher::new());
    h.add_chart("application", "nginx", "1.0.0");
    h.releases.add_release("old-1.0.0", "old-1.0.0.tgz", b"a");
    h.releases.add_release("old-1.1.0", "old-1.1.0.tgz", b"b");
    h.releases.add_release("old-tools-1.0.0", "old-tools-1.0.0.tgz", b"c");
    h.releases.add_release(
        "nginx-1.0.0",
        "nginx-1.0.0.tgz",
        &release_archive("nginx", "1.0.0"),
    );
    let pipeline = h.pipeline(&format!("{CONFIG}oci:\n  enabled: true\n  registry: ghcr.io/acme\n"));

    let changed = vec![
        ChangedFile::removed("application/old/Chart.yaml"),
        ChangedFile::removed("application/old/values.yaml"),
    ];
    let detected = pipeline.detect_changes(&changed);
    assert_eq!(detected.deleted.len(), 1);
    assert_eq!(detected.total(), 0);

    let summary = pipeline.delete_charts(&detected.deleted).await.unwrap();
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.releases, 2);

    let tags: Vec<String> = h.releases.releases().into_iter().map(|r| r.tag_name).collect();
    assert!(tags.contains(&"old-tools-1.0.0".to_string()));
    assert!(tags.contains(&"nginx-1.0.0".to_string()));
    assert_eq!(h.releases.deleted_tags().len(), 2);

    let registry = h.registry.as_ref().unwrap();
    assert_eq!(registry.deleted()[0].name, "old");
}

#[tokio::test]
async fn test_registry_skipped_when_login_fails() {
    let mut h = Harness::new();
    h.registry = Some(MockOciPublisher::unauthenticated());
    h.add_chart("application", "nginx", "1.0.0");
    let pipeline = h.pipeline(&format!("{CONFIG}oci:\n  enabled: true\n  registry: ghcr.io/acme\n"));

    let report = pipeline
        .run(&touched(&["application/nginx/Chart.yaml"]))
        .await
        .unwrap();

    assert_eq!(report.published.published, 1);
    assert!(report.registry.unauthenticated);
    assert_eq!(report.registry.pushed, 0);
    assert_eq!(report.failed(), 0);
    assert!(h.registry.as_ref().unwrap().pushed().is_empty());
}

#[tokio::test]
async fn test_registry_pushes_only_changed_charts() {
    let mut h = Harness::new();
    h.registry = Some(MockOciPublisher::new().with_present("application/redis:1.0.0"));
    h.add_chart("application", "nginx", "1.0.0");
    h.add_chart("application", "redis", "1.0.0");
    h.add_chart("application", "untouched", "1.0.0");
    let pipeline = h.pipeline(&format!("{CONFIG}oci:\n  enabled: true\n  registry: ghcr.io/acme\n"));

    let report = pipeline
        .run(&touched(&["application/nginx/Chart.yaml", "application/redis/Chart.yaml"]))
        .await
        .unwrap();

    assert_eq!(report.registry.pushed, 1);
    assert_eq!(report.registry.skipped, 1);
    assert_eq!(
        h.registry.as_ref().unwrap().pushed(),
        vec!["application/nginx:1.0.0".to_string()]
    );
}

#[tokio::test]
async fn test_registry_login_uses_library_scope_for_library_pushes() {
    let mut h = Harness::new();
    h.registry = Some(MockOciPublisher::new());
    h.add_chart("library", "common", "0.1.0");
    let pipeline = h.pipeline(&format!("{CONFIG}oci:\n  enabled: true\n  registry: ghcr.io/acme\n"));

    let report = pipeline
        .run(&touched(&["library/common/Chart.yaml"]))
        .await
        .unwrap();

    let registry = h.registry.as_ref().unwrap();
    assert_eq!(report.registry.pushed, 1);
    assert_eq!(registry.auth_scopes(), vec!["library/common".to_string()]);
    assert_eq!(registry.pushed(), vec!["library/common:0.1.0".to_string()]);
}

#[tokio::test]
async fn test_registry_disabled_by_config() {
    let mut h = Harness::new();
    h.registry = Some(MockOciPublisher::new());
    h.add_chart("application", "nginx", "1.0.0");
    let pipeline = h.pipeline(CONFIG);

    let chart = ChartRef::new(ChartKind::Application, "application", "nginx");
    let summary = pipeline.publish_to_registry(&[chart]).await.unwrap();
    assert!(summary.disabled);
    assert!(h.registry.as_ref().unwrap().pushed().is_empty());
}

#[tokio::test]
async fn test_commit_of_unchanged_files_is_noop() {
    let h = Harness::new();
    let pipeline = h.pipeline(CONFIG);
    h.vcs.commit_staged();

    let commit = pipeline
        .commit_generated("main", &[], "chore: nothing")
        .await
        .unwrap();
    assert!(commit.is_none());
    assert_eq!(h.commits.call_count(), 0);
    assert_eq!(h.vcs.stage_calls(), 1);
}

#[tokio::test]
async fn test_commit_leaves_out_unrelated_staged_files() {
    let h = Harness::new();
    h.add_chart("application", "nginx", "1.0.0");
    h.store()
        .write(Path::new("notes/draft.md"), b"work in progress")
        .unwrap();
    h.vcs.stage_externally("notes/draft.md");
    let pipeline = h.pipeline(CONFIG);

    let report = pipeline
        .run(&touched(&["application/nginx/Chart.yaml"]))
        .await
        .unwrap();
    assert!(report.commit.is_some());

    let request = &h.commits.requests()[0];
    let paths: Vec<&str> = request
        .file_changes
        .additions
        .iter()
        .map(|a| a.path.as_str())
        .collect();
    assert_eq!(paths, vec!["docs/application/nginx/index.yaml"]);
    assert!(request.file_changes.deletions.is_empty());
}

#[tokio::test]
async fn test_commit_failure_is_fatal() {
    let h = Harness::new();
    h.add_chart("application", "nginx", "1.0.0");
    h.commits.fail_with("expected head oid did not match");
    let pipeline = h.pipeline(CONFIG);

    let result = pipeline
        .run(&touched(&["application/nginx/Chart.yaml"]))
        .await;
    assert!(result.is_err());
    assert_eq!(h.releases.release_count(), 1);
}

/// Archive of a released version that is no longer in the working tree
fn release_archive(name: &str, version: &str) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let manifest = format!("apiVersion: v2\nname: {name}\nversion: {version}\n");
    store
        .write(&Path::new("application").join(name).join("Chart.yaml"), manifest.as_bytes())
        .unwrap();
    let chart = Chart::load(
        &store,
        &ChartRef::new(ChartKind::Application, "application", name),
        "Chart.yaml",
    )
    .unwrap();
    chart_archive(&chart).unwrap()
}
