//! Change detection against a real working tree

use chartrelay_core::{
    ChangeDetector, ChangedFile, ChartKind, ChartRef, FileStatus, FsStore, PipelineConfig,
};
use std::path::Path;

fn write_chart(root: &Path, dir: &str, name: &str) {
    let chart_dir = root.join(dir);
    std::fs::create_dir_all(&chart_dir).unwrap();
    std::fs::write(
        chart_dir.join("Chart.yaml"),
        format!("apiVersion: v2\nname: {}\nversion: 1.0.0\n", name),
    )
    .unwrap();
    std::fs::write(chart_dir.join("values.yaml"), "{}\n").unwrap();
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_chart(dir.path(), "application/nginx", "nginx");
    write_chart(dir.path(), "application/my-app", "my-app");
    write_chart(dir.path(), "library/common", "common");
    std::fs::create_dir_all(dir.path().join("application/scratch")).unwrap();
    std::fs::write(dir.path().join("application/scratch/notes.txt"), "x").unwrap();
    dir
}

#[test]
fn test_detects_one_chart_per_kind() {
    let dir = fixture();
    let store = FsStore::new(dir.path());
    let config = PipelineConfig::default();
    let detector = ChangeDetector::new(&store, &config);

    let detected =
        detector.detect_paths(&["application/nginx/Chart.yaml", "library/common/values.yaml"]);

    assert_eq!(
        detected.application,
        vec![ChartRef::new(ChartKind::Application, "application", "nginx")]
    );
    assert_eq!(
        detected.library,
        vec![ChartRef::new(ChartKind::Library, "library", "common")]
    );
    assert!(detected.deleted.is_empty());
    assert_eq!(detected.total(), 2);
}

#[test]
fn test_deduplicates_and_ignores_non_charts() {
    let dir = fixture();
    let store = FsStore::new(dir.path());
    let config = PipelineConfig::default();
    let detector = ChangeDetector::new(&store, &config);

    let detected = detector.detect_paths(&[
        "application/my-app/templates/deployment.yaml",
        "application/my-app/values.yaml",
        "application/scratch/notes.txt",
        "application/README.md",
        "docs/index.md",
        "library/missing/values.yaml",
    ]);

    assert_eq!(detected.application.len(), 1);
    assert_eq!(detected.application[0].name, "my-app");
    assert!(detected.library.is_empty());
    assert_eq!(detected.total(), 1);
}

#[test]
fn test_removed_manifest_routes_to_deleted() {
    let dir = fixture();
    let store = FsStore::new(dir.path());
    let config = PipelineConfig::default();
    let detector = ChangeDetector::new(&store, &config);

    // application/legacy no longer exists on disk
    let detected = detector.detect(&[
        ChangedFile::removed("application/legacy/Chart.yaml"),
        ChangedFile::removed("application/legacy/values.yaml"),
        ChangedFile::new("application/nginx/values.yaml", FileStatus::Modified),
    ]);

    assert_eq!(
        detected.deleted,
        vec![ChartRef::new(ChartKind::Application, "application", "legacy")]
    );
    assert_eq!(detected.application.len(), 1);
    assert_eq!(detected.application[0].name, "nginx");
    assert_eq!(detected.total(), 1);
}

#[test]
fn test_custom_roots() {
    let dir = tempfile::tempdir().unwrap();
    write_chart(dir.path(), "charts/apps/web", "web");
    let store = FsStore::new(dir.path());
    let config = PipelineConfig::from_yaml(
        "charts:\n  application: charts/apps\n  library: charts/lib\n",
    )
    .unwrap();
    let detector = ChangeDetector::new(&store, &config);

    let detected = detector.detect_paths(&["charts/apps/web/Chart.yaml"]);
    assert_eq!(detected.application.len(), 1);
    assert_eq!(
        detected.application[0].directory,
        Path::new("charts/apps/web")
    );
}
