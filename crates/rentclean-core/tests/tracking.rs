use std::fs;
use std::path::Path;

use bytes::Bytes;
use rentclean_core::error::TrackingError;
use rentclean_core::object_store::ObjectStore;
use rentclean_core::tracking::{
    Artifact, ArtifactManifest, LatestPointer, Run, RunRecord, RunStatus, Version,
};

const PROJECT: &str = "nyc_airbnb";

struct Harness {
    _dir: tempfile::TempDir,
    store: ObjectStore,
    cache: std::path::PathBuf,
    work: std::path::PathBuf,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ObjectStore::local(dir.path().join("store"), PROJECT);
        let cache = dir.path().join("cache");
        let work = dir.path().join("work");
        fs::create_dir_all(&work).expect("work dir");
        Self {
            _dir: dir,
            store,
            cache,
            work,
        }
    }

    async fn run(&self) -> Run {
        Run::init(self.store.clone(), &self.cache, "test_job", "abc123")
            .await
            .expect("run init")
    }

    fn write(&self, name: &str, contents: &str) -> std::path::PathBuf {
        let path = self.work.join(name);
        fs::write(&path, contents).expect("write work file");
        path
    }

    async fn publish(&self, name: &str, contents: &str) -> ArtifactManifest {
        let mut run = self.run().await;
        let mut artifact = Artifact::new(name, "raw_data", "test upload").unwrap();
        artifact.add_file(self.write(name, contents));
        let manifest = run
            .log_artifact(artifact)
            .await
            .expect("log artifact")
            .wait()
            .await
            .expect("upload");
        run.finish(RunStatus::Success).await.expect("finish");
        manifest
    }
}

fn read_text(path: &Path) -> String {
    fs::read_to_string(path).expect("read fetched file")
}

#[tokio::test]
async fn publish_then_fetch_latest() -> Result<(), TrackingError> {
    let h = Harness::new();
    let manifest = h.publish("sample.csv", "price\n1\n").await;

    assert_eq!(manifest.version, Version(0));
    assert_eq!(manifest.reference(), "sample.csv:v0");
    assert_eq!(manifest.artifact_type, "raw_data");
    assert_eq!(manifest.files.len(), 1);
    assert_eq!(manifest.files[0].size, 8);

    let mut run = h.run().await;
    let path = run.use_artifact("sample.csv").await?;
    assert_eq!(read_text(&path), "price\n1\n");
    assert!(path.starts_with(&h.cache));
    assert_eq!(run.record().used_artifacts, vec!["sample.csv:v0".to_string()]);
    Ok(())
}

#[tokio::test]
async fn new_content_gets_next_version_and_same_content_is_reused() {
    let h = Harness::new();

    let v0 = h.publish("clean.csv", "price\n1\n").await;
    let v1 = h.publish("clean.csv", "price\n2\n").await;
    let again = h.publish("clean.csv", "price\n2\n").await;

    assert_eq!(v0.version, Version(0));
    assert_eq!(v1.version, Version(1));
    assert_eq!(again.version, Version(1));
    assert_eq!(again.created_by, v1.created_by);

    let latest: LatestPointer = h
        .store
        .get_json(&h.store.latest_key("clean.csv"))
        .await
        .unwrap()
        .expect("latest pointer");
    assert_eq!(latest.version, Version(1));

    let mut run = h.run().await;
    let pinned = run.use_artifact("clean.csv:v0").await.unwrap();
    assert_eq!(read_text(&pinned), "price\n1\n");
    let latest_path = run.use_artifact("clean.csv:latest").await.unwrap();
    assert_eq!(read_text(&latest_path), "price\n2\n");
}

#[tokio::test]
async fn unknown_artifacts_are_not_found() {
    let h = Harness::new();
    let mut run = h.run().await;

    let err = run.use_artifact("missing.csv").await.unwrap_err();
    assert!(matches!(err, TrackingError::ArtifactNotFound(_)), "{err}");

    h.publish("sample.csv", "price\n1\n").await;
    let err = run.use_artifact("sample.csv:v7").await.unwrap_err();
    assert!(matches!(err, TrackingError::ArtifactNotFound(ref r) if r == "sample.csv:v7"));
}

#[tokio::test]
async fn tampered_content_is_rejected() {
    let h = Harness::new();
    let manifest = h.publish("sample.csv", "price\n1\n").await;

    let key = h
        .store
        .artifact_file_key("sample.csv", manifest.version, "sample.csv");
    h.store
        .put_object(&key, Bytes::from_static(b"price\n999\n"), "text/csv")
        .await
        .unwrap();

    let mut run = h.run().await;
    let err = run.use_artifact("sample.csv").await.unwrap_err();
    assert!(matches!(err, TrackingError::DigestMismatch { .. }), "{err}");
    assert!(run.record().used_artifacts.is_empty());
}

#[tokio::test]
async fn stale_cache_entries_are_refreshed() {
    let h = Harness::new();
    h.publish("sample.csv", "price\n1\n").await;

    let mut run = h.run().await;
    let path = run.use_artifact("sample.csv").await.unwrap();
    fs::write(&path, "corrupted").unwrap();

    let path = run.use_artifact("sample.csv").await.unwrap();
    assert_eq!(read_text(&path), "price\n1\n");
}

#[tokio::test]
async fn multi_file_artifacts_cannot_be_fetched_as_one_file() {
    let h = Harness::new();
    let mut run = h.run().await;
    let mut artifact = Artifact::new("bundle", "raw_data", "two files").unwrap();
    artifact
        .add_file(h.write("a.csv", "x\n1\n"))
        .add_file(h.write("b.csv", "x\n2\n"));
    let manifest = run.log_artifact(artifact).await.unwrap().wait().await.unwrap();
    assert_eq!(manifest.files.len(), 2);

    let err = run.use_artifact("bundle").await.unwrap_err();
    assert!(matches!(err, TrackingError::NotSingleFile { count: 2, .. }), "{err}");
}

#[tokio::test]
async fn invalid_artifacts_are_rejected() {
    let h = Harness::new();
    let mut run = h.run().await;

    assert!(Artifact::new("../escape.csv", "t", "d").is_err());
    assert!(Artifact::new("nested/name.csv", "t", "d").is_err());

    let empty = Artifact::new("empty.csv", "t", "d").unwrap();
    assert!(matches!(
        run.log_artifact(empty).await.unwrap_err(),
        TrackingError::EmptyArtifact(_)
    ));

    let first = h.write("dup.csv", "x\n");
    let mut dup = Artifact::new("dup", "t", "d").unwrap();
    dup.add_file(&first).add_file(&first);
    assert!(matches!(
        run.log_artifact(dup).await.unwrap_err(),
        TrackingError::DuplicateFile { .. }
    ));
}

#[tokio::test]
async fn run_record_tracks_lineage_and_config() {
    let h = Harness::new();
    h.publish("sample.csv", "price\n1\n").await;

    let mut run = h.run().await;
    let run_id = run.id();

    let running: RunRecord = h
        .store
        .get_json(&h.store.run_key(&run_id))
        .await
        .unwrap()
        .expect("record written at init");
    assert_eq!(running.status, RunStatus::Running);
    assert!(running.finished_at.is_none());

    run.update_config(&serde_json::json!({"min_price": 10.0}))
        .unwrap();
    run.update_config(&serde_json::json!({"max_price": 350.0}))
        .unwrap();
    run.use_artifact("sample.csv").await.unwrap();

    let mut artifact = Artifact::new("clean.csv", "clean_sample", "cleaned").unwrap();
    artifact.add_file(h.write("clean.csv", "price\n1\n"));
    run.log_artifact(artifact).await.unwrap().wait().await.unwrap();

    let finished = run.finish(RunStatus::Success).await.unwrap();
    let stored: RunRecord = h
        .store
        .get_json(&h.store.run_key(&run_id))
        .await
        .unwrap()
        .expect("record");

    assert_eq!(stored, finished);
    assert_eq!(stored.project, PROJECT);
    assert_eq!(stored.job_type, "test_job");
    assert_eq!(stored.git_commit, "abc123");
    assert_eq!(stored.status, RunStatus::Success);
    assert!(stored.finished_at.is_some());
    assert_eq!(stored.used_artifacts, vec!["sample.csv:v0".to_string()]);
    assert_eq!(stored.logged_artifacts, vec!["clean.csv:v0".to_string()]);
    assert_eq!(stored.config["min_price"], 10.0);
    assert_eq!(stored.config["max_price"], 350.0);

    let manifest: ArtifactManifest = h
        .store
        .get_json(&h.store.manifest_key("clean.csv", Version(0)))
        .await
        .unwrap()
        .expect("manifest");
    assert_eq!(manifest.created_by, Some(run_id));
    assert_eq!(manifest.description, "cleaned");
}

#[tokio::test]
async fn manifests_with_unsafe_names_are_rejected() {
    let h = Harness::new();
    let published = h.publish("sample.csv", "price\n1\n").await;
    let key = h.store.manifest_key("sample.csv", published.version);

    let mut escaping_file = published.clone();
    escaping_file.files[0].name = "../../evil.csv".into();
    h.store.put_json(&key, &escaping_file).await.unwrap();

    let mut run = h.run().await;
    let err = run.use_artifact("sample.csv").await.unwrap_err();
    assert!(matches!(err, TrackingError::CorruptManifest { .. }), "{err}");

    let mut escaping_name = published.clone();
    escaping_name.name = "../../x".into();
    h.store.put_json(&key, &escaping_name).await.unwrap();

    let err = run.use_artifact("sample.csv:v0").await.unwrap_err();
    assert!(matches!(err, TrackingError::CorruptManifest { .. }), "{err}");

    assert!(run.record().used_artifacts.is_empty());
    assert!(!h.cache.join("evil.csv").exists());
    assert!(!h.cache.parent().unwrap().join("evil.csv").exists());
    assert!(!h.cache.parent().unwrap().join("x").exists());
}
