use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::TrackingError;
use crate::object_store::ObjectStore;
use crate::tracking::artifact::file_name;
use crate::tracking::{
    aggregate_digest, validate_artifact_name, Artifact, ArtifactManifest, ArtifactRef,
    LatestPointer, ManifestEntry, Version, VersionSelector,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed { message: String },
}

/// Provenance record stored under `runs/<run_id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub project: String,
    pub job_type: String,
    pub git_commit: String,
    pub config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub used_artifacts: Vec<String>,
    pub logged_artifacts: Vec<String>,
}

/// One tracked execution of a job.
#[derive(Debug)]
pub struct Run {
    store: ObjectStore,
    cache_dir: PathBuf,
    record: RunRecord,
}

impl Run {
    /// Start a run and persist its record in the `running` state.
    pub async fn init(
        store: ObjectStore,
        cache_dir: impl Into<PathBuf>,
        job_type: &str,
        git_commit: &str,
    ) -> Result<Self, TrackingError> {
        let record = RunRecord {
            run_id: Uuid::new_v4(),
            project: store.project().to_string(),
            job_type: job_type.to_string(),
            git_commit: git_commit.to_string(),
            config: Value::Object(Map::new()),
            summary: None,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            used_artifacts: Vec::new(),
            logged_artifacts: Vec::new(),
        };

        let run = Self {
            store,
            cache_dir: cache_dir.into(),
            record,
        };
        run.persist().await?;
        info!(run_id = %run.id(), job_type, "run started");
        Ok(run)
    }

    pub fn id(&self) -> Uuid {
        self.record.run_id
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Merge the serialized fields of `config` into the run config.
    pub fn update_config<T: Serialize>(&mut self, config: &T) -> Result<(), TrackingError> {
        merge_object(&mut self.record.config, serde_json::to_value(config)?);
        Ok(())
    }

    pub fn set_summary<T: Serialize>(&mut self, summary: &T) -> Result<(), TrackingError> {
        self.record.summary = Some(serde_json::to_value(summary)?);
        Ok(())
    }

    /// Resolve `reference`, download its single file into the cache and record
    /// it as an input of this run.
    pub async fn use_artifact(&mut self, reference: &str) -> Result<PathBuf, TrackingError> {
        let reference = ArtifactRef::parse(reference)?;
        let manifest = self.resolve(&reference).await?;
        let entry = manifest.single_file()?;

        let local_path = self
            .cache_dir
            .join(&manifest.name)
            .join(manifest.version.to_string())
            .join(&entry.name);

        if cached_digest(&local_path).await?.as_deref() == Some(entry.digest.as_str()) {
            debug!(path = %local_path.display(), "artifact cache hit");
        } else {
            let key = self
                .store
                .artifact_file_key(&manifest.name, manifest.version, &entry.name);
            let body = self.store.get_object(&key).await?;

            let actual = blake3::hash(&body).to_hex().to_string();
            if actual != entry.digest {
                return Err(TrackingError::DigestMismatch {
                    file: key,
                    expected: entry.digest.clone(),
                    actual,
                });
            }

            write_file(&local_path, &body).await?;
            debug!(key, path = %local_path.display(), "artifact file downloaded");
        }

        info!(artifact = %manifest.reference(), path = %local_path.display(), "using artifact");
        self.record.used_artifacts.push(manifest.reference());
        Ok(local_path)
    }

    /// Register a new version of `artifact` and start uploading its files.
    /// Content identical to the latest version reuses that version.
    pub async fn log_artifact(&mut self, artifact: Artifact) -> Result<UploadHandle, TrackingError> {
        if artifact.files().is_empty() {
            return Err(TrackingError::EmptyArtifact(artifact.name().to_string()));
        }

        let mut seen = HashSet::new();
        let mut payloads = Vec::with_capacity(artifact.files().len());
        for path in artifact.files() {
            let name = file_name(path)?;
            if !seen.insert(name.clone()) {
                return Err(TrackingError::DuplicateFile {
                    artifact: artifact.name().to_string(),
                    file: name,
                });
            }

            let body = fs::read(path).await.map_err(|source| TrackingError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let entry = ManifestEntry {
                name,
                digest: blake3::hash(&body).to_hex().to_string(),
                size: body.len() as u64,
            };
            payloads.push((entry, Bytes::from(body)));
        }

        let entries: Vec<ManifestEntry> = payloads.iter().map(|(entry, _)| entry.clone()).collect();
        let digest = aggregate_digest(&entries);

        let latest: Option<LatestPointer> = self
            .store
            .get_json(&self.store.latest_key(artifact.name()))
            .await?;

        let version = match latest {
            Some(pointer) if pointer.digest == digest => {
                let manifest = self.load_manifest(artifact.name(), pointer.version).await?;
                info!(
                    artifact = %manifest.reference(),
                    "content unchanged; reusing existing version"
                );
                self.record.logged_artifacts.push(manifest.reference());
                return Ok(UploadHandle::ready(manifest));
            }
            Some(pointer) => pointer.version.next(),
            None => Version(0),
        };

        let manifest = ArtifactManifest {
            name: artifact.name().to_string(),
            version,
            artifact_type: artifact.artifact_type().to_string(),
            description: artifact.description().to_string(),
            files: entries,
            digest,
            created_by: Some(self.id()),
            created_at: Utc::now(),
        };

        info!(artifact = %manifest.reference(), "logging artifact");
        self.record.logged_artifacts.push(manifest.reference());

        let task = tokio::spawn(upload(self.store.clone(), manifest.clone(), payloads));
        Ok(UploadHandle {
            manifest,
            task: Some(task),
        })
    }

    /// Stamp the final status and persist the run record.
    pub async fn finish(mut self, status: RunStatus) -> Result<RunRecord, TrackingError> {
        self.record.status = status;
        self.record.finished_at = Some(Utc::now());
        self.persist().await?;
        info!(run_id = %self.id(), status = ?self.record.status, "run finished");
        Ok(self.record)
    }

    async fn persist(&self) -> Result<(), TrackingError> {
        self.store
            .put_json(&self.store.run_key(&self.record.run_id), &self.record)
            .await
    }

    async fn resolve(&self, reference: &ArtifactRef) -> Result<ArtifactManifest, TrackingError> {
        let version = match reference.selector {
            VersionSelector::Exact(version) => version,
            VersionSelector::Latest => {
                let pointer: LatestPointer = self
                    .store
                    .get_json(&self.store.latest_key(&reference.name))
                    .await?
                    .ok_or_else(|| TrackingError::ArtifactNotFound(reference.to_string()))?;
                pointer.version
            }
        };
        self.load_manifest(&reference.name, version).await
    }

    async fn load_manifest(
        &self,
        name: &str,
        version: Version,
    ) -> Result<ArtifactManifest, TrackingError> {
        let key = self.store.manifest_key(name, version);
        let manifest: ArtifactManifest = self
            .store
            .get_json(&key)
            .await?
            .ok_or_else(|| TrackingError::ArtifactNotFound(format!("{name}:{version}")))?;

        check_manifest(&manifest, name, version).map_err(|reason| TrackingError::CorruptManifest {
            key,
            reason: reason.to_string(),
        })?;
        Ok(manifest)
    }
}

/// Manifest names end up in cache paths, so they must match what was asked
/// for and stay single path components.
fn check_manifest(
    manifest: &ArtifactManifest,
    name: &str,
    version: Version,
) -> Result<(), &'static str> {
    validate_artifact_name(&manifest.name)?;
    if manifest.name != name || manifest.version != version {
        return Err("manifest does not describe the requested version");
    }

    for entry in &manifest.files {
        let mut components = Path::new(&entry.name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == entry.name.as_str() => {}
            _ => return Err("file entry is not a plain file name"),
        }
    }
    Ok(())
}

/// Completion handle for a logged artifact.
#[derive(Debug)]
pub struct UploadHandle {
    manifest: ArtifactManifest,
    task: Option<JoinHandle<Result<(), TrackingError>>>,
}

impl UploadHandle {
    fn ready(manifest: ArtifactManifest) -> Self {
        Self {
            manifest,
            task: None,
        }
    }

    pub fn manifest(&self) -> &ArtifactManifest {
        &self.manifest
    }

    /// Block until every file, the manifest and the latest pointer are stored.
    pub async fn wait(self) -> Result<ArtifactManifest, TrackingError> {
        if let Some(task) = self.task {
            task.await
                .map_err(|err| TrackingError::UploadTask(err.to_string()))??;
        }
        Ok(self.manifest)
    }
}

// Files first, then the manifest, then the pointer: anything reachable from
// `latest.json` is complete.
async fn upload(
    store: ObjectStore,
    manifest: ArtifactManifest,
    payloads: Vec<(ManifestEntry, Bytes)>,
) -> Result<(), TrackingError> {
    for (entry, body) in payloads {
        let key = store.artifact_file_key(&manifest.name, manifest.version, &entry.name);
        store
            .put_object(&key, body, content_type_for(&entry.name))
            .await?;
    }

    store
        .put_json(
            &store.manifest_key(&manifest.name, manifest.version),
            &manifest,
        )
        .await?;
    store
        .put_json(
            &store.latest_key(&manifest.name),
            &LatestPointer {
                version: manifest.version,
                digest: manifest.digest.clone(),
            },
        )
        .await?;

    debug!(artifact = %manifest.reference(), "upload complete");
    Ok(())
}

fn content_type_for(file_name: &str) -> &'static str {
    if file_name.ends_with(".csv") {
        "text/csv"
    } else if file_name.ends_with(".json") {
        "application/json"
    } else {
        "application/octet-stream"
    }
}

fn merge_object(target: &mut Value, update: Value) {
    match (target, update) {
        (Value::Object(existing), Value::Object(fields)) => existing.extend(fields),
        (target, update) => *target = update,
    }
}

async fn cached_digest(path: &Path) -> Result<Option<String>, TrackingError> {
    match fs::read(path).await {
        Ok(body) => Ok(Some(blake3::hash(&body).to_hex().to_string())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(TrackingError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

async fn write_file(path: &Path, body: &[u8]) -> Result<(), TrackingError> {
    let io_err = |source| TrackingError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    fs::write(path, body).await.map_err(io_err)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merge_object_overlays_fields() {
        let mut config = json!({"min_price": 10.0, "input_artifact": "sample.csv"});
        merge_object(&mut config, json!({"min_price": 20.0, "max_price": 350.0}));
        assert_eq!(
            config,
            json!({"min_price": 20.0, "max_price": 350.0, "input_artifact": "sample.csv"})
        );
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("clean_sample.csv"), "text/csv");
        assert_eq!(content_type_for("meta.json"), "application/json");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }
}
