use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use rentclean_bucket::{BucketError, BucketStore, LocalBucketStore, S3BucketStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{StoreBackend, TrackingConfig};
use crate::error::{ConfigError, TrackingError};
use crate::tracking::Version;

/// Project-scoped view over a [`BucketStore`] that knows the tracking key layout.
#[derive(Clone)]
pub struct ObjectStore {
    inner: Arc<dyn BucketStore>,
    project: String,
}

impl fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStore")
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

impl ObjectStore {
    pub fn new(inner: Arc<dyn BucketStore>, project: impl Into<String>) -> Self {
        Self {
            inner,
            project: project.into(),
        }
    }

    pub fn local(root: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self::new(Arc::new(LocalBucketStore::new(root)), project)
    }

    pub async fn from_config(config: &TrackingConfig) -> Result<Self, ConfigError> {
        let inner: Arc<dyn BucketStore> = match &config.backend {
            StoreBackend::Local { root } => Arc::new(LocalBucketStore::new(root.clone())),
            StoreBackend::S3(s3) => Arc::new(S3BucketStore::new(s3.clone()).await?),
        };
        Ok(Self::new(inner, config.project.clone()))
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn artifact_prefix(&self, name: &str) -> String {
        format!("{}/artifacts/{name}/", self.project)
    }

    pub fn latest_key(&self, name: &str) -> String {
        format!("{}latest.json", self.artifact_prefix(name))
    }

    pub fn manifest_key(&self, name: &str, version: Version) -> String {
        format!("{}{version}/manifest.json", self.artifact_prefix(name))
    }

    pub fn artifact_file_key(&self, name: &str, version: Version, file_name: &str) -> String {
        format!("{}{version}/files/{file_name}", self.artifact_prefix(name))
    }

    pub fn run_key(&self, run_id: &Uuid) -> String {
        format!("{}/runs/{run_id}.json", self.project)
    }

    pub async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BucketError> {
        self.inner.put_object(key, bytes, content_type).await
    }

    pub async fn get_object(&self, key: &str) -> Result<Bytes, BucketError> {
        self.inner.get_object(key).await
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), TrackingError> {
        let body = serde_json::to_vec_pretty(value)?;
        self.put_object(key, Bytes::from(body), "application/json")
            .await?;
        Ok(())
    }

    /// `Ok(None)` when the key does not exist.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, TrackingError> {
        match self.get_object(key).await {
            Ok(body) => Ok(Some(serde_json::from_slice(&body)?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
