use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;

use crate::{BucketError, BucketStore};

const PARTIAL_SUFFIX: &str = ".partial";

/// Stores objects as plain files below `root`, one file per key.
#[derive(Debug, Clone)]
pub struct LocalBucketStore {
    root: PathBuf,
}

impl LocalBucketStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, BucketError> {
        let invalid = |reason| BucketError::InvalidKey {
            key: key.to_string(),
            reason,
        };

        if key.is_empty() {
            return Err(invalid("key is empty"));
        }
        if key.ends_with(PARTIAL_SUFFIX) {
            return Err(invalid("key uses the reserved .partial suffix"));
        }

        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(invalid("key must be a relative path without '..'")),
            }
        }

        Ok(self.root.join(relative))
    }

    fn io_error(key: &str, source: std::io::Error) -> BucketError {
        if source.kind() == ErrorKind::NotFound {
            BucketError::NotFound(key.to_string())
        } else {
            BucketError::Io {
                key: key.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl BucketStore for LocalBucketStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<(), BucketError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| Self::io_error(key, err))?;
        }

        // Readers only ever see a complete object.
        let mut partial = path.clone().into_os_string();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);

        fs::write(&partial, &bytes)
            .await
            .map_err(|err| Self::io_error(key, err))?;
        fs::rename(&partial, &path)
            .await
            .map_err(|err| Self::io_error(key, err))?;

        debug!(root = %self.root.display(), key, size = bytes.len(), "local put");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError> {
        let path = self.object_path(key)?;
        let data = fs::read(&path)
            .await
            .map_err(|err| Self::io_error(key, err))?;
        Ok(Bytes::from(data))
    }
}
