//! Abstractions over the storage backends that hold tracked artifacts and run records.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

mod local;
mod s3;

pub use local::LocalBucketStore;
pub use s3::{S3BucketStore, S3Config};

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("sdk error: {0}")]
    Sdk(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },
    #[error("i/o error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl BucketError {
    fn from_sdk(err: impl fmt::Display) -> Self {
        Self::Sdk(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BucketError>;
    /// Missing keys are reported as [`BucketError::NotFound`].
    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError>;
}
