// crates/rentclean-core/src/error.rs

use rentclean_bucket::BucketError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleaningError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("required column '{0}' is missing")]
    MissingColumn(&'static str),

    #[error("column '{column}' must be numeric, found {dtype}")]
    NonNumericColumn { column: &'static str, dtype: String },
}

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("object store error: {0}")]
    Bucket(#[from] BucketError),

    #[error("File I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid artifact reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("artifact '{0}' not found")]
    ArtifactNotFound(String),

    #[error("artifact '{reference}' holds {count} files; expected exactly one")]
    NotSingleFile { reference: String, count: usize },

    #[error("artifact '{0}' has no files")]
    EmptyArtifact(String),

    #[error("artifact '{artifact}' already contains a file named '{file}'")]
    DuplicateFile { artifact: String, file: String },

    #[error("digest mismatch for '{file}': expected {expected}, got {actual}")]
    DigestMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("manifest '{key}' is corrupt: {reason}")]
    CorruptManifest { key: String, reason: String },

    #[error("upload task failed: {0}")]
    UploadTask(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown object store kind '{0}'; expected 'local' or 's3'")]
    UnknownStoreKind(String),

    #[error("{0} must be set when the s3 object store is selected")]
    MissingVar(&'static str),

    #[error("failed to build object store: {0}")]
    Bucket(#[from] BucketError),
}
