use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TrackingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub u32);

impl Version {
    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    /// blake3, hex encoded.
    pub digest: String,
    pub size: u64,
}

/// Immutable description of one published artifact version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub name: String,
    pub version: Version,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub description: String,
    pub files: Vec<ManifestEntry>,
    pub digest: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ArtifactManifest {
    /// `name:vN`
    pub fn reference(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }

    pub fn single_file(&self) -> Result<&ManifestEntry, TrackingError> {
        match self.files.as_slice() {
            [entry] => Ok(entry),
            files => Err(TrackingError::NotSingleFile {
                reference: self.reference(),
                count: files.len(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestPointer {
    pub version: Version,
    pub digest: String,
}

/// Digest over the (name, digest) pairs of every file, independent of the
/// order in which files were added.
pub fn aggregate_digest(entries: &[ManifestEntry]) -> String {
    let mut sorted: Vec<&ManifestEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = blake3::Hasher::new();
    for entry in sorted {
        hasher.update(entry.name.as_bytes());
        hasher.update(&[0]);
        hasher.update(entry.digest.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}
