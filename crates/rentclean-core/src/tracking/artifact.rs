use std::path::{Path, PathBuf};

use crate::error::TrackingError;
use crate::tracking::validate_artifact_name;

/// An artifact being assembled by a run, before it is logged.
#[derive(Debug, Clone)]
pub struct Artifact {
    name: String,
    artifact_type: String,
    description: String,
    files: Vec<PathBuf>,
}

impl Artifact {
    pub fn new(
        name: impl Into<String>,
        artifact_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, TrackingError> {
        let name = name.into();
        validate_artifact_name(&name).map_err(|reason| TrackingError::InvalidReference {
            reference: name.clone(),
            reason: reason.to_string(),
        })?;

        Ok(Self {
            name,
            artifact_type: artifact_type.into(),
            description: description.into(),
            files: Vec::new(),
        })
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.files.push(path.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn artifact_type(&self) -> &str {
        &self.artifact_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

pub(crate) fn file_name(path: &Path) -> Result<String, TrackingError> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| TrackingError::Io {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        })
}
