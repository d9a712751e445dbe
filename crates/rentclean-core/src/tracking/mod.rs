//! Artifact tracking: versioned artifacts and the runs that consume and produce them.

mod artifact;
mod manifest;
mod reference;
mod run;

pub use artifact::Artifact;
pub use manifest::{aggregate_digest, ArtifactManifest, LatestPointer, ManifestEntry, Version};
pub use reference::{validate_artifact_name, ArtifactRef, VersionSelector};
pub use run::{Run, RunRecord, RunStatus, UploadHandle};
