use std::fmt;
use std::str::FromStr;

use crate::error::TrackingError;
use crate::tracking::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
    Exact(Version),
}

/// `name`, `name:latest` or `name:v<N>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub name: String,
    pub selector: VersionSelector,
}

impl ArtifactRef {
    pub fn parse(reference: &str) -> Result<Self, TrackingError> {
        let invalid = |reason: String| TrackingError::InvalidReference {
            reference: reference.to_string(),
            reason,
        };

        let (name, selector) = match reference.rsplit_once(':') {
            None => (reference, VersionSelector::Latest),
            Some((name, "latest")) => (name, VersionSelector::Latest),
            Some((name, tag)) => {
                let number = tag
                    .strip_prefix('v')
                    .and_then(|digits| digits.parse::<u32>().ok())
                    .ok_or_else(|| invalid(format!("unknown version '{tag}'")))?;
                (name, VersionSelector::Exact(Version(number)))
            }
        };

        validate_artifact_name(name).map_err(|reason| invalid(reason.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            selector,
        })
    }
}

impl FromStr for ArtifactRef {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.selector {
            VersionSelector::Latest => write!(f, "{}:latest", self.name),
            VersionSelector::Exact(version) => write!(f, "{}:{version}", self.name),
        }
    }
}

/// Names double as object-store path segments and local file names.
pub fn validate_artifact_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name is empty");
    }
    if name.starts_with('.') {
        return Err("name must not start with '.'");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("name may only contain ASCII letters, digits, '-', '_' and '.'");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_means_latest() {
        let parsed = ArtifactRef::parse("sample.csv").unwrap();
        assert_eq!(parsed.name, "sample.csv");
        assert_eq!(parsed.selector, VersionSelector::Latest);
        assert_eq!(parsed.to_string(), "sample.csv:latest");
    }

    #[test]
    fn explicit_versions() {
        assert_eq!(
            ArtifactRef::parse("sample.csv:latest").unwrap().selector,
            VersionSelector::Latest
        );
        let pinned: ArtifactRef = "clean_sample.csv:v12".parse().unwrap();
        assert_eq!(pinned.selector, VersionSelector::Exact(Version(12)));
        assert_eq!(pinned.to_string(), "clean_sample.csv:v12");
    }

    #[test]
    fn rejects_malformed_references() {
        for bad in ["", ":latest", "sample.csv:prod", "sample.csv:v", "../x", "a/b", ".hidden"] {
            assert!(ArtifactRef::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
