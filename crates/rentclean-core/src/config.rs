use std::path::PathBuf;

use rentclean_bucket::S3Config;
use serde::Serialize;

use crate::cleaning::PriceBounds;
use crate::error::ConfigError;

const DEFAULT_PROJECT: &str = "default";
const DEFAULT_STORE_DIR: &str = ".rentclean/store";
const DEFAULT_CACHE_DIR: &str = ".rentclean/cache";

/// Arguments of one cleaning job; recorded verbatim as the run config.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningConfig {
    pub input_artifact: String,
    pub output_artifact: String,
    pub output_type: String,
    pub output_description: String,
    pub min_price: f64,
    pub max_price: f64,
}

impl CleaningConfig {
    pub fn price_bounds(&self) -> PriceBounds {
        PriceBounds::new(self.min_price, self.max_price)
    }
}

#[derive(Debug, Clone)]
pub enum StoreBackend {
    Local { root: PathBuf },
    S3(S3Config),
}

/// Where artifacts and run records live, read from `RENTCLEAN_*` and `S3_*`
/// environment variables.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub project: String,
    pub backend: StoreBackend,
    pub cache_dir: PathBuf,
    pub git_commit: String,
}

impl TrackingConfig {
    pub fn local(root: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            project: DEFAULT_PROJECT.to_string(),
            backend: StoreBackend::Local { root: root.into() },
            cache_dir: cache_dir.into(),
            git_commit: "unknown".to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let kind = var("RENTCLEAN_OBJECT_STORE_KIND").unwrap_or_else(|| "local".to_string());
        let backend = match kind.to_ascii_lowercase().as_str() {
            "local" => StoreBackend::Local {
                root: var("RENTCLEAN_OBJECT_STORE_DIR")
                    .unwrap_or_else(|| DEFAULT_STORE_DIR.to_string())
                    .into(),
            },
            "s3" => {
                let defaults = S3Config::default();
                StoreBackend::S3(S3Config {
                    bucket: var("S3_BUCKET").ok_or(ConfigError::MissingVar("S3_BUCKET"))?,
                    region: var("S3_REGION").unwrap_or(defaults.region),
                    endpoint: var("S3_ENDPOINT_URL"),
                    access_key_id: var("S3_ACCESS_KEY_ID"),
                    secret_access_key: var("S3_SECRET_ACCESS_KEY"),
                    force_path_style: var("S3_FORCE_PATH_STYLE")
                        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                        .unwrap_or(false),
                })
            }
            _ => return Err(ConfigError::UnknownStoreKind(kind)),
        };

        Ok(Self {
            project: var("RENTCLEAN_PROJECT").unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
            backend,
            cache_dir: var("RENTCLEAN_CACHE_DIR")
                .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string())
                .into(),
            git_commit: var("RENTCLEAN_GIT_COMMIT_HASH").unwrap_or_else(|| "unknown".to_string()),
        })
    }
}
