use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::debug;

use crate::{BucketError, BucketStore};

/// Connection settings for an S3-compatible artifact bucket.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for MinIO and other S3-compatible services.
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

impl S3Config {
    pub const DEFAULT_BUCKET: &'static str = "rentclean-artifacts";
    pub const DEFAULT_REGION: &'static str = "us-east-1";

    /// Static credentials, only when both halves of the key pair are present.
    /// Otherwise the SDK's default provider chain applies.
    fn static_credentials(&self) -> Option<Credentials> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(key), Some(secret)) => {
                Some(Credentials::new(key, secret, None, None, "rentclean-env"))
            }
            _ => None,
        }
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: Self::DEFAULT_BUCKET.to_string(),
            region: Self::DEFAULT_REGION.to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        }
    }
}

#[derive(Clone)]
pub struct S3BucketStore {
    client: Client,
    bucket: String,
}

impl S3BucketStore {
    pub async fn new(config: S3Config) -> Result<Self, BucketError> {
        if config.bucket.trim().is_empty() {
            return Err(BucketError::Configuration(
                "s3 bucket name cannot be empty".into(),
            ));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(credentials) = config.static_credentials() {
            loader = loader.credentials_provider(SharedCredentialsProvider::new(credentials));
        }
        let shared = loader.load().await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        debug!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            "configured s3 artifact bucket"
        );
        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn get_error(key: &str, err: SdkError<GetObjectError>) -> BucketError {
        match err.as_service_error() {
            Some(service) if service.is_no_such_key() => BucketError::NotFound(key.to_string()),
            _ => BucketError::from_sdk(err),
        }
    }
}

#[async_trait]
impl BucketStore for S3BucketStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BucketError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(BucketError::from_sdk)?;

        debug!(bucket = %self.bucket, key, size, "s3 put");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| Self::get_error(key, err))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(BucketError::from_sdk)?
            .into_bytes();
        debug!(bucket = %self.bucket, key, size = body.len(), "s3 get");
        Ok(body)
    }
}
