/// Object storage for normalized token logos
use crate::config::StorageSettings;
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

/// Stores a blob and returns its public URL
#[async_trait]
pub trait BlobUploader: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str, content_type: &str) -> Result<String>;
}

/// S3-compatible uploader (AWS S3, Cloudflare R2, MinIO)
#[derive(Clone)]
pub struct S3BlobUploader {
    client: Client,
    bucket: String,
    public_url: String,
}

impl S3BlobUploader {
    pub async fn from_settings(settings: &StorageSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));

        if let (Some(key_id), Some(secret)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "wallet-service-static",
            ));
        }
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.endpoint.is_some())
            .build();

        info!(bucket = %settings.bucket, "Object storage client initialized");

        Self {
            client: Client::from_conf(s3_config),
            bucket: settings.bucket.clone(),
            public_url: settings.public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }
}

#[async_trait]
impl BlobUploader for S3BlobUploader {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str, content_type: &str) -> Result<String> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(file_name)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ServiceError::Upload(format!("put_object {}: {}", file_name, e)))?;

        debug!(file = %file_name, size = size, "Uploaded blob");
        Ok(format!("{}/{}", self.public_url, file_name))
    }
}
