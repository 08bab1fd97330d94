use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::debug;

use super::{BlobStorage, PlatformError};
use crate::config::RemoteConfig;

/// Blob storage on S3 or any S3-compatible service (MinIO locally).
#[derive(Clone)]
pub struct S3Blobs {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Blobs {
    pub async fn new(config: &RemoteConfig) -> Self {
        let credentials = Credentials::new(
            &config.aws_access_key_id,
            &config.aws_secret_access_key,
            None,
            None,
            "resumind-static",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(&config.s3_endpoint)
            .load()
            .await;

        // MinIO only serves path-style requests
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.s3_bucket.clone(),
        }
    }
}

#[async_trait]
impl BlobStorage for S3Blobs {
    async fn write(&self, path: &str, bytes: Bytes, mime: &str) -> Result<(), PlatformError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type(mime)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| PlatformError::Storage(format!("Failed to write {path}: {e}")))?;

        debug!("Stored {size} bytes at s3://{}/{path}", self.bucket);
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>, PlatformError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return Ok(None);
                }
                return Err(PlatformError::Storage(format!(
                    "Failed to read {path}: {service_error}"
                )));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| PlatformError::Storage(format!("Failed to read body of {path}: {e}")))?;

        Ok(Some(data.into_bytes()))
    }

    async fn delete(&self, path: &str) -> Result<(), PlatformError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| PlatformError::Storage(format!("Failed to delete {path}: {e}")))?;

        debug!("Deleted s3://{}/{path}", self.bucket);
        Ok(())
    }
}
