use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::info;

use crate::config::{Config, StorageMode};

/// A time-limited, capability-bearing PUT URL for one object-store key.
/// Stripping the query string from `url` yields the public object URL.
#[derive(Debug, Clone)]
pub struct PresignedUpload {
    pub url: String,
    pub key: String,
}

#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    async fn presign_put(&self, key: &str, expires: Duration) -> anyhow::Result<PresignedUpload>;
}

/// Deterministic backend for development and tests. The URL carries mock
/// signature query parameters so the public-URL derivation is exercised.
#[derive(Debug, Clone)]
pub struct MockStorageBackend {
    pub base_url: String,
    pub bucket: String,
}

#[async_trait]
impl StorageBackend for MockStorageBackend {
    async fn presign_put(&self, key: &str, expires: Duration) -> anyhow::Result<PresignedUpload> {
        let url = format!(
            "{}/{}/{}?X-Amz-Algorithm=AWS4-HMAC-SHA256&X-Amz-Expires={}&X-Amz-Signature=mock",
            self.base_url.trim_end_matches('/'),
            self.bucket,
            key,
            expires.as_secs()
        );
        Ok(PresignedUpload { url, key: key.to_string() })
    }
}

#[cfg(feature = "s3")]
#[derive(Clone)]
pub struct S3StorageBackend {
    client: aws_sdk_s3::Client,
    bucket: String,
}

#[cfg(feature = "s3")]
impl std::fmt::Debug for S3StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3StorageBackend").field("bucket", &self.bucket).finish()
    }
}

#[cfg(feature = "s3")]
#[async_trait]
impl StorageBackend for S3StorageBackend {
    async fn presign_put(&self, key: &str, expires: Duration) -> anyhow::Result<PresignedUpload> {
        use aws_sdk_s3::presigning::PresigningConfig;
        let expires = std::cmp::min(expires.as_secs(), 3600); // cap at 1h
        let config = PresigningConfig::builder()
            .expires_in(Duration::from_secs(expires))
            .build()?;
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await?;
        Ok(PresignedUpload { url: presigned.uri().to_string(), key: key.to_string() })
    }
}

/// Handle over the configured backend. Constructed once at startup and passed
/// into the issue service; there is no process-global instance.
#[derive(Clone)]
pub struct StorageManager {
    inner: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager").finish()
    }
}

impl StorageManager {
    pub async fn from_config(config: &Config) -> Self {
        if config.storage_mode == StorageMode::S3 {
            #[cfg(feature = "s3")]
            {
                use aws_config::BehaviorVersion;
                let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".into());
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(aws_sdk_s3::config::Region::new(region))
                    .load()
                    .await;
                let mut builder = aws_sdk_s3::config::Builder::from(&shared);
                if let Some(endpoint) = &config.s3_endpoint_url {
                    // S3-compatible stores (e.g. MinIO) want path-style addressing
                    builder = builder.endpoint_url(endpoint).force_path_style(true);
                }
                let client = aws_sdk_s3::Client::from_conf(builder.build());
                info!(bucket = %config.bucket, "storage.init_s3");
                return StorageManager {
                    inner: Arc::new(S3StorageBackend { client, bucket: config.bucket.clone() }),
                };
            }
            #[cfg(not(feature = "s3"))]
            tracing::warn!("s3 feature not enabled, falling back to mock backend");
        }
        info!(bucket = %config.bucket, "storage.init_mock");
        StorageManager {
            inner: Arc::new(MockStorageBackend {
                base_url: config.s3_base_url.clone(),
                bucket: config.bucket.clone(),
            }),
        }
    }

    pub fn mock(base_url: &str, bucket: &str) -> Self {
        StorageManager {
            inner: Arc::new(MockStorageBackend {
                base_url: base_url.to_string(),
                bucket: bucket.to_string(),
            }),
        }
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.inner.as_ref()
    }
}
