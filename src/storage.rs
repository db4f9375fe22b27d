use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::info;

use crate::config::StorageConfig;

/// Image keys embed a fresh uuid, so an object never changes once written.
const IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// S3 refuses presigned URLs that live longer than a week.
const MAX_PRESIGN_SECS: u64 = 7 * 24 * 60 * 60;

/// Object store for recipe images.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String>;
}

/// Recipe images in one S3 (or MinIO) bucket, path-style addressed.
#[derive(Clone)]
pub struct S3ImageStore {
    client: Client,
    bucket: String,
}

fn presign_ttl(seconds: u64) -> Duration {
    Duration::from_secs(seconds.clamp(1, MAX_PRESIGN_SECS))
}

impl S3ImageStore {
    pub async fn connect(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "foodgram-env",
            ))
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        let store = Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
        };
        store.ensure_bucket().await?;
        Ok(store)
    }

    /// Creates the bucket on a fresh MinIO.
    async fn ensure_bucket(&self) -> anyhow::Result<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }
        info!(bucket = %self.bucket, "creating image bucket");
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .with_context(|| format!("s3 create_bucket {}", self.bucket))?;
        Ok(())
    }
}

#[async_trait]
impl StorageClient for S3ImageStore {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .cache_control(IMAGE_CACHE_CONTROL)
            .send()
            .await
            .with_context(|| format!("s3 put_object {key}"))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("s3 delete_object {key}"))?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(PresigningConfig::expires_in(presign_ttl(seconds))?)
            .await
            .with_context(|| format!("s3 presign {key}"))?;
        Ok(presigned.uri().to_string())
    }
}
