//! Multipart uploader over any `object_store` backend

use super::{Uploader, public_location};
use crate::config::StorageConfig;
use crate::error::{Error, Result, UploadError};
use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, WriteMultipart};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Size of each local read; parts are assembled from these by `WriteMultipart`
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Uploader that streams files through `WriteMultipart`
///
/// Memory per upload is bounded by roughly `part_size * (max_concurrent_parts + 1)`
/// regardless of file size.
pub struct ObjectStoreUploader {
    store: Arc<dyn ObjectStore>,
    location_base: String,
    part_size: usize,
    max_concurrent_parts: usize,
}

impl ObjectStoreUploader {
    /// Create an uploader over an existing store
    ///
    /// `location_base` is prefixed to keys to build returned locations, e.g.
    /// `https://s3.example.com/bucket`.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        location_base: impl Into<String>,
        part_size: usize,
        max_concurrent_parts: usize,
    ) -> Self {
        Self {
            store,
            location_base: location_base.into().trim_end_matches('/').to_string(),
            part_size,
            max_concurrent_parts: max_concurrent_parts.max(1),
        }
    }

    /// Build an S3 uploader from configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region);

        if let Some(endpoint) = &config.endpoint {
            // Path-style requests for S3-compatible providers
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }
        if let Some(access_key_id) = &config.access_key_id {
            builder = builder.with_access_key_id(access_key_id);
        }
        if let Some(secret_access_key) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret_access_key);
        }

        let store = builder.build().map_err(|e| Error::Config {
            message: format!("failed to build S3 client: {}", e),
            key: Some("storage".into()),
        })?;

        Ok(Self {
            store: Arc::new(store),
            location_base: public_location(
                config.endpoint.as_deref(),
                &config.bucket,
                &config.region,
                "",
            )
            .trim_end_matches('/')
            .to_string(),
            part_size: config.part_size,
            max_concurrent_parts: config.max_concurrent_parts.max(1),
        })
    }

    fn location_for(&self, key: &str) -> String {
        format!("{}/{}", self.location_base, key)
    }

    async fn stream_parts(
        &self,
        local_path: &Path,
        writer: &mut WriteMultipart,
    ) -> std::result::Result<u64, UploadError> {
        let mut file = tokio::fs::File::open(local_path).await?;
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        let mut total = 0u64;

        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            writer.wait_for_capacity(self.max_concurrent_parts).await?;
            writer.write(&buffer[..read]);
            total += read as u64;
        }

        Ok(total)
    }
}

#[async_trait]
impl Uploader for ObjectStoreUploader {
    async fn upload(&self, local_path: &Path, key: &str) -> std::result::Result<String, UploadError> {
        let location = ObjectPath::from(key);
        let upload = self.store.put_multipart(&location).await?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.part_size);

        match self.stream_parts(local_path, &mut writer).await {
            Ok(bytes) => {
                writer.finish().await?;
                tracing::debug!(key, bytes, "Multipart upload finished");
                Ok(self.location_for(key))
            }
            Err(e) => {
                if let Err(abort_err) = writer.abort().await {
                    tracing::warn!(key, error = %abort_err, "Failed to abort multipart upload");
                }
                Err(e)
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_PART_SIZE;
    use object_store::memory::InMemory;

    fn uploader(store: Arc<InMemory>) -> ObjectStoreUploader {
        ObjectStoreUploader::new(store, "https://s3.example.com/media/", MIN_PART_SIZE, 2)
    }

    #[tokio::test]
    async fn test_uploads_file_spanning_several_parts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.mp4");
        let data: Vec<u8> = (0..(MIN_PART_SIZE * 2 + 1234))
            .map(|i| (i % 251) as u8)
            .collect();
        std::fs::write(&path, &data).unwrap();

        let store = Arc::new(InMemory::new());
        let location = uploader(store.clone())
            .upload(&path, "job.mp4")
            .await
            .unwrap();
        assert_eq!(location, "https://s3.example.com/media/job.mp4");

        let stored = store
            .get(&ObjectPath::from("job.mp4"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored.len(), data.len());
        assert_eq!(&stored[..], &data[..]);
    }

    #[tokio::test]
    async fn test_uploads_small_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.webm");
        std::fs::write(&path, b"tiny").unwrap();

        let store = Arc::new(InMemory::new());
        uploader(store.clone()).upload(&path, "tiny.webm").await.unwrap();

        let meta = store.head(&ObjectPath::from("tiny.webm")).await.unwrap();
        assert_eq!(meta.size, 4);
    }

    #[tokio::test]
    async fn test_missing_local_file_fails_without_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemory::new());

        let err = uploader(store.clone())
            .upload(&dir.path().join("gone.mp4"), "gone.mp4")
            .await
            .unwrap_err();
        assert!(err.detail.contains("failed to read local file"));
        assert!(store.head(&ObjectPath::from("gone.mp4")).await.is_err());
    }

    #[test]
    fn test_from_config_uses_public_location() {
        let config = StorageConfig {
            bucket: "media".into(),
            region: "eu-central-1".into(),
            endpoint: Some("http://localhost:9000".into()),
            access_key_id: Some("minio".into()),
            secret_access_key: Some("minio123".into()),
            allow_http: true,
            ..StorageConfig::default()
        };
        let uploader = ObjectStoreUploader::from_config(&config).unwrap();
        assert_eq!(
            uploader.location_for("a.mp4"),
            "http://localhost:9000/media/a.mp4"
        );
    }
}
