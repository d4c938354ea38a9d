use std::collections::HashMap;
use std::sync::Mutex;

use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use fizzbuzz_domain::DomainResult;
use fizzbuzz_domain::error::DomainError;
use fizzbuzz_domain::ports::BoxFuture;
use fizzbuzz_domain::ports::storage::ObjectStorage;

use crate::config::AppConfig;

/// Test/local stand-in: objects are held in memory and addressed under a
/// synthetic public base URL.
pub struct InMemoryObjectStore {
    base_url: String,
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl InMemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().expect("lock").len()
    }
}

impl ObjectStorage for InMemoryObjectStore {
    fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BoxFuture<'_, DomainResult<String>> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            self.objects
                .lock()
                .expect("lock")
                .insert(key.clone(), (bytes, content_type));
            Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), key))
        })
    }
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStore {
    pub async fn from_app_config(config: &AppConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.s3_region.clone()))
            .endpoint_url(config.s3_endpoint.clone())
            .load()
            .await;
        Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket: config.s3_bucket.clone(),
            public_base_url: config.s3_public_base_url.clone(),
        }
    }

    /// Path-style URL under the configured public base.
    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            self.bucket,
            key
        )
    }
}

impl ObjectStorage for S3ObjectStore {
    fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BoxFuture<'_, DomainResult<String>> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(ByteStream::from(bytes))
                .content_type(content_type)
                .send()
                .await
                .map_err(|err| {
                    tracing::error!(error = %err, key, "object upload failed");
                    DomainError::Gateway(format!("object upload failed: {err}"))
                })?;
            Ok(self.object_url(&key))
        })
    }
}
