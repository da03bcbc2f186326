//! S3-backed object store client.
//!
//! Deployed files live under `<version>/<path>` keys in a single bucket.
//! Credentials come from the ambient AWS provider chain; region and endpoint
//! are configurable so the client also works against S3-compatible stores.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;

use crate::config::ObjectStoreSettings;

use super::{ObjectStore, StoreError, StoredObject};

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from the configured bucket, region, and endpoint.
    pub async fn from_settings(settings: &ObjectStoreSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = settings.region.clone() {
            loader = loader.region(Region::new(region));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = settings.endpoint.clone() {
            // Path-style addressing keeps bucket names out of DNS for
            // S3-compatible endpoints.
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn fetch(&self, version: &str, path: &str) -> Result<Option<StoredObject>, StoreError> {
        let key = format!("{version}/{path}");
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|service| service.is_no_such_key())
                {
                    return Ok(None);
                }
                return Err(StoreError::object(err.to_string()));
            }
        };

        let content_type = output.content_type().map(str::to_string);
        let body = output
            .body
            .collect()
            .await
            .map_err(|err| StoreError::object(err.to_string()))?
            .into_bytes();

        Ok(Some(StoredObject { body, content_type }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| StoreError::object(err.to_string()))
    }
}
