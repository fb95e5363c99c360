//! S3-compatible media backend (AWS S3 or a MinIO gateway).
//!
//! Media keys map one-to-one onto object keys in a single bucket.
//! Credentials come from the config when both halves are set, otherwise
//! from the standard AWS credential chain.

use aws_sdk_s3::Client;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info};

use super::backend::MediaStore;
use crate::config::S3StorageConfig;

pub struct S3MediaStore {
    client: Client,
    bucket: String,
}

impl S3MediaStore {
    /// Build the SDK client for `bucket` from the gateway settings.
    pub async fn new(bucket: String, settings: &S3StorageConfig) -> anyhow::Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()));

        if !settings.endpoint_url.is_empty() {
            config_loader = config_loader.endpoint_url(&settings.endpoint_url);
        }

        if !settings.access_key_id.is_empty() && !settings.secret_access_key.is_empty() {
            let creds = aws_sdk_s3::config::Credentials::new(
                &settings.access_key_id,
                &settings.secret_access_key,
                None,
                None,
                "folio-config",
            );
            config_loader = config_loader.credentials_provider(creds);
        }

        let sdk_config = config_loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.use_path_style)
            .build();
        let client = Client::from_conf(s3_config);

        info!(
            bucket = %bucket,
            endpoint = %settings.endpoint_url,
            "S3 media backend initialized"
        );

        Ok(Self { client, bucket })
    }

    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> anyhow::Error {
        anyhow::anyhow!("S3 {context}: {err}")
    }
}

impl MediaStore for S3MediaStore {
    fn put(
        &self,
        key: &str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<u64>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let size = data.len() as u64;
            debug!("S3 put_object: bucket={} key={}", self.bucket, key);
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(aws_sdk_s3::primitives::ByteStream::from(data))
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("put_object", e))?;
            Ok(size)
        })
    }

    fn remove(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 delete_object: bucket={} key={}", self.bucket, key);
            // delete_object succeeds for missing keys.
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("delete_object", e))?;
            Ok(())
        })
    }

    fn exists(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            match self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
            {
                Ok(_) => Ok(true),
                Err(e) => {
                    let service_err = e.into_service_error();
                    if service_err.is_not_found() {
                        Ok(false)
                    } else {
                        Err(Self::map_sdk_error("head_object", service_err))
                    }
                }
            }
        })
    }

    fn list(
        &self,
        prefix: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            let mut keys = Vec::new();
            let mut continuation_token: Option<String> = None;
            loop {
                let mut req = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(&prefix);
                if let Some(ref token) = continuation_token {
                    req = req.continuation_token(token);
                }

                let resp = req
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error("list_objects_v2", e))?;
                keys.extend(
                    resp.contents()
                        .iter()
                        .filter_map(|obj| obj.key().map(str::to_string)),
                );

                if resp.is_truncated() == Some(true) {
                    continuation_token = resp.next_continuation_token().map(str::to_string);
                } else {
                    break;
                }
            }
            keys.sort();
            Ok(keys)
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.client
                .head_bucket()
                .bucket(&self.bucket)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("head_bucket", e))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builds_client_from_static_credentials() {
        let settings = S3StorageConfig {
            endpoint_url: "http://127.0.0.1:9000".into(),
            region: "us-east-1".into(),
            use_path_style: true,
            access_key_id: "minio".into(),
            secret_access_key: "minio123".into(),
        };
        let store = S3MediaStore::new("fadel-blog".into(), &settings)
            .await
            .unwrap();
        assert_eq!(store.bucket, "fadel-blog");
    }

    #[test]
    fn test_error_context() {
        let err = S3MediaStore::map_sdk_error("put_object", "boom");
        assert_eq!(err.to_string(), "S3 put_object: boom");
    }
}
