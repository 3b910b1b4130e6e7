//! Object store backends.
//!
//! `oss` signs query-string URLs the way Aliyun OSS expects them: HMAC-SHA1
//! over `VERB\nMD5\nType\nExpires\nResource`, base64 encoded.

use std::sync::Arc;

use chrono::Utc;
use domain::services::ports::{MockObjectStore, ObjectStore};
use domain::{DomainError, DomainResult};
use shared::crypto::hmac_sha1_base64;

use crate::config::StorageConfig;

/// Query-string signer for an OSS bucket.
#[derive(Clone)]
pub struct OssObjectStore {
    endpoint: String,
    bucket: String,
    access_key_id: String,
    access_key_secret: String,
    public_base_url: String,
}

impl std::fmt::Debug for OssObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OssObjectStore")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl OssObjectStore {
    pub fn new(config: &StorageConfig) -> Self {
        let endpoint = config
            .endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        let public_base_url = if config.public_base_url.is_empty() {
            format!("https://{}.{}", config.bucket, endpoint)
        } else {
            config.public_base_url.trim_end_matches('/').to_string()
        };

        Self {
            endpoint,
            bucket: config.bucket.clone(),
            access_key_id: config.access_key_id.clone(),
            access_key_secret: config.access_key_secret.clone(),
            public_base_url,
        }
    }

    /// String the signature covers for a GET that overrides the disposition.
    fn string_to_sign(&self, object_key: &str, expires: i64, content_disposition: &str) -> String {
        let mut resource = format!("/{}/{}", self.bucket, object_key);
        if !content_disposition.is_empty() {
            resource.push_str("?response-content-disposition=");
            resource.push_str(content_disposition);
        }
        format!("GET\n\n\n{}\n{}", expires, resource)
    }

    /// URL valid until the unix timestamp `expires`.
    pub fn presigned_get(&self, object_key: &str, expires: i64, content_disposition: &str) -> String {
        let signature = hmac_sha1_base64(
            &self.access_key_secret,
            &self.string_to_sign(object_key, expires, content_disposition),
        );

        let mut url = format!(
            "https://{}.{}/{}?OSSAccessKeyId={}&Expires={}&Signature={}",
            self.bucket,
            self.endpoint,
            encode_key(object_key),
            urlencoding::encode(&self.access_key_id),
            expires,
            urlencoding::encode(&signature),
        );
        if !content_disposition.is_empty() {
            url.push_str("&response-content-disposition=");
            url.push_str(&urlencoding::encode(content_disposition));
        }
        url
    }
}

/// Percent-encodes each path segment, keeping the `/` separators.
fn encode_key(object_key: &str) -> String {
    object_key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait::async_trait]
impl ObjectStore for OssObjectStore {
    async fn sign_get(
        &self,
        object_key: &str,
        ttl_secs: u64,
        content_disposition: &str,
    ) -> DomainResult<String> {
        if object_key.is_empty() {
            return Err(DomainError::invalid("Object key is empty"));
        }
        let ttl = i64::try_from(ttl_secs)
            .map_err(|_| DomainError::invalid("Signed URL lifetime is too large"))?;
        let expires = Utc::now().timestamp() + ttl;
        Ok(self.presigned_get(object_key, expires, content_disposition))
    }

    fn public_url(&self, object_key: &str) -> String {
        format!("{}/{}", self.public_base_url, encode_key(object_key))
    }
}

/// Store selected by `storage.provider`.
pub fn build_object_store(config: &StorageConfig) -> Arc<dyn ObjectStore> {
    match config.provider.as_str() {
        "oss" => {
            tracing::info!(bucket = %config.bucket, endpoint = %config.endpoint, "Using OSS object store");
            Arc::new(OssObjectStore::new(config))
        }
        _ => {
            tracing::warn!("Using mock object store; download URLs are not real");
            Arc::new(MockObjectStore::new())
        }
    }
}
