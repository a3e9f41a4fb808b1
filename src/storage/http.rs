//! S3-style HTTP object store client.
//!
//! Objects live at `{endpoint}/{bucket}/{key}`. The client streams both
//! directions and maps transport failures to
//! [`OrchestratorError::StorageUnavailable`], which callers treat as
//! retryable.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::StatusCode;

use super::{ByteStream, ObjectStore};
use crate::error::OrchestratorError;

/// HTTP client for an S3-compatible object store.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    access_token: Option<String>,
}

impl HttpObjectStore {
    /// Creates a client for the given endpoint and bucket.
    #[must_use]
    pub fn new(endpoint: &str, bucket: &str, access_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            access_token,
        }
    }

    /// Returns the full URL of the object under `key`.
    #[must_use]
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, key)
    }

    fn request(&self, method: reqwest::Method, key: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.object_url(key));
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }
}

fn unavailable(context: &str, err: &reqwest::Error) -> OrchestratorError {
    OrchestratorError::StorageUnavailable(format!("{context}: {err}"))
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, data: ByteStream) -> Result<u64, OrchestratorError> {
        let written = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&written);
        let counted = data.inspect_ok(move |chunk| {
            counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        });

        let response = self
            .request(reqwest::Method::PUT, key)
            .body(reqwest::Body::wrap_stream(counted))
            .send()
            .await
            .map_err(|e| unavailable("put failed", &e))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::StorageUnavailable(format!(
                "put rejected with status {}",
                response.status()
            )));
        }
        Ok(written.load(Ordering::Relaxed))
    }

    async fn get(&self, key: &str) -> Result<ByteStream, OrchestratorError> {
        let response = self
            .request(reqwest::Method::GET, key)
            .send()
            .await
            .map_err(|e| unavailable("get failed", &e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(OrchestratorError::Internal(format!(
                "object not found: {key}"
            ))),
            status if !status.is_success() => Err(OrchestratorError::StorageUnavailable(
                format!("get rejected with status {status}"),
            )),
            _ => Ok(response
                .bytes_stream()
                .map_err(|e| OrchestratorError::StorageUnavailable(format!("read failed: {e}")))
                .boxed()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, OrchestratorError> {
        let response = self
            .request(reqwest::Method::HEAD, key)
            .send()
            .await
            .map_err(|e| unavailable("head failed", &e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(OrchestratorError::StorageUnavailable(format!(
                "head rejected with status {status}"
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn object_url_joins_endpoint_bucket_and_key() {
        let store = HttpObjectStore::new("http://store:9000/", "snaps", None);
        assert_eq!(
            store.object_url("snapshots/abc"),
            "http://store:9000/snaps/snapshots/abc"
        );
    }
}
