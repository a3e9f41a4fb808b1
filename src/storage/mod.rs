//! Object storage gateway: narrow interface to the snapshot blob store.
//!
//! The orchestrator treats the store as content-addressable and consumes
//! it only through [`ObjectStore`]: put, get, and an existence check.
//! Payloads stream through the gateway; the orchestrator never buffers a
//! full snapshot in memory, and checksum verification streams the stored
//! copy rather than trusting the uploader.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use sha2::{Digest, Sha256};

use crate::error::OrchestratorError;

pub use http::HttpObjectStore;
pub use memory::MemoryObjectStore;

/// A stream of payload chunks moving through the gateway.
pub type ByteStream = BoxStream<'static, Result<Bytes, OrchestratorError>>;

/// Narrow blob-store interface consumed by the orchestrator.
///
/// The backend is not assumed to verify integrity; callers own that.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug + 'static {
    /// Stores an object under `key`, returning the stored size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::StorageUnavailable`] if the backend
    /// cannot be reached or rejects the write.
    async fn put(&self, key: &str, data: ByteStream) -> Result<u64, OrchestratorError>;

    /// Opens a streaming read of the object under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::StorageUnavailable`] if the backend
    /// cannot be reached, or [`OrchestratorError::Internal`] if the
    /// object does not exist (callers check `exists` first).
    async fn get(&self, key: &str) -> Result<ByteStream, OrchestratorError>;

    /// Returns `true` if an object exists under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::StorageUnavailable`] if the backend
    /// cannot be reached.
    async fn exists(&self, key: &str) -> Result<bool, OrchestratorError>;
}

/// Streams the stored object through SHA-256 and returns the lowercase
/// hex digest.
///
/// # Errors
///
/// Propagates any [`OrchestratorError`] from the underlying stream.
pub async fn compute_checksum(
    store: &dyn ObjectStore,
    key: &str,
) -> Result<String, OrchestratorError> {
    let mut stream = store.get(key).await?;
    let mut hasher = Sha256::new();
    while let Some(chunk) = stream.next().await {
        hasher.update(&chunk?);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Wraps a single in-memory buffer as a [`ByteStream`].
#[must_use]
pub fn stream_from_bytes(data: Bytes) -> ByteStream {
    futures_util::stream::iter(std::iter::once(Ok(data))).boxed()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn compute_checksum_matches_direct_hash() {
        let store = MemoryObjectStore::new();
        let data = Bytes::from_static(b"snapshot payload");
        let _ = store.put("k", stream_from_bytes(data.clone())).await;

        let expected = hex::encode(Sha256::digest(&data));
        let computed = compute_checksum(&store, "k").await;
        let Ok(computed) = computed else {
            panic!("checksum failed");
        };
        assert_eq!(computed, expected);
    }
}
