//! In-memory object store for tests and single-node development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::sync::RwLock;

use super::{ByteStream, ObjectStore, stream_from_bytes};
use crate::error::OrchestratorError;

/// Thread-safe in-memory backend. Not suitable for production.
#[derive(Debug, Default, Clone)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryObjectStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Returns `true` if the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, mut data: ByteStream) -> Result<u64, OrchestratorError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = data.next().await {
            buf.extend_from_slice(&chunk?);
        }
        let size = buf.len() as u64;
        self.objects
            .write()
            .await
            .insert(key.to_string(), buf.freeze());
        Ok(size)
    }

    async fn get(&self, key: &str) -> Result<ByteStream, OrchestratorError> {
        let objects = self.objects.read().await;
        objects
            .get(key)
            .cloned()
            .map(stream_from_bytes)
            .ok_or_else(|| OrchestratorError::Internal(format!("object not found: {key}")))
    }

    async fn exists(&self, key: &str) -> Result<bool, OrchestratorError> {
        Ok(self.objects.read().await.contains_key(key))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryObjectStore::new();
        let data = Bytes::from_static(b"hello");

        let size = store.put("a/b", stream_from_bytes(data.clone())).await;
        assert_eq!(size.ok(), Some(5));

        let stream = store.get("a/b").await;
        let Ok(stream) = stream else {
            panic!("get failed");
        };
        let chunks: Vec<Bytes> = stream.try_collect().await.ok().unwrap_or_default();
        assert_eq!(chunks.concat(), data.to_vec());
    }

    #[tokio::test]
    async fn exists_reflects_contents() {
        let store = MemoryObjectStore::new();
        assert_eq!(store.exists("k").await.ok(), Some(false));

        let _ = store
            .put("k", stream_from_bytes(Bytes::from_static(b"x")))
            .await;
        assert_eq!(store.exists("k").await.ok(), Some(true));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn get_missing_key_errors() {
        let store = MemoryObjectStore::new();
        assert!(store.get("missing").await.is_err());
    }
}
