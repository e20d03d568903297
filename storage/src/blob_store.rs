use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    #[error("blob not found for key {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl healthsync_core::error::HasErrorKind for BlobStoreError {
    fn error_kind(&self) -> healthsync_core::error::ErrorKind {
        use healthsync_core::error::ErrorKind;
        match self {
            BlobStoreError::NotFound(_) => ErrorKind::NotFound,
            BlobStoreError::Backend(_) => ErrorKind::Backend,
        }
    }
}

/// Upload, presigned read, and delete of raw document bytes (spec.md §4.3).
/// Keys follow `{user_id}/{document_id}/{file_name}`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobStoreError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobStoreError>;

    /// Idempotent: deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobStoreError>;

    async fn presign_get(&self, key: &str, ttl_secs: u64) -> Result<String, BlobStoreError>;
}

struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-memory fake standing in for the external object store.
pub struct InMemoryBlobStore {
    blobs: DashMap<String, StoredBlob>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: DashMap::new(),
        }
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobStoreError> {
        self.blobs.insert(
            key.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("memory://{key}"))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobStoreError> {
        self.blobs
            .get(key)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| BlobStoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError> {
        self.blobs.remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl_secs: u64) -> Result<String, BlobStoreError> {
        if !self.blobs.contains_key(key) {
            return Err(BlobStoreError::NotFound(key.to_string()));
        }
        Ok(format!("memory://{key}?expires_in={ttl_secs}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryBlobStore::new();
        store.delete("missing/key").await.unwrap();
        store.delete("missing/key").await.unwrap();
    }

    #[tokio::test]
    async fn put_then_get_round_trips_bytes() {
        let store = InMemoryBlobStore::new();
        store
            .put("u1/d1/f.txt", b"hello".to_vec(), "text/plain")
            .await
            .unwrap();
        let bytes = store.get("u1/d1/f.txt").await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let store = InMemoryBlobStore::new();
        assert!(matches!(
            store.get("nope").await,
            Err(BlobStoreError::NotFound(_))
        ));
    }
}
