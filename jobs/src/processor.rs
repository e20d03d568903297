use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use healthsync_core::ids::{ChunkId, DocumentId, UserId};
use healthsync_core::model::{ChunkMetadata, DocumentChunk};
use ingestion::chunker::Chunker;
use models::{Embedder, EmbeddingError};
use storage::blob_store::BlobStore;
use storage::document_registry::DocumentRegistry;
use storage::vector_index::{
    VectorFilter, VectorIndex, VectorIndexError, VectorMetadata, VectorRecord,
};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("another worker already owns this document")]
    AlreadyOwned,
    #[error("document not found")]
    NotFound,
    #[error("download error: {0}")]
    Download(String),
    #[error("extract error: {0}")]
    Extract(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("index error: {0}")]
    Index(String),
}

/// Within-attempt retry budget for the embed/upsert calls (spec.md §4.6,
/// §5) — distinct from and not a substitute for the cross-attempt
/// `processing_attempts < 3` cap enforced by the document registry (spec.md
/// §4.2). This budget bounds retries of transient failures inside a single
/// processing attempt; exhausting it fails that attempt outright.
const RETRY_BUDGET: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

trait Retryable {
    fn retryable(&self) -> bool;
}

impl Retryable for EmbeddingError {
    fn retryable(&self) -> bool {
        self.is_retryable()
    }
}

impl Retryable for VectorIndexError {
    fn retryable(&self) -> bool {
        self.is_retryable()
    }
}

/// Retries `attempt` with exponential backoff while its error is classified
/// retryable, up to `RETRY_BUDGET` extra tries. A fatal error, or a
/// transient one with the budget exhausted, is returned immediately.
async fn retry_with_backoff<T, E, F, Fut>(mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable,
{
    let mut tries = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.retryable() && tries < RETRY_BUDGET => {
                let delay = RETRY_BASE_DELAY * 2u32.pow(tries);
                warn!(attempt = tries, ?delay, "retrying transient failure");
                tokio::time::sleep(delay).await;
                tries += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Runs a freshly `uploaded` (or retried `failed`) document through
/// `processed` or `failed`, once, per spec.md §4.8's seven-step algorithm.
/// Every external call is logged at its boundary; the orchestrator itself
/// never propagates an error past `process` — failures land on the
/// document row instead.
pub struct DocumentProcessor {
    registry: Arc<dyn DocumentRegistry>,
    blobs: Arc<dyn BlobStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    embed_model_id: String,
}

impl DocumentProcessor {
    pub fn new(
        registry: Arc<dyn DocumentRegistry>,
        blobs: Arc<dyn BlobStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        chunker: Chunker,
    ) -> Self {
        Self {
            registry,
            blobs,
            index,
            embedder,
            chunker,
            embed_model_id: "embedding-default-v1".to_string(),
        }
    }

    pub async fn process(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<(), ProcessingError> {
        // Step 1: CAS uploaded|failed -> processing.
        self.registry
            .begin_processing(user_id, document_id)
            .await
            .map_err(|e| match e {
                storage::document_registry::DocumentRegistryError::NotFound => {
                    ProcessingError::NotFound
                }
                storage::document_registry::DocumentRegistryError::CasFailed => {
                    ProcessingError::AlreadyOwned
                }
                storage::document_registry::DocumentRegistryError::Backend(m) => {
                    ProcessingError::Download(m)
                }
            })?;

        match self.run_pipeline(user_id, document_id).await {
            Ok(chunk_count) => {
                info!(%document_id, chunk_count, "document processed");
                let _ = self
                    .registry
                    .mark_processed(user_id, document_id, chunk_count)
                    .await;
                Ok(())
            }
            Err(err) => {
                warn!(%document_id, %err, "document processing failed");
                let _ = self
                    .registry
                    .mark_failed(user_id, document_id, err.to_string())
                    .await;
                Err(err)
            }
        }
    }

    async fn run_pipeline(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<u32, ProcessingError> {
        let document = self
            .registry
            .get(user_id, document_id)
            .await
            .map_err(|_| ProcessingError::NotFound)?;

        // Step 2: fetch blob bytes.
        let bytes = self
            .blobs
            .get(&document.blob_key)
            .await
            .map_err(|e| ProcessingError::Download(e.to_string()))?;

        // Step 3: decode text.
        let text = ingestion::extract_text(&bytes, &document.content_type, Some(&document.file_name))
            .map_err(|e| ProcessingError::Extract(e.to_string()))?;

        // Step 4: chunk, attaching per-chunk metadata.
        let texts = self.chunker.chunk(&text);
        if texts.is_empty() {
            return Ok(0);
        }

        // Step 5: embed all chunk texts (batched), retried with backoff on
        // transient failures within this attempt (spec.md §4.6, §5).
        let embeddings = retry_with_backoff(|| self.embedder.embed_batch(&texts))
            .await
            .map_err(|e| ProcessingError::Embedding(e.to_string()))?;

        let chunks: Vec<DocumentChunk> = texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (content, embedding))| DocumentChunk {
                chunk_id: ChunkId::new_v4(),
                document_id: document_id.clone(),
                user_id: user_id.clone(),
                chunk_index: i as u32,
                content,
                embedding,
                metadata: ChunkMetadata {
                    document_title: document.title.clone(),
                    category: document.category.clone(),
                    file_type: document.file_type.clone(),
                    upload_time: document.upload_time,
                },
            })
            .collect();

        // Step 6: upsert vectors, filtered by user_id and tagged with document_id.
        let records: Vec<VectorRecord> = chunks
            .iter()
            .map(|c| VectorRecord {
                id: c.chunk_id.clone(),
                values: c.embedding.clone(),
                user_id: c.user_id.clone(),
                document_id: c.document_id.clone(),
                metadata: VectorMetadata {
                    chunk_index: c.chunk_index,
                    content: c.content.clone(),
                    document_title: c.metadata.document_title.clone(),
                    document_category: c.metadata.category.clone(),
                    document_file_type: c.metadata.file_type.clone(),
                    upload_time: c.metadata.upload_time,
                },
            })
            .collect();
        let chunk_count = records.len() as u32;

        retry_with_backoff(|| self.index.upsert(records.clone()))
            .await
            .map_err(|e| ProcessingError::Index(e.to_string()))?;

        Ok(chunk_count)
    }

    /// Deletion ordering per spec.md §4.8: vectors, then blob, then registry
    /// row. Failures in (a)/(b) are logged but never block (c).
    pub async fn delete_document(&self, user_id: &UserId, document_id: &DocumentId) {
        let document = match self.registry.get(user_id, document_id).await {
            Ok(d) => Some(d),
            Err(_) => None,
        };

        if let Err(e) = self
            .index
            .delete_by_filter(&VectorFilter {
                user_id: user_id.clone(),
                document_id: Some(document_id.clone()),
            })
            .await
        {
            warn!(%document_id, %e, "failed to delete vectors for document");
        }

        if let Some(document) = document {
            if let Err(e) = self.blobs.delete(&document.blob_key).await {
                warn!(%document_id, %e, "failed to delete blob for document");
            }
        }

        if let Err(e) = self.registry.delete(user_id, document_id).await {
            warn!(%document_id, %e, "failed to delete registry row for document");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use healthsync_core::ids::{DocumentId, UserId};
    use healthsync_core::model::{Document, DocumentStatus};
    use models::{DeterministicEmbedder, FlakyEmbedder};
    use storage::blob_store::InMemoryBlobStore;
    use storage::document_registry::InMemoryDocumentRegistry;
    use storage::vector_index::{FlakyVectorIndex, InMemoryVectorIndex};

    fn sample_document(user: &str, doc: &str, blob_key: &str) -> Document {
        Document {
            document_id: DocumentId::new(doc),
            user_id: UserId::new(user),
            title: "Visit notes".to_string(),
            file_name: "notes.txt".to_string(),
            file_type: "txt".to_string(),
            content_type: "text/plain".to_string(),
            file_size: 0,
            blob_key: blob_key.to_string(),
            category: None,
            description: None,
            tags: Vec::new(),
            upload_time: Utc::now(),
            processed_at: None,
            status: DocumentStatus::Uploaded,
            chunk_count: 0,
            processing_attempts: 0,
            last_processing_attempt: None,
            indexed_in_index: false,
            error_message: None,
        }
    }

    async fn processor_with(
        embedder: impl Embedder + 'static,
        index: impl VectorIndex + 'static,
    ) -> (Arc<InMemoryDocumentRegistry>, DocumentProcessor) {
        let registry = Arc::new(InMemoryDocumentRegistry::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let blob_key = "u1/d1/notes.txt";
        blobs
            .put(blob_key, b"patient reports mild headaches".to_vec(), "text/plain")
            .await
            .unwrap();
        registry
            .create(sample_document("u1", "d1", blob_key))
            .await
            .unwrap();

        let processor = DocumentProcessor::new(
            registry.clone(),
            blobs,
            Arc::new(index),
            Arc::new(embedder),
            Chunker::new(64, 8),
        );
        (registry, processor)
    }

    #[tokio::test]
    async fn transient_embedding_failures_are_retried_within_budget() {
        let embedder = FlakyEmbedder::new(DeterministicEmbedder::new("m1", 16), RETRY_BUDGET);
        let (registry, processor) = processor_with(embedder, InMemoryVectorIndex::new()).await;

        let user = UserId::new("u1");
        let doc_id = DocumentId::new("d1");
        processor.process(&user, &doc_id).await.unwrap();

        let document = registry.get(&user, &doc_id).await.unwrap();
        assert!(matches!(document.status, DocumentStatus::Processed));
    }

    #[tokio::test]
    async fn embedding_failures_beyond_budget_fail_the_attempt() {
        let embedder =
            FlakyEmbedder::new(DeterministicEmbedder::new("m1", 16), RETRY_BUDGET + 1);
        let (registry, processor) = processor_with(embedder, InMemoryVectorIndex::new()).await;

        let user = UserId::new("u1");
        let doc_id = DocumentId::new("d1");
        assert!(processor.process(&user, &doc_id).await.is_err());

        let document = registry.get(&user, &doc_id).await.unwrap();
        assert!(matches!(document.status, DocumentStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn transient_upsert_failures_are_retried_within_budget() {
        let index = FlakyVectorIndex::new(InMemoryVectorIndex::new(), RETRY_BUDGET);
        let (registry, processor) =
            processor_with(DeterministicEmbedder::new("m1", 16), index).await;

        let user = UserId::new("u1");
        let doc_id = DocumentId::new("d1");
        processor.process(&user, &doc_id).await.unwrap();

        let document = registry.get(&user, &doc_id).await.unwrap();
        assert!(matches!(document.status, DocumentStatus::Processed));
    }

    #[tokio::test]
    async fn fatal_index_error_fails_immediately_without_retrying() {
        struct AlwaysFailsIndex;

        #[async_trait::async_trait]
        impl VectorIndex for AlwaysFailsIndex {
            async fn upsert(&self, _vectors: Vec<VectorRecord>) -> Result<(), VectorIndexError> {
                Err(VectorIndexError::Backend("permanent outage".to_string()))
            }

            async fn query(
                &self,
                _values: &[f32],
                _top_k: usize,
                _filter: &VectorFilter,
            ) -> Result<Vec<storage::vector_index::VectorHit>, VectorIndexError> {
                Ok(Vec::new())
            }

            async fn delete_by_filter(&self, _filter: &VectorFilter) -> Result<(), VectorIndexError> {
                Ok(())
            }
        }

        let (registry, processor) =
            processor_with(DeterministicEmbedder::new("m1", 16), AlwaysFailsIndex).await;

        let user = UserId::new("u1");
        let doc_id = DocumentId::new("d1");
        assert!(processor.process(&user, &doc_id).await.is_err());

        let document = registry.get(&user, &doc_id).await.unwrap();
        assert!(matches!(document.status, DocumentStatus::Failed { attempt: 1 }));
    }
}
