use std::sync::Arc;

use healthsync_core::ids::{DocumentId, UserId};
use models::Embedder;
use storage::vector_index::{VectorFilter, VectorIndex};

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("index error: {0}")]
    Index(String),
}

impl healthsync_core::error::HasErrorKind for RetrievalError {
    fn error_kind(&self) -> healthsync_core::error::ErrorKind {
        use healthsync_core::error::ErrorKind;
        match self {
            RetrievalError::Embedding(_) => ErrorKind::EmbeddingError,
            RetrievalError::Index(_) => ErrorKind::Backend,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub document_id: DocumentId,
    pub chunk_id: String,
    pub content: String,
    pub score: f32,
}

/// User-scoped semantic search over the vector index (spec.md §4.9).
pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl RetrievalService {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub async fn search(
        &self,
        user_id: &UserId,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let embedding = self
            .embedder
            .embed(query_text)
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        let filter = VectorFilter {
            user_id: user_id.clone(),
            document_id: None,
        };
        let hits = self
            .index
            .query(&embedding, top_k, &filter)
            .await
            .map_err(|e| RetrievalError::Index(e.to_string()))?;

        Ok(hits
            .into_iter()
            // defense in depth: the index already filters by user_id, but a
            // result whose record doesn't echo it back is dropped rather than
            // trusted (spec.md §4.9 step 3).
            .filter(|hit| &hit.record.user_id == user_id)
            .map(|hit| RetrievedChunk {
                document_id: hit.record.document_id,
                chunk_id: hit.id.to_string(),
                content: hit.record.metadata.content,
                score: hit.score,
            })
            .collect())
    }

    pub async fn delete_document_vectors(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<(), RetrievalError> {
        self.index
            .delete_by_filter(&VectorFilter {
                user_id: user_id.clone(),
                document_id: Some(document_id.clone()),
            })
            .await
            .map_err(|e| RetrievalError::Index(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::embedder::DeterministicEmbedder;
    use storage::vector_index::{InMemoryVectorIndex, VectorMetadata, VectorRecord};

    async fn seeded_service() -> (RetrievalService, Arc<InMemoryVectorIndex>) {
        let index = Arc::new(InMemoryVectorIndex::new());
        let embedder: Arc<dyn Embedder> = Arc::new(DeterministicEmbedder::new("m1", 16));

        let content = "patient has a history of hypertension";
        let embedding = embedder.embed(content).await.unwrap();
        index
            .upsert(vec![VectorRecord {
                id: healthsync_core::ids::ChunkId::new_v4(),
                values: embedding,
                user_id: UserId::new("u1"),
                document_id: DocumentId::new("d1"),
                metadata: VectorMetadata {
                    chunk_index: 0,
                    content: content.to_string(),
                    document_title: "Visit notes".to_string(),
                    document_category: None,
                    document_file_type: "txt".to_string(),
                    upload_time: chrono::Utc::now(),
                },
            }])
            .await
            .unwrap();

        (RetrievalService::new(embedder, index.clone()), index)
    }

    #[tokio::test]
    async fn search_returns_the_matching_user_scoped_chunk() {
        let (service, _index) = seeded_service().await;
        let hits = service
            .search(&UserId::new("u1"), "patient has a history of hypertension", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, DocumentId::new("d1"));
    }

    #[tokio::test]
    async fn search_returns_nothing_for_a_different_user() {
        let (service, _index) = seeded_service().await;
        let hits = service
            .search(&UserId::new("u2"), "patient has a history of hypertension", 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
