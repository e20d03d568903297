use async_trait::async_trait;
use dashmap::DashMap;
use healthsync_core::ids::{ChunkId, DocumentId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum VectorIndexError {
    #[error("query or delete issued without a user_id filter")]
    MissingUserFilter,
    /// A transient failure — throttling, a dropped connection, a 5xx from
    /// the index provider. Callers should retry this with backoff (spec.md
    /// §5) rather than failing the processing attempt immediately.
    #[error("vector index is transiently unavailable: {0}")]
    Transient(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl VectorIndexError {
    /// The retryable-vs-fatal distinction spec.md §5 requires the index
    /// adapter to expose.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VectorIndexError::Transient(_))
    }
}

impl healthsync_core::error::HasErrorKind for VectorIndexError {
    fn error_kind(&self) -> healthsync_core::error::ErrorKind {
        use healthsync_core::error::ErrorKind;
        match self {
            VectorIndexError::MissingUserFilter => ErrorKind::InvalidInput,
            VectorIndexError::Transient(_) => ErrorKind::Backend,
            VectorIndexError::Backend(_) => ErrorKind::Backend,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: ChunkId,
    pub values: Vec<f32>,
    pub user_id: UserId,
    pub document_id: DocumentId,
    pub metadata: VectorMetadata,
}

#[derive(Debug, Clone)]
pub struct VectorMetadata {
    pub chunk_index: u32,
    pub content: String,
    pub document_title: String,
    pub document_category: Option<String>,
    pub document_file_type: String,
    pub upload_time: chrono::DateTime<chrono::Utc>,
}

/// `user_id` is mandatory on every filter — it is the enforcement point for
/// cross-user isolation in the index (spec.md §4.7). `document_id` narrows
/// further for per-document operations like deletion.
#[derive(Debug, Clone)]
pub struct VectorFilter {
    pub user_id: UserId,
    pub document_id: Option<DocumentId>,
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: ChunkId,
    pub score: f32,
    pub record: VectorRecord,
}

/// Upsert, filtered kNN, and filtered delete over the vector index (spec.md
/// §4.7). Every `query`/`delete_by_filter` call MUST carry a `user_id`
/// filter — `VectorFilter` makes that unrepresentable-to-skip at the type
/// level.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, vectors: Vec<VectorRecord>) -> Result<(), VectorIndexError>;

    async fn query(
        &self,
        values: &[f32],
        top_k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorHit>, VectorIndexError>;

    async fn delete_by_filter(&self, filter: &VectorFilter) -> Result<(), VectorIndexError>;
}

/// In-memory fake standing in for the external vector database.
pub struct InMemoryVectorIndex {
    records: DashMap<ChunkId, VectorRecord>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn matches_filter(record: &VectorRecord, filter: &VectorFilter) -> bool {
    if record.user_id != filter.user_id {
        return false;
    }
    if let Some(doc_id) = &filter.document_id {
        if &record.document_id != doc_id {
            return false;
        }
    }
    true
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, vectors: Vec<VectorRecord>) -> Result<(), VectorIndexError> {
        for record in vectors {
            self.records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query(
        &self,
        values: &[f32],
        top_k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorHit>, VectorIndexError> {
        let mut hits: Vec<VectorHit> = self
            .records
            .iter()
            .filter(|entry| matches_filter(entry.value(), filter))
            .map(|entry| {
                let record = entry.value().clone();
                let score = cosine_similarity(values, &record.values);
                VectorHit {
                    id: record.id.clone(),
                    score,
                    record,
                }
            })
            .collect();

        // descending score, id as deterministic tiebreak (spec.md §4.9).
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_by_filter(&self, filter: &VectorFilter) -> Result<(), VectorIndexError> {
        let to_remove: Vec<ChunkId> = self
            .records
            .iter()
            .filter(|entry| matches_filter(entry.value(), filter))
            .map(|entry| entry.key().clone())
            .collect();
        for id in to_remove {
            self.records.remove(&id);
        }
        Ok(())
    }
}

/// Test/development fake that fails `upsert` transiently a fixed number of
/// times before delegating to an inner index — used to exercise the
/// processing orchestrator's retry-with-backoff wrapper (spec.md §5).
pub struct FlakyVectorIndex<I: VectorIndex> {
    inner: I,
    remaining_failures: std::sync::atomic::AtomicU32,
}

impl<I: VectorIndex> FlakyVectorIndex<I> {
    pub fn new(inner: I, failures: u32) -> Self {
        Self {
            inner,
            remaining_failures: std::sync::atomic::AtomicU32::new(failures),
        }
    }

    fn take_failure(&self) -> bool {
        self.remaining_failures
            .fetch_update(
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
                |n| if n > 0 { Some(n - 1) } else { None },
            )
            .is_ok()
    }
}

#[async_trait]
impl<I: VectorIndex> VectorIndex for FlakyVectorIndex<I> {
    async fn upsert(&self, vectors: Vec<VectorRecord>) -> Result<(), VectorIndexError> {
        if self.take_failure() {
            return Err(VectorIndexError::Transient("simulated outage".to_string()));
        }
        self.inner.upsert(vectors).await
    }

    async fn query(
        &self,
        values: &[f32],
        top_k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorHit>, VectorIndexError> {
        self.inner.query(values, top_k, filter).await
    }

    async fn delete_by_filter(&self, filter: &VectorFilter) -> Result<(), VectorIndexError> {
        self.inner.delete_by_filter(filter).await
    }
}
