use async_trait::async_trait;
use healthsync_core::embedding::deterministic_embedding;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request timed out")]
    Timeout,
    /// A transient failure — rate limiting, a dropped connection, a 5xx from
    /// the model provider. Callers should retry this with backoff (spec.md
    /// §4.6, §5) rather than failing the processing attempt immediately.
    #[error("embedding model is transiently unavailable: {0}")]
    Transient(String),
    #[error("embedding model error after retry budget exhausted: {0}")]
    Exhausted(String),
}

impl EmbeddingError {
    /// The retryable-vs-fatal distinction spec.md §5 requires the embedder to
    /// expose. `Exhausted` is itself the terminal error surfaced once a
    /// retry budget has already run out, so it is never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmbeddingError::Timeout | EmbeddingError::Transient(_))
    }
}

impl healthsync_core::error::HasErrorKind for EmbeddingError {
    fn error_kind(&self) -> healthsync_core::error::ErrorKind {
        use healthsync_core::error::ErrorKind;
        match self {
            EmbeddingError::Timeout => ErrorKind::Timeout,
            EmbeddingError::Transient(_) => ErrorKind::Backend,
            EmbeddingError::Exhausted(_) => ErrorKind::EmbeddingError,
        }
    }
}

/// Batched text-to-vector embedding (spec.md §4.6). `D` is fixed per
/// configured model; every vector written to the index shares that `D`.
/// Rate limiting is the embedder's own responsibility — callers pass full
/// batches and accept backpressure rather than throttling themselves.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dims(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Test/development fake standing in for the external embedding model
/// (spec.md §1). Deterministic so fixtures are reproducible: the same text
/// under the same model id always embeds to the same vector.
pub struct DeterministicEmbedder {
    model_id: String,
    dims: usize,
}

impl DeterministicEmbedder {
    pub fn new(model_id: impl Into<String>, dims: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dims: dims.max(1),
        }
    }
}

impl Default for DeterministicEmbedder {
    fn default() -> Self {
        Self::new("embedding-default-v1", 768)
    }
}

#[async_trait]
impl Embedder for DeterministicEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(deterministic_embedding(text, &self.model_id, self.dims))
    }
}

/// Test/development fake that fails transiently a fixed number of times
/// before delegating to an inner embedder — used to exercise the processing
/// orchestrator's retry-with-backoff wrapper (spec.md §5).
pub struct FlakyEmbedder<E: Embedder> {
    inner: E,
    remaining_failures: std::sync::atomic::AtomicU32,
}

impl<E: Embedder> FlakyEmbedder<E> {
    pub fn new(inner: E, failures: u32) -> Self {
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
impl<E: Embedder> Embedder for FlakyEmbedder<E> {
    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.take_failure() {
            return Err(EmbeddingError::Transient("simulated outage".to_string()));
        }
        self.inner.embed(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_retryable_distinguishes_transient_from_exhausted() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::Transient("boom".to_string()).is_retryable());
        assert!(!EmbeddingError::Exhausted("boom".to_string()).is_retryable());
    }

    #[tokio::test]
    async fn embed_batch_preserves_order_and_dims() {
        let embedder = DeterministicEmbedder::new("m1", 16);
        let out = embedder
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 16);
        assert_ne!(out[0], out[1]);
    }

    #[tokio::test]
    async fn embed_is_reproducible() {
        let embedder = DeterministicEmbedder::new("m1", 16);
        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("hello").await.unwrap();
        assert_eq!(a, b);
    }
}
