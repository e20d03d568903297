use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use healthsync_core::error::{CoreError, HasErrorKind};
use healthsync_core::ids::{DocumentId, UserId};
use healthsync_core::metric_types::{CompositeKind, MetricType};
use healthsync_core::model::{CompositeMetricInput, Document, DocumentStatus, HealthMetric};
use ingestion::chunker::Chunker;
use jobs::{ChannelJobQueue, DocumentProcessor, Job, JobQueue, WorkerPool};
use models::{ChatModel, DeterministicChatModel, DeterministicEmbedder, Embedder};
use query::{ChatAnswer, QueryOrchestrator, RetrievalService, RetrievedChunk};
use storage::blob_store::{BlobStore, InMemoryBlobStore};
use storage::document_registry::{DocumentRegistry, InMemoryDocumentRegistry, MAX_ATTEMPTS};
use storage::metric_store::{InMemoryMetricStore, MetricStore};
use storage::vector_index::{InMemoryVectorIndex, VectorIndex};
use tokio::sync::mpsc;

/// Knobs from spec.md §6, carried rather than hardcoded so callers can tune a
/// backend instance without touching its wiring.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_file_size: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub worker_pool_size: usize,
    pub processing_task_deadline: Duration,
    pub request_chat_deadline: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            max_file_size: 50 * 1024 * 1024,
            max_tokens: 512,
            temperature: 0.2,
            worker_pool_size: 4,
            processing_task_deadline: Duration::from_secs(5 * 60),
            request_chat_deadline: Duration::from_secs(30),
        }
    }
}

/// Facade over the ingestion-to-retrieval pipeline and query orchestrator —
/// one method per HTTP operation in spec.md §6. Construction wires the
/// in-memory store fakes and spawns the bounded worker pool; a production
/// caller would substitute real store adapters behind the same traits.
pub struct HealthBackend {
    metrics: Arc<dyn MetricStore>,
    registry: Arc<dyn DocumentRegistry>,
    blobs: Arc<dyn BlobStore>,
    index: Arc<dyn VectorIndex>,
    queue: Arc<dyn JobQueue>,
    processor: Arc<DocumentProcessor>,
    retrieval: Arc<RetrievalService>,
    orchestrator: QueryOrchestrator,
    config: BackendConfig,
}

impl HealthBackend {
    pub fn new(config: BackendConfig) -> Self {
        let metrics: Arc<dyn MetricStore> = Arc::new(InMemoryMetricStore::new());
        let registry: Arc<dyn DocumentRegistry> = Arc::new(InMemoryDocumentRegistry::new());
        let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        let index: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::new());
        let embedder: Arc<dyn Embedder> = Arc::new(DeterministicEmbedder::default());
        let chat: Arc<dyn ChatModel> = Arc::new(DeterministicChatModel::new());

        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap);
        let processor = Arc::new(DocumentProcessor::new(
            registry.clone(),
            blobs.clone(),
            index.clone(),
            embedder.clone(),
            chunker,
        ));

        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: Arc<dyn JobQueue> = Arc::new(ChannelJobQueue::new(sender));

        let pool = Arc::new(WorkerPool::new(
            config.worker_pool_size,
            processor.clone(),
            registry.clone(),
            config.processing_task_deadline,
        ));
        tokio::spawn(pool.run(receiver));

        let retrieval = Arc::new(RetrievalService::new(embedder, index.clone()));
        let orchestrator = QueryOrchestrator::new(
            metrics.clone(),
            retrieval.clone(),
            chat,
            config.max_tokens,
            config.temperature,
            config.request_chat_deadline,
        );

        Self {
            metrics,
            registry,
            blobs,
            index,
            queue,
            processor,
            retrieval,
            orchestrator,
            config,
        }
    }

    pub async fn post_metric(
        &self,
        user_id: &UserId,
        metric_type: MetricType,
        value: f64,
        unit: String,
        notes: Option<String>,
        source: Option<String>,
    ) -> Result<HealthMetric, CoreError> {
        let metric = HealthMetric {
            user_id: user_id.clone(),
            metric_type,
            value,
            unit,
            timestamp: Utc::now(),
            notes,
            source,
        };
        metric
            .validate()
            .map_err(CoreError::invalid_input)?;

        self.metrics
            .put(metric.clone())
            .await
            .map_err(to_core_error)?;
        Ok(metric)
    }

    /// Writes both component samples of a composite reading, all-or-nothing
    /// from the caller's view (spec.md §5). `blood_pressure` additionally
    /// requires `systolic > diastolic`.
    pub async fn post_composite_metric(
        &self,
        user_id: &UserId,
        kind: CompositeKind,
        input: CompositeMetricInput,
        unit_overrides: Option<(String, String)>,
    ) -> Result<[HealthMetric; 2], CoreError> {
        if let (CompositeKind::BloodPressure, CompositeMetricInput::BloodPressure { systolic, diastolic }) =
            (kind, &input)
        {
            if systolic <= *diastolic {
                return Err(CoreError::invalid_input(
                    "systolic must exceed diastolic",
                ));
            }
        }

        let timestamp = Utc::now();
        let components = input.components();
        let (unit_a, unit_b) = unit_overrides.unwrap_or_else(|| {
            (
                components[0].0.unit().to_string(),
                components[1].0.unit().to_string(),
            )
        });

        let metrics = [
            HealthMetric {
                user_id: user_id.clone(),
                metric_type: components[0].0,
                value: components[0].1,
                unit: unit_a,
                timestamp,
                notes: None,
                source: None,
            },
            HealthMetric {
                user_id: user_id.clone(),
                metric_type: components[1].0,
                value: components[1].1,
                unit: unit_b,
                timestamp,
                notes: None,
                source: None,
            },
        ];

        for metric in &metrics {
            metric.validate().map_err(CoreError::invalid_input)?;
        }

        // All-or-nothing from the client's view: the first failure aborts
        // before the second write is attempted (spec.md §5, §9 open question
        // leaves durability to the implementer; this defines the observable
        // contract).
        for metric in &metrics {
            self.metrics
                .put(metric.clone())
                .await
                .map_err(to_core_error)?;
        }

        Ok(metrics)
    }

    pub async fn range_metrics(
        &self,
        user_id: &UserId,
        metric_type: MetricType,
        start: Option<chrono::DateTime<Utc>>,
        end: Option<chrono::DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<HealthMetric>, CoreError> {
        self.metrics
            .range(user_id, metric_type, start, end, limit)
            .await
            .map_err(to_core_error)
    }

    pub async fn latest_metrics(&self, user_id: &UserId) -> Result<Vec<HealthMetric>, CoreError> {
        self.metrics.latest_all(user_id).await.map_err(to_core_error)
    }

    pub async fn delete_metric(
        &self,
        user_id: &UserId,
        metric_type: MetricType,
        timestamp: chrono::DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.metrics
            .delete(user_id, metric_type, timestamp)
            .await
            .map_err(to_core_error)
    }

    /// Returns once the blob is stored and the document row created;
    /// processing itself runs on the background worker pool.
    pub async fn upload_document(
        &self,
        user_id: &UserId,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
        title: String,
        category: Option<String>,
        description: Option<String>,
        tags: Vec<String>,
    ) -> Result<Document, CoreError> {
        if bytes.len() as u64 > self.config.max_file_size {
            return Err(CoreError::invalid_input("file exceeds max_file_size"));
        }

        let document_id = DocumentId::new_v4();
        let blob_key = format!("{}/{}/{}", user_id, document_id, file_name);

        self.blobs
            .put(&blob_key, bytes.clone(), &content_type)
            .await
            .map_err(to_core_error)?;

        let document = Document {
            document_id: document_id.clone(),
            user_id: user_id.clone(),
            title,
            file_name: file_name.clone(),
            file_type: file_name.rsplit('.').next().unwrap_or("").to_string(),
            content_type,
            file_size: bytes.len() as u64,
            blob_key,
            category,
            description,
            tags,
            upload_time: Utc::now(),
            processed_at: None,
            status: DocumentStatus::Uploaded,
            chunk_count: 0,
            processing_attempts: 0,
            last_processing_attempt: None,
            indexed_in_index: false,
            error_message: None,
        };

        self.registry
            .create(document.clone())
            .await
            .map_err(to_core_error)?;

        self.queue
            .enqueue(Job::ProcessDocument {
                user_id: user_id.clone(),
                document_id,
            })
            .await
            .map_err(|_| CoreError::backend("processing queue is closed"))?;

        Ok(document)
    }

    pub async fn list_documents(&self, user_id: &UserId) -> Result<Vec<Document>, CoreError> {
        self.registry.list(user_id).await.map_err(to_core_error)
    }

    pub async fn get_document(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<Document, CoreError> {
        self.registry
            .get(user_id, document_id)
            .await
            .map_err(to_core_error)
    }

    pub async fn delete_document(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<(), CoreError> {
        // Existence check first so a missing document reports NotFound
        // rather than silently succeeding — callers need 404, not 200, to
        // avoid papering over a wrong document_id.
        self.registry.get(user_id, document_id).await.map_err(to_core_error)?;
        self.processor.delete_document(user_id, document_id).await;
        Ok(())
    }

    /// Only valid for `failed` documents with `attempts < MAX_ATTEMPTS`
    /// (spec.md §6); anything else is a `Conflict`.
    pub async fn retry_document(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<(), CoreError> {
        let document = self.registry.get(user_id, document_id).await.map_err(to_core_error)?;
        let eligible = matches!(document.status, DocumentStatus::Failed { attempt } if attempt < MAX_ATTEMPTS);
        if !eligible {
            return Err(CoreError::conflict(
                "document is not in a retryable state",
            ));
        }

        self.queue
            .enqueue(Job::ProcessDocument {
                user_id: user_id.clone(),
                document_id: document_id.clone(),
            })
            .await
            .map_err(|_| CoreError::backend("processing queue is closed"))?;
        Ok(())
    }

    pub async fn view_document(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
        ttl_secs: u64,
    ) -> Result<(String, String, String), CoreError> {
        let document = self.registry.get(user_id, document_id).await.map_err(to_core_error)?;
        let url = self
            .blobs
            .presign_get(&document.blob_key, ttl_secs)
            .await
            .map_err(to_core_error)?;
        Ok((url, document.content_type, document.file_name))
    }

    pub async fn search_documents(
        &self,
        user_id: &UserId,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, CoreError> {
        self.retrieval
            .search(user_id, query_text, top_k)
            .await
            .map_err(to_core_error)
    }

    pub async fn chat(&self, user_id: &UserId, message: &str) -> Result<ChatAnswer, CoreError> {
        self.orchestrator
            .answer(user_id, message)
            .await
            .map_err(to_core_error)
    }
}

fn to_core_error<E: HasErrorKind>(err: E) -> CoreError {
    let message = err.to_string();
    CoreError::new(err.error_kind(), message)
}
