use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use healthsync_core::ids::UserId;
use healthsync_core::metric_types::MetricType;
use models::{ChatModel, ChatRequest};
use storage::metric_store::MetricStore;
use tracing::warn;

use crate::retrieval::RetrievalService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    HealthQuery,
    DocumentQuery,
    TrendAnalysis,
    Recommendation,
    General,
}

/// Deterministic keyword classifier (spec.md §4.10 step 1). A hint, not a
/// gate: every downstream branch still runs whatever its own intent set
/// calls for, regardless of which single intent wins here.
pub fn classify_intent(message: &str) -> Intent {
    let lower = message.to_lowercase();

    const TREND_WORDS: &[&str] = &["trend", "over time", "compared to", "progress", "history"];
    const RECOMMENDATION_WORDS: &[&str] = &["should i", "recommend", "advice", "suggest"];
    const DOCUMENT_WORDS: &[&str] = &["document", "report", "lab result", "file", "upload"];
    const HEALTH_WORDS: &[&str] = &[
        "heart rate", "blood pressure", "weight", "glucose", "steps", "sleep", "temperature",
    ];

    if TREND_WORDS.iter().any(|w| lower.contains(w)) {
        Intent::TrendAnalysis
    } else if RECOMMENDATION_WORDS.iter().any(|w| lower.contains(w)) {
        Intent::Recommendation
    } else if DOCUMENT_WORDS.iter().any(|w| lower.contains(w)) {
        Intent::DocumentQuery
    } else if HEALTH_WORDS.iter().any(|w| lower.contains(w)) {
        Intent::HealthQuery
    } else {
        Intent::General
    }
}

fn wants_health_context(intent: Intent) -> bool {
    matches!(
        intent,
        Intent::HealthQuery | Intent::TrendAnalysis | Intent::Recommendation | Intent::General
    )
}

fn wants_document_context(intent: Intent) -> bool {
    matches!(
        intent,
        Intent::DocumentQuery | Intent::General | Intent::Recommendation
    )
}

#[derive(Debug, Clone)]
pub struct SourceRef {
    pub document_id: String,
    pub chunk_id: String,
    pub content: String,
    pub relevance: f32,
}

#[derive(Debug, Clone)]
pub struct HealthDataPoint {
    pub metric_type: MetricType,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    pub is_normal: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub message: String,
    pub sources: Vec<SourceRef>,
    pub health_data: Vec<HealthDataPoint>,
    pub tokens_used: u32,
    pub processing_time_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("chat call timed out")]
    Timeout,
    #[error("chat model error: {0}")]
    Chat(String),
}

impl healthsync_core::error::HasErrorKind for QueryError {
    fn error_kind(&self) -> healthsync_core::error::ErrorKind {
        use healthsync_core::error::ErrorKind;
        match self {
            QueryError::Timeout => ErrorKind::Timeout,
            QueryError::Chat(_) => ErrorKind::ChatError,
        }
    }
}

const RETRIEVAL_TOP_K: usize = 5;
const MAX_PROMPT_SOURCES: usize = 3;
const SOURCE_TRUNCATE_CHARS: usize = 200;

pub struct QueryOrchestrator {
    metrics: Arc<dyn MetricStore>,
    retrieval: Arc<RetrievalService>,
    chat: Arc<dyn ChatModel>,
    max_tokens: u32,
    temperature: f32,
    chat_deadline: Duration,
}

impl QueryOrchestrator {
    pub fn new(
        metrics: Arc<dyn MetricStore>,
        retrieval: Arc<RetrievalService>,
        chat: Arc<dyn ChatModel>,
        max_tokens: u32,
        temperature: f32,
        chat_deadline: Duration,
    ) -> Self {
        Self {
            metrics,
            retrieval,
            chat,
            max_tokens,
            temperature,
            chat_deadline,
        }
    }

    pub async fn answer(
        &self,
        user_id: &UserId,
        user_message: &str,
    ) -> Result<ChatAnswer, QueryError> {
        let started = std::time::Instant::now();
        let intent = classify_intent(user_message);

        // The 30s deadline covers the chat call AND everything it depends on
        // (spec.md §5: "30s for chat, inherited for its prerequisites") — a
        // hung health-store or embedder/index call during context assembly
        // must surface as a `Timeout`, not block the request indefinitely.
        let response = tokio::time::timeout(self.chat_deadline, async {
            // Step 2: parallel context assembly where independent.
            let (health_context, retrieved) = tokio::join!(
                self.maybe_fetch_health(user_id, intent),
                self.maybe_search_documents(user_id, user_message, intent)
            );

            // Step 3: prompt assembly.
            let prompt = build_prompt(user_message, &health_context, &retrieved);

            // Step 4: chat call, sharing the same deadline as its prerequisites.
            let request = ChatRequest {
                prompt,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            };
            let response = self
                .chat
                .complete(request)
                .await
                .map_err(|e| QueryError::Chat(e.to_string()))?;

            Ok::<_, QueryError>((response, health_context, retrieved))
        })
        .await
        .map_err(|_| QueryError::Timeout)??;

        let (response, health_context, retrieved) = response;

        // Step 5: response enrichment.
        let sources: Vec<SourceRef> = retrieved
            .iter()
            .take(MAX_PROMPT_SOURCES)
            .map(|chunk| SourceRef {
                document_id: chunk.document_id.to_string(),
                chunk_id: chunk.chunk_id.clone(),
                content: chunk.content.clone(),
                relevance: chunk.score,
            })
            .collect();

        let health_data: Vec<HealthDataPoint> = health_context
            .iter()
            .map(|m| HealthDataPoint {
                metric_type: m.metric_type,
                value: m.value,
                unit: m.unit.clone(),
                timestamp: m.timestamp,
                is_normal: m.metric_type.is_normal(m.value),
            })
            .collect();

        Ok(ChatAnswer {
            message: response.text,
            sources,
            health_data,
            tokens_used: response.tokens_used,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn maybe_fetch_health(
        &self,
        user_id: &UserId,
        intent: Intent,
    ) -> Vec<healthsync_core::model::HealthMetric> {
        if !wants_health_context(intent) {
            return Vec::new();
        }
        match self.metrics.latest_all(user_id).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(%e, "health context assembly failed, proceeding without it");
                Vec::new()
            }
        }
    }

    async fn maybe_search_documents(
        &self,
        user_id: &UserId,
        message: &str,
        intent: Intent,
    ) -> Vec<crate::retrieval::RetrievedChunk> {
        if !wants_document_context(intent) {
            return Vec::new();
        }
        match self.retrieval.search(user_id, message, RETRIEVAL_TOP_K).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(%e, "document context assembly failed, proceeding without it");
                Vec::new()
            }
        }
    }
}

fn build_prompt(
    user_message: &str,
    health_context: &[healthsync_core::model::HealthMetric],
    retrieved: &[crate::retrieval::RetrievedChunk],
) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a personal health assistant. Answer using only the context provided below.\n\n",
    );

    prompt.push_str("Health context:\n");
    for m in health_context {
        prompt.push_str(&format!(
            "{}: {} {} (at {})\n",
            m.metric_type,
            m.value,
            m.unit,
            m.timestamp.to_rfc3339()
        ));
    }

    prompt.push_str("\nRetrieved context:\n");
    for chunk in retrieved.iter().take(MAX_PROMPT_SOURCES) {
        let truncated: String = chunk.content.chars().take(SOURCE_TRUNCATE_CHARS).collect();
        prompt.push_str(&truncated);
        prompt.push('\n');
    }

    prompt.push_str("\nUser message:\n");
    prompt.push_str(user_message);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_trend_keywords() {
        assert_eq!(
            classify_intent("show me my weight trend over time"),
            Intent::TrendAnalysis
        );
    }

    #[test]
    fn classifies_document_keywords() {
        assert_eq!(
            classify_intent("what does my lab result say"),
            Intent::DocumentQuery
        );
    }

    #[test]
    fn classifies_health_keywords() {
        assert_eq!(classify_intent("what was my heart rate today"), Intent::HealthQuery);
    }

    #[test]
    fn falls_back_to_general_intent() {
        assert_eq!(classify_intent("hello there"), Intent::General);
    }

    #[test]
    fn general_intent_wants_both_contexts() {
        assert!(wants_health_context(Intent::General));
        assert!(wants_document_context(Intent::General));
    }

    #[test]
    fn health_query_does_not_search_documents() {
        assert!(!wants_document_context(Intent::HealthQuery));
    }
}
