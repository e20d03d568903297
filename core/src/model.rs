use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChunkId, DocumentId, UserId};
use crate::metric_types::MetricType;

/// A single stored health reading. Identity is `(user_id, type, timestamp)`
/// (spec.md §4.1) — a second `put` at the same key overwrites the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetric {
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
    pub source: Option<String>,
}

impl HealthMetric {
    /// `value` must be finite and `unit` must match the type's registered unit
    /// (spec.md §4.1 "Validation").
    pub fn validate(&self) -> Result<(), String> {
        if !self.value.is_finite() {
            return Err("value must be finite".to_string());
        }
        if self.unit != self.metric_type.unit() {
            return Err(format!(
                "unit {:?} does not match registered unit {:?} for {}",
                self.unit,
                self.metric_type.unit(),
                self.metric_type
            ));
        }
        Ok(())
    }
}

/// Raw shape of a composite reading as submitted by a caller, before it is
/// expanded into its component `HealthMetric` rows (spec.md §3, §9 redesign
/// flag: "represent composite input as a tagged union, not two positional
/// floats, so malformed composites are rejected at the type boundary").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompositeMetricInput {
    BloodPressure { systolic: f64, diastolic: f64 },
    BloodGlucose { fasting: f64, postprandial: f64 },
}

impl CompositeMetricInput {
    /// Expands into the two `(MetricType, value)` component readings this
    /// composite stores as, in a fixed order.
    pub fn components(&self) -> [(MetricType, f64); 2] {
        match self {
            CompositeMetricInput::BloodPressure { systolic, diastolic } => [
                (MetricType::BloodPressureSystolic, *systolic),
                (MetricType::BloodPressureDiastolic, *diastolic),
            ],
            CompositeMetricInput::BloodGlucose { fasting, postprandial } => [
                (MetricType::BloodGlucoseFasting, *fasting),
                (MetricType::BloodGlucosePostprandial, *postprandial),
            ],
        }
    }
}

/// Lifecycle state of an uploaded document (spec.md §4.2). `Processing` and
/// `Failed` carry the attempt count so a caller can tell a fresh upload from a
/// retried one without a second lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Processing { attempt: u32 },
    Processed,
    Failed { attempt: u32 },
}

impl DocumentStatus {
    pub fn attempts(&self) -> u32 {
        match self {
            DocumentStatus::Uploaded | DocumentStatus::Processed => 0,
            DocumentStatus::Processing { attempt } | DocumentStatus::Failed { attempt } => {
                *attempt
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Processed)
    }
}

/// A document's registry record. Identity is `(user_id, document_id)`
/// (spec.md §4.2). Content itself lives in the blob store, addressed by
/// `blob_key`; this record is the queryable metadata and state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: DocumentId,
    pub user_id: UserId,
    pub title: String,
    pub file_name: String,
    pub file_type: String,
    pub content_type: String,
    pub file_size: u64,
    pub blob_key: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub upload_time: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub status: DocumentStatus,
    pub chunk_count: u32,
    pub processing_attempts: u32,
    pub last_processing_attempt: Option<DateTime<Utc>>,
    pub indexed_in_index: bool,
    pub error_message: Option<String>,
}

/// One chunk of extracted document text, embedded and stored in the vector
/// index (spec.md §3, §4.5, §4.7). `chunk_index` is the chunk's position
/// within its document's ordered chunk sequence, used to reconstruct order
/// and to compute expected byte overlap in tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub user_id: UserId,
    pub chunk_index: u32,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Fields carried alongside a chunk's vector so retrieval (spec.md §4.9) can
/// cite a source document without a join back to the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_title: String,
    pub category: Option<String>,
    pub file_type: String,
    pub upload_time: DateTime<Utc>,
}
