use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use healthsync_core::ids::UserId;
use healthsync_core::metric_types::MetricType;
use healthsync_core::model::HealthMetric;

#[derive(Debug, thiserror::Error)]
pub enum MetricStoreError {
    #[error("unknown metric type")]
    UnknownType,
    #[error("unit {given:?} does not match registered unit {expected:?}")]
    UnitMismatch { given: String, expected: String },
    #[error("backend error: {0}")]
    Backend(String),
}

impl healthsync_core::error::HasErrorKind for MetricStoreError {
    fn error_kind(&self) -> healthsync_core::error::ErrorKind {
        use healthsync_core::error::ErrorKind;
        match self {
            MetricStoreError::UnknownType | MetricStoreError::UnitMismatch { .. } => {
                ErrorKind::InvalidInput
            }
            MetricStoreError::Backend(_) => ErrorKind::Backend,
        }
    }
}

/// Append-only per-user time series keyed by `(user_id, type, timestamp)`.
#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn put(&self, metric: HealthMetric) -> Result<(), MetricStoreError>;

    async fn range(
        &self,
        user_id: &UserId,
        metric_type: MetricType,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<HealthMetric>, MetricStoreError>;

    async fn latest_all(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<HealthMetric>, MetricStoreError>;

    async fn delete(
        &self,
        user_id: &UserId,
        metric_type: MetricType,
        timestamp: DateTime<Utc>,
    ) -> Result<(), MetricStoreError>;
}

/// Sort key giving descending-timestamp order with a deterministic
/// insertion-order tiebreak for equal timestamps (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey {
    timestamp: DateTime<Utc>,
    seq: u64,
}

#[derive(Default)]
struct UserMetrics {
    // keyed by type, then by timestamp -> (metric, insertion seq)
    by_type: std::collections::HashMap<MetricType, BTreeMap<DateTime<Utc>, (HealthMetric, u64)>>,
}

/// In-memory fake standing in for the external metric store (spec.md §1: "the
/// core depends only on their capability interfaces"). Exercised by the
/// pipeline and orchestrator tests in this workspace.
pub struct InMemoryMetricStore {
    users: DashMap<UserId, UserMetrics>,
    seq: std::sync::atomic::AtomicU64,
}

impl InMemoryMetricStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for InMemoryMetricStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricStore for InMemoryMetricStore {
    async fn put(&self, metric: HealthMetric) -> Result<(), MetricStoreError> {
        if metric.unit != metric.metric_type.unit() {
            return Err(MetricStoreError::UnitMismatch {
                given: metric.unit.clone(),
                expected: metric.metric_type.unit().to_string(),
            });
        }

        let seq = self.next_seq();
        let mut entry = self.users.entry(metric.user_id.clone()).or_default();
        let by_ts = entry.by_type.entry(metric.metric_type).or_default();

        // put is idempotent on the exact key: reuse the existing sequence number
        // if this is a repeat write so ordering doesn't change underfoot.
        let existing_seq = by_ts.get(&metric.timestamp).map(|(_, s)| *s);
        by_ts.insert(
            metric.timestamp,
            (metric, existing_seq.unwrap_or(seq)),
        );
        Ok(())
    }

    async fn range(
        &self,
        user_id: &UserId,
        metric_type: MetricType,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<HealthMetric>, MetricStoreError> {
        let Some(entry) = self.users.get(user_id) else {
            return Ok(Vec::new());
        };
        let Some(by_ts) = entry.by_type.get(&metric_type) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<&(HealthMetric, u64)> = by_ts
            .iter()
            .filter(|(ts, _)| start.map_or(true, |s| **ts >= s) && end.map_or(true, |e| **ts <= e))
            .map(|(_, v)| v)
            .collect();

        // newest first; equal timestamps break ties by insertion order (later
        // insertion sorts first, matching "most recently known" semantics).
        rows.sort_by(|a, b| b.0.timestamp.cmp(&a.0.timestamp).then(b.1.cmp(&a.1)));

        let mut out: Vec<HealthMetric> = rows.into_iter().map(|(m, _)| m.clone()).collect();
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn latest_all(&self, user_id: &UserId) -> Result<Vec<HealthMetric>, MetricStoreError> {
        let Some(entry) = self.users.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(entry.by_type.len());
        for by_ts in entry.by_type.values() {
            if let Some((_, (metric, _))) = by_ts.iter().max_by(|a, b| {
                a.0.cmp(b.0).then(a.1 .1.cmp(&b.1 .1))
            }) {
                out.push(metric.clone());
            }
        }
        Ok(out)
    }

    async fn delete(
        &self,
        user_id: &UserId,
        metric_type: MetricType,
        timestamp: DateTime<Utc>,
    ) -> Result<(), MetricStoreError> {
        if let Some(mut entry) = self.users.get_mut(user_id) {
            if let Some(by_ts) = entry.by_type.get_mut(&metric_type) {
                by_ts.remove(&timestamp);
            }
        }
        Ok(())
    }
}
