use std::time::Duration;

use healthsync_core::error::ErrorKind;
use healthsync_core::ids::UserId;
use healthsync_core::metric_types::{CompositeKind, MetricType};
use healthsync_core::model::{CompositeMetricInput, DocumentStatus};
use healthsync_sdk::{BackendConfig, HealthBackend};

async fn wait_for_processed(
    backend: &HealthBackend,
    user_id: &UserId,
    document_id: &healthsync_core::ids::DocumentId,
) -> healthsync_core::model::Document {
    for _ in 0..200 {
        let document = backend.get_document(user_id, document_id).await.unwrap();
        if matches!(
            document.status,
            DocumentStatus::Processed | DocumentStatus::Failed { .. }
        ) {
            return document;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("document never reached a terminal processing state");
}

/// Like `wait_for_processed`, but also waits for `processing_attempts` to
/// reach `target_attempt` — needed after a retry, since a document sitting
/// in its prior terminal state (`failed`) is indistinguishable from "the
/// retry hasn't started yet" by status alone.
async fn wait_for_attempt(
    backend: &HealthBackend,
    user_id: &UserId,
    document_id: &healthsync_core::ids::DocumentId,
    target_attempt: u32,
) -> healthsync_core::model::Document {
    for _ in 0..200 {
        let document = backend.get_document(user_id, document_id).await.unwrap();
        if document.processing_attempts >= target_attempt
            && matches!(
                document.status,
                DocumentStatus::Processed | DocumentStatus::Failed { .. }
            )
        {
            return document;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("document never reached the expected processing attempt");
}

#[tokio::test]
async fn simple_metric_write_then_read() {
    let backend = HealthBackend::new(BackendConfig::default());
    let user = UserId::new("u1");

    backend
        .post_metric(
            &user,
            MetricType::HeartRate,
            72.0,
            "bpm".to_string(),
            None,
            None,
        )
        .await
        .unwrap();

    let latest = backend.latest_metrics(&user).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].value, 72.0);

    let rows = backend
        .range_metrics(&user, MetricType::HeartRate, None, None, Some(1))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, 72.0);
}

#[tokio::test]
async fn blood_pressure_composite_writes_both_components_and_rejects_invalid_values() {
    let backend = HealthBackend::new(BackendConfig::default());
    let user = UserId::new("u1");

    backend
        .post_composite_metric(
            &user,
            CompositeKind::BloodPressure,
            CompositeMetricInput::BloodPressure {
                systolic: 120.0,
                diastolic: 80.0,
            },
            None,
        )
        .await
        .unwrap();

    let latest = backend.latest_metrics(&user).await.unwrap();
    let systolic = latest
        .iter()
        .find(|m| m.metric_type == MetricType::BloodPressureSystolic)
        .unwrap();
    let diastolic = latest
        .iter()
        .find(|m| m.metric_type == MetricType::BloodPressureDiastolic)
        .unwrap();
    assert_eq!(systolic.value, 120.0);
    assert_eq!(diastolic.value, 80.0);
    assert_eq!(systolic.timestamp, diastolic.timestamp);

    let err = backend
        .post_composite_metric(
            &user,
            CompositeKind::BloodPressure,
            CompositeMetricInput::BloodPressure {
                systolic: 70.0,
                diastolic: 80.0,
            },
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
}

#[tokio::test]
async fn upload_process_then_search_is_user_scoped() {
    let backend = HealthBackend::new(BackendConfig::default());
    let u1 = UserId::new("u1");
    let u2 = UserId::new("u2");

    let document = backend
        .upload_document(
            &u1,
            "labs.txt".to_string(),
            "text/plain".to_string(),
            b"Cholesterol panel: total cholesterol is elevated at 240 mg/dL.".to_vec(),
            "Labs 2024".to_string(),
            None,
            None,
            Vec::new(),
        )
        .await
        .unwrap();

    let processed = wait_for_processed(&backend, &u1, &document.document_id).await;
    assert!(matches!(processed.status, DocumentStatus::Processed));
    assert!(processed.chunk_count >= 1);
    assert!(processed.indexed_in_index);

    let hits = backend.search_documents(&u1, "cholesterol", 5).await.unwrap();
    assert!(hits.iter().any(|h| h.document_id == document.document_id));

    let other_user_hits = backend.search_documents(&u2, "cholesterol", 5).await.unwrap();
    assert!(other_user_hits.is_empty());
}

#[tokio::test]
async fn retry_cap_marks_document_failed_and_rejects_further_retries() {
    let backend = HealthBackend::new(BackendConfig::default());
    let user = UserId::new("u1");

    // An unsupported mime type makes the decoder fail every attempt, driving
    // the document to `failed` through the retry cap deterministically.
    let document = backend
        .upload_document(
            &user,
            "mystery.bin".to_string(),
            "application/x-not-a-real-format".to_string(),
            b"unparseable".to_vec(),
            "Mystery file".to_string(),
            None,
            None,
            Vec::new(),
        )
        .await
        .unwrap();

    let mut last = wait_for_processed(&backend, &user, &document.document_id).await;
    for _ in 0..2 {
        if matches!(last.status, DocumentStatus::Failed { attempt } if attempt < 3) {
            backend.retry_document(&user, &document.document_id).await.unwrap();
            last = wait_for_processed(&backend, &user, &document.document_id).await;
        }
    }

    assert!(matches!(last.status, DocumentStatus::Failed { attempt: 3 }));
    assert_eq!(last.processing_attempts, 3);

    let err = backend
        .retry_document(&user, &document.document_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}

#[tokio::test]
async fn delete_removes_document_blob_and_vectors() {
    let backend = HealthBackend::new(BackendConfig::default());
    let user = UserId::new("u1");

    let document = backend
        .upload_document(
            &user,
            "notes.txt".to_string(),
            "text/plain".to_string(),
            b"patient reports mild headaches in the morning".to_vec(),
            "Visit notes".to_string(),
            None,
            None,
            Vec::new(),
        )
        .await
        .unwrap();

    wait_for_processed(&backend, &user, &document.document_id).await;
    let hits_before = backend.search_documents(&user, "headaches", 5).await.unwrap();
    assert!(!hits_before.is_empty());

    backend.delete_document(&user, &document.document_id).await.unwrap();

    let hits_after = backend.search_documents(&user, "headaches", 5).await.unwrap();
    assert!(hits_after
        .iter()
        .all(|h| h.document_id != document.document_id));

    let err = backend.get_document(&user, &document.document_id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = backend.view_document(&user, &document.document_id, 60).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn cross_user_isolation_on_search_and_delete() {
    let backend = HealthBackend::new(BackendConfig::default());
    let u1 = UserId::new("u1");
    let u2 = UserId::new("u2");

    let document = backend
        .upload_document(
            &u1,
            "a.txt".to_string(),
            "text/plain".to_string(),
            b"confidential document belonging to user one".to_vec(),
            "Doc A".to_string(),
            None,
            None,
            Vec::new(),
        )
        .await
        .unwrap();

    wait_for_processed(&backend, &u1, &document.document_id).await;

    let hits = backend.search_documents(&u2, "confidential", 5).await.unwrap();
    assert!(hits.iter().all(|h| h.document_id != document.document_id));

    let err = backend
        .delete_document(&u2, &document.document_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}
