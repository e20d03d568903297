use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use healthsync_core::ids::{DocumentId, UserId};
use healthsync_core::model::{Document, DocumentStatus};

pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum DocumentRegistryError {
    #[error("document not found")]
    NotFound,
    #[error("status transition rejected: document is not in the expected state")]
    CasFailed,
    #[error("backend error: {0}")]
    Backend(String),
}

impl healthsync_core::error::HasErrorKind for DocumentRegistryError {
    fn error_kind(&self) -> healthsync_core::error::ErrorKind {
        use healthsync_core::error::ErrorKind;
        match self {
            DocumentRegistryError::NotFound => ErrorKind::NotFound,
            DocumentRegistryError::CasFailed => ErrorKind::Conflict,
            DocumentRegistryError::Backend(_) => ErrorKind::Backend,
        }
    }
}

/// Document metadata store plus the processing state machine (spec.md §4.2).
/// `begin_processing` is the compare-and-set enforcing "at most one active
/// processing task per document_id" (spec.md §5).
#[async_trait]
pub trait DocumentRegistry: Send + Sync {
    async fn create(&self, document: Document) -> Result<(), DocumentRegistryError>;

    async fn get(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<Document, DocumentRegistryError>;

    async fn list(&self, user_id: &UserId) -> Result<Vec<Document>, DocumentRegistryError>;

    /// CAS `uploaded|failed -> processing`. Fails with `CasFailed` if another
    /// worker already owns this document, or the document is not eligible
    /// (`failed` past `MAX_ATTEMPTS`).
    async fn begin_processing(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<u32, DocumentRegistryError>;

    async fn mark_processed(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
        chunk_count: u32,
    ) -> Result<(), DocumentRegistryError>;

    async fn mark_failed(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
        error_message: String,
    ) -> Result<(), DocumentRegistryError>;

    async fn delete(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<(), DocumentRegistryError>;
}

/// In-memory fake for the document registry (spec.md §1, external collaborator).
pub struct InMemoryDocumentRegistry {
    documents: DashMap<(UserId, DocumentId), Document>,
}

impl InMemoryDocumentRegistry {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }
}

impl Default for InMemoryDocumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentRegistry for InMemoryDocumentRegistry {
    async fn create(&self, document: Document) -> Result<(), DocumentRegistryError> {
        let key = (document.user_id.clone(), document.document_id.clone());
        self.documents.insert(key, document);
        Ok(())
    }

    async fn get(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<Document, DocumentRegistryError> {
        self.documents
            .get(&(user_id.clone(), document_id.clone()))
            .map(|d| d.clone())
            .ok_or(DocumentRegistryError::NotFound)
    }

    async fn list(&self, user_id: &UserId) -> Result<Vec<Document>, DocumentRegistryError> {
        Ok(self
            .documents
            .iter()
            .filter(|entry| &entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn begin_processing(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<u32, DocumentRegistryError> {
        let mut entry = self
            .documents
            .get_mut(&(user_id.clone(), document_id.clone()))
            .ok_or(DocumentRegistryError::NotFound)?;

        let eligible = matches!(entry.status, DocumentStatus::Uploaded)
            || matches!(entry.status, DocumentStatus::Failed { attempt } if attempt < MAX_ATTEMPTS);
        if !eligible {
            return Err(DocumentRegistryError::CasFailed);
        }

        let attempt = entry.processing_attempts + 1;
        entry.status = DocumentStatus::Processing { attempt };
        entry.processing_attempts = attempt;
        entry.last_processing_attempt = Some(Utc::now());
        Ok(attempt)
    }

    async fn mark_processed(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
        chunk_count: u32,
    ) -> Result<(), DocumentRegistryError> {
        let mut entry = self
            .documents
            .get_mut(&(user_id.clone(), document_id.clone()))
            .ok_or(DocumentRegistryError::NotFound)?;

        if !matches!(entry.status, DocumentStatus::Processing { .. }) {
            return Err(DocumentRegistryError::CasFailed);
        }

        entry.status = DocumentStatus::Processed;
        entry.chunk_count = chunk_count;
        entry.indexed_in_index = true;
        entry.processed_at = Some(Utc::now());
        entry.error_message = None;
        Ok(())
    }

    async fn mark_failed(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
        error_message: String,
    ) -> Result<(), DocumentRegistryError> {
        let mut entry = self
            .documents
            .get_mut(&(user_id.clone(), document_id.clone()))
            .ok_or(DocumentRegistryError::NotFound)?;

        let attempt = entry.processing_attempts;
        entry.status = DocumentStatus::Failed { attempt };
        entry.error_message = Some(error_message);
        Ok(())
    }

    async fn delete(
        &self,
        user_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<(), DocumentRegistryError> {
        self.documents
            .remove(&(user_id.clone(), document_id.clone()));
        Ok(())
    }
}
