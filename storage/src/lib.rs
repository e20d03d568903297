pub mod blob_store;
pub mod document_registry;
pub mod metric_store;
pub mod vector_index;

pub use blob_store::{BlobStore, BlobStoreError, InMemoryBlobStore};
pub use document_registry::{DocumentRegistry, DocumentRegistryError, InMemoryDocumentRegistry};
pub use metric_store::{InMemoryMetricStore, MetricStore, MetricStoreError};
pub use vector_index::{InMemoryVectorIndex, VectorIndex, VectorIndexError};
