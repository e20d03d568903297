pub mod orchestrator;
pub mod retrieval;

pub use orchestrator::{
    classify_intent, ChatAnswer, HealthDataPoint, Intent, QueryError, QueryOrchestrator, SourceRef,
};
pub use retrieval::{RetrievalError, RetrievalService, RetrievedChunk};
