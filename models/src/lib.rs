pub mod chat_model;
pub mod embedder;

pub use chat_model::{ChatModel, ChatModelError, ChatRequest, ChatResponse, DeterministicChatModel};
pub use embedder::{DeterministicEmbedder, Embedder, EmbeddingError, FlakyEmbedder};
