use async_trait::async_trait;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum ChatModelError {
    #[error("chat request timed out")]
    Timeout,
    #[error("chat model error: {0}")]
    Failed(String),
}

impl healthsync_core::error::HasErrorKind for ChatModelError {
    fn error_kind(&self) -> healthsync_core::error::ErrorKind {
        use healthsync_core::error::ErrorKind;
        match self {
            ChatModelError::Timeout => ErrorKind::Timeout,
            ChatModelError::Failed(_) => ErrorKind::ChatError,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    pub tokens_used: u32,
}

/// External chat model, invoked once per query with a hard deadline (spec.md
/// §4.10 step 4). The caller (query orchestrator) owns the deadline via
/// `tokio::time::timeout`; this trait itself doesn't impose one so a real
/// adapter can surface its own provider-side timeout as `ChatModelError`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ChatModelError>;
}

/// Test/development fake standing in for the external chat LLM (spec.md §1).
/// Produces a deterministic reply seeded from the prompt so fixtures are
/// reproducible, the same way `deterministic_embedding` stands in for the
/// embedding model.
pub struct DeterministicChatModel;

impl DeterministicChatModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DeterministicChatModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatModel for DeterministicChatModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ChatModelError> {
        let mut hasher = Sha256::new();
        hasher.update(request.prompt.as_bytes());
        let digest = hasher.finalize();
        let fingerprint = hex_prefix(&digest, 8);

        let text = format!("[deterministic-reply:{fingerprint}] acknowledged your message");
        let tokens_used = (request.max_tokens).min(text.split_whitespace().count() as u32);

        Ok(ChatResponse { text, tokens_used })
    }
}

fn hex_prefix(bytes: &[u8], len: usize) -> String {
    bytes
        .iter()
        .take(len)
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_is_deterministic_for_the_same_prompt() {
        let model = DeterministicChatModel::new();
        let request = |prompt: &str| ChatRequest {
            prompt: prompt.to_string(),
            max_tokens: 100,
            temperature: 0.2,
        };
        let a = model.complete(request("hi")).await.unwrap();
        let b = model.complete(request("hi")).await.unwrap();
        assert_eq!(a.text, b.text);
    }

    #[tokio::test]
    async fn complete_differs_for_different_prompts() {
        let model = DeterministicChatModel::new();
        let a = model
            .complete(ChatRequest {
                prompt: "hi".to_string(),
                max_tokens: 100,
                temperature: 0.2,
            })
            .await
            .unwrap();
        let b = model
            .complete(ChatRequest {
                prompt: "bye".to_string(),
                max_tokens: 100,
                temperature: 0.2,
            })
            .await
            .unwrap();
        assert_ne!(a.text, b.text);
    }
}
