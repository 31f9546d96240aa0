//! Offline provider that answers with the last user message

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmProvider, TokenUsage};
use crate::agents::domain::Role;
use crate::agents::error::{LlmError, LlmResult};

/// Deterministic provider for dry runs and local testing
pub struct EchoProvider {
    model: String,
}

impl EchoProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .ok_or_else(|| LlmError::InvalidRequest("no user message to echo".to_string()))?;

        let prompt_chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
        let content = format!("[{}] {}", self.model, last_user.content);

        let mut response = CompletionResponse::text(content);
        response.usage = Some(TokenUsage {
            prompt_tokens: (prompt_chars / 4) as u32,
            completion_tokens: (response.message.content.len() / 4) as u32,
            total_tokens: ((prompt_chars + response.message.content.len()) / 4) as u32,
        });
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::domain::Message;

    #[tokio::test]
    async fn test_echoes_last_user_message() {
        let provider = EchoProvider::new("echo-1");
        let request = CompletionRequest {
            messages: vec![
                Message::system("sys"),
                Message::user("first"),
                Message::assistant("reply"),
                Message::user("second"),
            ],
            ..Default::default()
        };
        let response = provider.complete(request).await.unwrap();
        assert_eq!(response.message.content, "[echo-1] second");
    }

    #[tokio::test]
    async fn test_requires_user_message() {
        let provider = EchoProvider::new("echo-1");
        let result = provider.complete(CompletionRequest::default()).await;
        assert!(matches!(result, Err(LlmError::InvalidRequest(_))));
    }
}
