//! LLM provider implementations
//!
//! A unified interface over the providers an agent can be backed by:
//! - OpenAI-compatible chat completions
//! - Anthropic messages
//! - Echo (offline, deterministic; for dry runs and local testing)

mod anthropic;
mod echo;
mod openai;

pub use anthropic::AnthropicProvider;
pub use echo::EchoProvider;
pub use openai::OpenAiProvider;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::adapters::credentials::CredentialStore;
use crate::agents::config::{LlmProviderConfig, LlmProviderType};
use crate::agents::domain::{Message, ToolCallRecord};
use crate::agents::error::{LlmError, LlmResult};

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Model being used
    fn model(&self) -> &str;

    /// Complete a request
    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse>;
}

/// Request for LLM completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Messages in the conversation
    pub messages: Vec<Message>,
    /// Model to use (overrides provider default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Temperature for sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// Response from LLM completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated message
    pub message: Message,
    /// Tool calls the model reported
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Reason the completion stopped
    pub finish_reason: FinishReason,
    /// Token usage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Plain text response that stopped naturally
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(content),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: None,
        }
    }
}

/// Reason completion stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop
    Stop,
    /// Hit max tokens
    Length,
    /// Tool call requested
    ToolCalls,
    /// Content filtered
    ContentFilter,
}

/// Token usage information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Map a non-success HTTP status to an `LlmError`
pub(crate) fn error_for_status(status: u16, retry_after: Option<&str>, body: String) -> LlmError {
    match status {
        401 | 403 => LlmError::Authentication(body),
        429 => LlmError::RateLimited {
            retry_after_ms: retry_after
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|secs| (secs * 1000.0) as u64)
                .unwrap_or(1000),
        },
        400 | 404 | 422 => LlmError::InvalidRequest(body),
        _ => LlmError::Api {
            status,
            message: body,
        },
    }
}

/// Read an error response into an `LlmError`
pub(crate) async fn error_from_response(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = response.text().await.unwrap_or_default();
    error_for_status(status, retry_after.as_deref(), body)
}

async fn resolve_api_key(
    config: &LlmProviderConfig,
    default_env: &str,
    credentials: &CredentialStore,
) -> LlmResult<SecretString> {
    let key = config.api_key_env.as_deref().unwrap_or(default_env);
    credentials.get_or_env(key).await.ok_or_else(|| {
        LlmError::Authentication(format!(
            "API key not found in credential store or environment variable {}",
            key
        ))
    })
}

/// Create an LLM provider from configuration
///
/// API keys come from the credential store first, then the environment.
pub async fn create_provider(
    config: &LlmProviderConfig,
    credentials: &CredentialStore,
) -> LlmResult<Arc<dyn LlmProvider>> {
    match config.provider {
        LlmProviderType::OpenAI => {
            let api_key = resolve_api_key(config, "OPENAI_API_KEY", credentials).await?;
            Ok(Arc::new(OpenAiProvider::new(config, api_key)))
        }
        LlmProviderType::Anthropic => {
            let api_key = resolve_api_key(config, "ANTHROPIC_API_KEY", credentials).await?;
            Ok(Arc::new(AnthropicProvider::new(config, api_key)))
        }
        LlmProviderType::Echo => Ok(Arc::new(EchoProvider::new(&config.model))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_for_status() {
        assert!(matches!(
            error_for_status(401, None, "nope".into()),
            LlmError::Authentication(_)
        ));
        assert!(matches!(
            error_for_status(429, Some("2"), String::new()),
            LlmError::RateLimited { retry_after_ms: 2000 }
        ));
        assert!(matches!(
            error_for_status(503, None, String::new()),
            LlmError::Api { status: 503, .. }
        ));
    }

    #[tokio::test]
    async fn test_create_provider_missing_key() {
        let mut config = LlmProviderConfig::new(LlmProviderType::OpenAI, "gpt-4o-mini");
        config.api_key_env = Some("CONSILIUM_TEST_MISSING_OPENAI_KEY".into());
        let store = CredentialStore::new();
        let result = create_provider(&config, &store).await;
        assert!(matches!(result, Err(LlmError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_create_provider_from_store() {
        let mut config = LlmProviderConfig::new(LlmProviderType::Anthropic, "claude-haiku");
        config.api_key_env = Some("CONSILIUM_TEST_ANTHROPIC_KEY".into());
        let store = CredentialStore::new();
        store.set("CONSILIUM_TEST_ANTHROPIC_KEY", "sk-test").await;
        let provider = create_provider(&config, &store).await.unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.model(), "claude-haiku");
    }
}
