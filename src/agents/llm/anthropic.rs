//! Anthropic messages provider

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{error_from_response, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, TokenUsage};
use crate::agents::config::LlmProviderConfig;
use crate::agents::domain::{Message, Role, ToolCallRecord};
use crate::agents::error::{LlmError, LlmResult};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic LLM Provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
}

impl AnthropicProvider {
    pub fn new(config: &LlmProviderConfig, api_key: SecretString) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.anthropic.com".to_string());

        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            default_temperature: config.temperature,
            default_max_tokens: config.max_tokens,
        }
    }

    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let (system_prompt, messages) = convert_messages(&request.messages);

        let mut body = json!({
            "model": request.model.as_ref().unwrap_or(&self.model),
            "messages": messages,
            "max_tokens": request.max_tokens.or(self.default_max_tokens).unwrap_or(4096),
        });

        if let Some(system) = system_prompt {
            body["system"] = json!(system);
        }

        if let Some(temp) = request.temperature.or(self.default_temperature) {
            body["temperature"] = json!(temp);
        }

        if let Some(stop) = &request.stop {
            body["stop_sequences"] = json!(stop);
        }

        body
    }
}

/// Convert internal messages to Anthropic format
///
/// Returns (system_prompt, messages). System messages are concatenated into
/// the top-level `system` field; consecutive same-role turns are merged since
/// the API requires alternation.
fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut turns: Vec<(&'static str, String)> = Vec::new();

    for m in messages {
        let role = match m.role {
            Role::System => {
                system_parts.push(&m.content);
                continue;
            }
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let text = match &m.name {
            Some(name) => format!("[{}] {}", name, m.content),
            None => m.content.clone(),
        };
        match turns.last_mut() {
            Some((last_role, last_text)) if *last_role == role => {
                last_text.push_str("\n\n");
                last_text.push_str(&text);
            }
            _ => turns.push((role, text)),
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };

    let converted = turns
        .into_iter()
        .map(|(role, content)| json!({ "role": role, "content": content }))
        .collect();

    (system, converted)
}

fn parse_response(response: &AnthropicResponse) -> LlmResult<CompletionResponse> {
    let mut content = String::new();
    let mut tool_calls = Vec::new();

    for block in &response.content {
        match block.block_type.as_str() {
            "text" => {
                if let Some(text) = &block.text {
                    content.push_str(text);
                }
            }
            "tool_use" => {
                if let (Some(id), Some(name), Some(input)) = (&block.id, &block.name, &block.input) {
                    tool_calls.push(ToolCallRecord::new(id.clone(), name.clone(), input.clone()));
                }
            }
            _ => {}
        }
    }

    let finish_reason = match response.stop_reason.as_deref() {
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        Some("refusal") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    };

    if finish_reason == FinishReason::ContentFilter && content.is_empty() {
        return Err(LlmError::ContentFiltered);
    }

    let usage = Some(TokenUsage {
        prompt_tokens: response.usage.input_tokens,
        completion_tokens: response.usage.output_tokens,
        total_tokens: response.usage.input_tokens + response.usage.output_tokens,
    });

    Ok(CompletionResponse {
        message: Message::assistant(content),
        tool_calls,
        finish_reason,
        usage,
    })
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        let body = self.build_request_body(&request);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to parse response: {}", e)))?;

        parse_response(&anthropic_response)
    }
}

// Anthropic API response types

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
    id: Option<String>,
    name: Option<String>,
    input: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
