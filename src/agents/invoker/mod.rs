//! Agent invocation
//!
//! `AgentInvoker::invoke` never fails: every outcome, including a missing
//! provider or an expired deadline, comes back as an `AgentInvocationResult`.

mod prompt;
mod retry;

pub use prompt::{render_system_prompt, PromptBuilder};
pub use retry::RetryPolicy;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::adapters::metrics::MetricsCollector;
use crate::agents::domain::{AgentInvocationResult, ConversationContext};
use crate::agents::error::{FailureKind, LlmError};
use crate::agents::llm::{CompletionResponse, LlmProvider};
use crate::agents::registry::{ProviderHandle, RegisteredAgent};

/// Calls one agent's provider under a hard deadline
#[derive(Clone, Default)]
pub struct AgentInvoker {
    prompts: PromptBuilder,
    retry: RetryPolicy,
    metrics: Option<Arc<MetricsCollector>>,
}

impl AgentInvoker {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            prompts: PromptBuilder::new(),
            retry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Invoke `agent` with `context`, giving up after `timeout`
    pub async fn invoke(
        &self,
        agent: &RegisteredAgent,
        context: &ConversationContext,
        timeout: Duration,
    ) -> AgentInvocationResult {
        let agent_id = agent.descriptor.id.as_str();
        let result = match &agent.provider {
            ProviderHandle::NotConfigured(reason) => {
                debug!(agent = %agent_id, reason = %reason, "Agent not configured, skipping call");
                AgentInvocationResult::error(
                    agent_id,
                    FailureKind::NotConfigured {
                        reason: reason.clone(),
                    },
                    0,
                )
                .with_attempts(0)
            }
            ProviderHandle::Ready(provider) => {
                self.call(agent_id, provider.as_ref(), agent, context, timeout)
                    .await
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_invocation(&result);
        }
        result
    }

    async fn call(
        &self,
        agent_id: &str,
        provider: &dyn LlmProvider,
        agent: &RegisteredAgent,
        context: &ConversationContext,
        timeout: Duration,
    ) -> AgentInvocationResult {
        let request = self.prompts.build(agent, context);
        let started = Instant::now();
        let deadline = started + timeout;
        let mut attempts: u32 = 0;

        debug!(
            agent = %agent_id,
            provider = provider.name(),
            model = provider.model(),
            timeout_ms = timeout.as_millis() as u64,
            "Invoking agent"
        );

        let outcome = tokio::time::timeout_at(deadline, async {
            loop {
                attempts += 1;
                match provider.complete(request.clone()).await {
                    Ok(response) => return Ok::<CompletionResponse, LlmError>(response),
                    Err(e) if e.is_retryable() && self.retry.allows_retry(attempts) => {
                        let delay = self.retry.delay(attempts - 1, e.retry_after_ms());
                        if Instant::now() + delay >= deadline {
                            return Err(e);
                        }
                        warn!(agent = %agent_id, attempt = attempts, error = %e, delay_ms = delay.as_millis() as u64, "Retrying agent call");
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
        .await;

        let latency_ms = started.elapsed().as_millis() as u64;
        let result = match outcome {
            Ok(Ok(response)) => AgentInvocationResult::ok(agent_id, response.message.content, latency_ms)
                .with_tool_calls(response.tool_calls),
            Ok(Err(e)) => {
                warn!(agent = %agent_id, error = %e, "Agent call failed");
                AgentInvocationResult::error(agent_id, FailureKind::from(&e), latency_ms)
            }
            Err(_) => {
                warn!(agent = %agent_id, timeout_ms = timeout.as_millis() as u64, "Agent call timed out");
                AgentInvocationResult::timeout(agent_id, latency_ms)
            }
        };
        result.with_attempts(attempts)
    }
}
