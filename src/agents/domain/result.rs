//! Invocation results, interaction traces and the aggregated response

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ToolCallRecord;
use crate::agents::error::FailureKind;

/// Edge source used when the coordinator itself dispatches an agent
pub const COORDINATOR: &str = "coordinator";

/// Terminal status of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Ok,
    Timeout,
    Error,
}

impl std::fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvocationStatus::Ok => write!(f, "ok"),
            InvocationStatus::Timeout => write!(f, "timeout"),
            InvocationStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one agent invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutcome {
    /// The agent answered
    Ok { content: String },
    /// The deadline expired; no partial content is kept
    Timeout,
    /// The call failed or was never attempted
    Error { kind: FailureKind },
}

/// Result of one agent invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInvocationResult {
    /// Invoked agent
    pub agent_id: String,
    /// What happened
    #[serde(flatten)]
    pub outcome: AgentOutcome,
    /// Tool calls reported by the provider
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Wall-clock latency in milliseconds
    pub latency_ms: u64,
    /// Provider attempts made (0 when the call was never issued)
    #[serde(default)]
    pub attempts: u32,
}

impl AgentInvocationResult {
    pub fn ok(agent_id: impl Into<String>, content: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            agent_id: agent_id.into(),
            outcome: AgentOutcome::Ok {
                content: content.into(),
            },
            tool_calls: Vec::new(),
            latency_ms,
            attempts: 1,
        }
    }

    pub fn timeout(agent_id: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            agent_id: agent_id.into(),
            outcome: AgentOutcome::Timeout,
            tool_calls: Vec::new(),
            latency_ms,
            attempts: 1,
        }
    }

    pub fn error(agent_id: impl Into<String>, kind: FailureKind, latency_ms: u64) -> Self {
        Self {
            agent_id: agent_id.into(),
            outcome: AgentOutcome::Error { kind },
            tool_calls: Vec::new(),
            latency_ms,
            attempts: 1,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCallRecord>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn status(&self) -> InvocationStatus {
        match self.outcome {
            AgentOutcome::Ok { .. } => InvocationStatus::Ok,
            AgentOutcome::Timeout => InvocationStatus::Timeout,
            AgentOutcome::Error { .. } => InvocationStatus::Error,
        }
    }

    /// Content of a successful invocation
    pub fn content(&self) -> Option<&str> {
        match &self.outcome {
            AgentOutcome::Ok { content } => Some(content),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, AgentOutcome::Ok { .. })
    }

    pub fn failure_kind(&self) -> Option<&FailureKind> {
        match &self.outcome {
            AgentOutcome::Error { kind } => Some(kind),
            _ => None,
        }
    }
}

/// Directed edge: `from`'s output (or dispatch) reached `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEdge {
    pub from: String,
    pub to: String,
}

impl InteractionEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Edge for a dispatch issued by the coordinator
    pub fn dispatch(to: impl Into<String>) -> Self {
        Self::new(COORDINATOR, to)
    }
}

/// Something the engine decided or absorbed during a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceNote {
    /// Sequential chain was longer than the configured cap
    ChainCapExceeded { cap: usize, dropped: Vec<String> },
    /// No time was left to invoke the agent
    DeadlineExhausted { agent_id: String },
    /// Knowledge retrieval failed or timed out; no snippets were used
    RetrievalUnavailable { reason: String },
    /// An external document could not be fetched
    FetchFailed { reference: String, reason: String },
}

/// Ordered record of one coordination call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionTrace {
    /// Identifier of the coordination call
    #[serde(default)]
    pub run_id: String,
    /// When the call started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Invocation results in the order they were recorded
    #[serde(default)]
    pub results: Vec<AgentInvocationResult>,
    /// Consultation edges
    #[serde(default)]
    pub edges: Vec<InteractionEdge>,
    /// Engine notes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<TraceNote>,
}

impl InteractionTrace {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn result_for(&self, agent_id: &str) -> Option<&AgentInvocationResult> {
        self.results.iter().find(|r| r.agent_id == agent_id)
    }

    /// Agents that were actually invoked (or recorded as timed out)
    pub fn invoked_agents(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.agent_id.as_str()).collect()
    }

    /// Agents dropped by a chain cap, if any
    pub fn dropped_agents(&self) -> Vec<&str> {
        self.notes
            .iter()
            .filter_map(|n| match n {
                TraceNote::ChainCapExceeded { dropped, .. } => Some(dropped),
                _ => None,
            })
            .flatten()
            .map(String::as_str)
            .collect()
    }
}

/// A supporting agent that did not contribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedAgent {
    pub agent_id: String,
    pub status: InvocationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

/// Metadata for a response assembled despite supporting-agent failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationDegraded {
    pub failed: Vec<DegradedAgent>,
}

impl AggregationDegraded {
    /// Ids of the agents that did not contribute
    pub fn failed_agents(&self) -> Vec<&str> {
        self.failed.iter().map(|d| d.agent_id.as_str()).collect()
    }

    /// One-line footnote for rendering under the response
    pub fn footnote(&self) -> String {
        let parts: Vec<String> = self
            .failed
            .iter()
            .map(|d| match &d.kind {
                Some(kind) => format!("{} ({}: {})", d.agent_id, d.status, kind),
                None => format!("{} ({})", d.agent_id, d.status),
            })
            .collect();
        format!("Unavailable supporting capabilities: {}", parts.join(", "))
    }
}

/// Terminal artifact of a successful coordination call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResponse {
    /// Agent whose content is the answer
    pub primary_agent_id: String,
    /// The answer
    pub primary_content: String,
    /// Everything that happened
    pub interactions: InteractionTrace,
    /// Agents whose invocation succeeded, primary included
    pub participating_agents: BTreeSet<String>,
    /// Present when one or more supporting agents failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degradation: Option<AggregationDegraded>,
}

impl AggregatedResponse {
    pub fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }
}
