//! Error types for the coordination engine
//!
//! Failures of individual agents are values (`FailureKind` inside an
//! `AgentOutcome`), not errors. The types here cover the edges where a call
//! really is rejected: selection, a failed primary agent, provider transport,
//! and registry construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agents::domain::InteractionTrace;

/// Errors raised while building the registry or handling configuration
#[derive(Debug, Error)]
pub enum AgentError {
    /// Agent not found
    #[error("Agent not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors specific to LLM provider operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// API error
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication error
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Content filtered
    #[error("Content filtered by safety system")]
    ContentFiltered,

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Timeout reported by the transport
    #[error("Request timed out")]
    Timeout,
}

impl LlmError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } | LlmError::Network(_) | LlmError::Timeout => true,
            LlmError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Suggested wait before the next attempt, if the provider sent one
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            LlmError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_connect() {
            LlmError::Network(format!("Connection error: {}", err))
        } else if err.is_decode() {
            LlmError::Parse(err.to_string())
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Serialization(err.to_string())
    }
}

/// Rejection raised by the agent selector before any invocation
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectionError {
    /// An explicitly requested agent is not registered
    #[error("unknown agent: {agent_id}")]
    UnknownAgent { agent_id: String },

    /// Neither the rules nor the configured defaults name a registered agent
    #[error("no registered agent can act as primary for this query")]
    NoEligiblePrimary,
}

/// Classification of a failed agent invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureKind {
    /// The provider registry has no usable client for the agent
    NotConfigured { reason: String },
    /// Provider rejected the call for rate limiting
    RateLimited,
    /// Credentials were rejected
    Authentication,
    /// Non-success status from the provider API
    Api { status: u16, message: String },
    /// Transport failure
    Network { message: String },
    /// The provider answered with something we could not interpret
    MalformedResponse { message: String },
    /// Output withheld by the provider's safety system
    ContentFiltered,
    /// The request itself was invalid
    InvalidRequest { message: String },
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::NotConfigured { reason } => write!(f, "not configured: {}", reason),
            FailureKind::RateLimited => write!(f, "rate limited"),
            FailureKind::Authentication => write!(f, "authentication failed"),
            FailureKind::Api { status, message } => write!(f, "api error {}: {}", status, message),
            FailureKind::Network { message } => write!(f, "network error: {}", message),
            FailureKind::MalformedResponse { message } => write!(f, "malformed response: {}", message),
            FailureKind::ContentFiltered => write!(f, "content filtered"),
            FailureKind::InvalidRequest { message } => write!(f, "invalid request: {}", message),
        }
    }
}

impl From<&LlmError> for FailureKind {
    fn from(err: &LlmError) -> Self {
        match err {
            LlmError::Api { status, message } => FailureKind::Api {
                status: *status,
                message: message.clone(),
            },
            LlmError::RateLimited { .. } => FailureKind::RateLimited,
            LlmError::Authentication(_) => FailureKind::Authentication,
            LlmError::Network(message) => FailureKind::Network {
                message: message.clone(),
            },
            LlmError::Parse(message) => FailureKind::MalformedResponse {
                message: message.clone(),
            },
            LlmError::ContentFiltered => FailureKind::ContentFiltered,
            LlmError::InvalidRequest(message) => FailureKind::InvalidRequest {
                message: message.clone(),
            },
            LlmError::Timeout => FailureKind::Network {
                message: "transport timeout".to_string(),
            },
        }
    }
}

/// Why a coordination call produced no response
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// Selection rejected the request
    #[error("agent selection failed: {0}")]
    Selection(SelectionError),

    /// The primary agent did not answer within its deadline
    #[error("primary agent '{agent_id}' timed out")]
    Timeout { agent_id: String },

    /// The primary agent has no configured provider
    #[error("primary agent '{agent_id}' is not configured: {reason}")]
    NotConfigured { agent_id: String, reason: String },

    /// The primary agent's provider call failed
    #[error("primary agent '{agent_id}' failed: {kind}")]
    ProviderError { agent_id: String, kind: FailureKind },
}

/// A coordination call that could not produce a primary response
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("coordination failed: {reason}")]
pub struct CoordinationFailure {
    /// What went wrong
    pub reason: FailureReason,
    /// Everything that ran before the failure
    pub partial_trace: InteractionTrace,
}

impl CoordinationFailure {
    /// Failure raised before any agent was invoked
    pub fn selection(err: SelectionError) -> Self {
        Self {
            reason: FailureReason::Selection(err),
            partial_trace: InteractionTrace::default(),
        }
    }

    /// Whether the caller may retry the same request
    ///
    /// Selection errors are validation failures and will fail again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.reason, FailureReason::Selection(_))
    }
}

/// Errors from the external document fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    /// The referenced document does not exist
    #[error("document not found: {0}")]
    NotFound(String),

    /// The fetcher has no usable credentials
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The reference is not something this fetcher understands
    #[error("unsupported reference: {0}")]
    Unsupported(String),

    /// Transport or remote failure
    #[error("fetch failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::RateLimited { retry_after_ms: 10 }.is_retryable());
        assert!(LlmError::Api { status: 503, message: String::new() }.is_retryable());
        assert!(!LlmError::Api { status: 400, message: String::new() }.is_retryable());
        assert!(!LlmError::Authentication("bad key".into()).is_retryable());
    }

    #[test]
    fn test_failure_kind_from_llm_error() {
        let kind = FailureKind::from(&LlmError::Parse("no choices".into()));
        assert_eq!(
            kind,
            FailureKind::MalformedResponse { message: "no choices".into() }
        );
    }

    #[test]
    fn test_selection_failure_not_retryable() {
        let failure = CoordinationFailure::selection(SelectionError::UnknownAgent {
            agent_id: "ghost".into(),
        });
        assert!(!failure.is_retryable());
        assert!(failure.partial_trace.results.is_empty());
    }
}
