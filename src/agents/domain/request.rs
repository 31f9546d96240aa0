//! Coordination request types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConversationContext;

/// Execution strategy governing how supporting outputs reach the primary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationMode {
    /// One agent at a time, each seeing the previous output
    Sequential,
    /// Independent fan-out, primary afterwards
    Parallel,
    /// Fan-out framed as consultations
    Collaborative,
    /// Knowledge retrieval first, then collaborative fan-out
    #[default]
    EnhancedCollaborative,
}

impl CoordinationMode {
    pub const ALL: [CoordinationMode; 4] = [
        CoordinationMode::Sequential,
        CoordinationMode::Parallel,
        CoordinationMode::Collaborative,
        CoordinationMode::EnhancedCollaborative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinationMode::Sequential => "sequential",
            CoordinationMode::Parallel => "parallel",
            CoordinationMode::Collaborative => "collaborative",
            CoordinationMode::EnhancedCollaborative => "enhanced_collaborative",
        }
    }
}

impl std::fmt::Display for CoordinationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CoordinationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sequential" => Ok(CoordinationMode::Sequential),
            "parallel" => Ok(CoordinationMode::Parallel),
            "collaborative" => Ok(CoordinationMode::Collaborative),
            "enhanced_collaborative" | "enhanced" => Ok(CoordinationMode::EnhancedCollaborative),
            other => Err(format!(
                "unknown coordination mode '{}' (expected one of: sequential, parallel, collaborative, enhanced_collaborative)",
                other
            )),
        }
    }
}

/// One user turn to coordinate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationRequest {
    /// Free-text query
    pub query: String,
    /// Explicit primary agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_agent_id: Option<String>,
    /// Explicit supporting agents, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supporting_agent_ids: Vec<String>,
    /// Execution strategy
    #[serde(default)]
    pub mode: CoordinationMode,
    /// Base context (history, scope, pre-fetched sources)
    pub context: ConversationContext,
    /// Overall deadline for the call; config default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Duration>,
    /// References for the external document fetcher
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_references: Vec<String>,
}

impl CoordinationRequest {
    /// Create a request; the base context's query is set to `query`
    pub fn new(
        query: impl Into<String>,
        mode: CoordinationMode,
        context: ConversationContext,
    ) -> Self {
        let query = query.into();
        let context = context.with_query(query.clone());
        Self {
            query,
            primary_agent_id: None,
            supporting_agent_ids: Vec::new(),
            mode,
            context,
            deadline: None,
            document_references: Vec::new(),
        }
    }

    pub fn with_primary(mut self, agent_id: impl Into<String>) -> Self {
        self.primary_agent_id = Some(agent_id.into());
        self
    }

    pub fn with_supporting<I, S>(mut self, agent_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supporting_agent_ids = agent_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document_references = references.into_iter().map(Into::into).collect();
        self
    }
}

/// Agents chosen for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSelection {
    /// Agent whose output is the answer
    pub primary: String,
    /// Supporting agents in dispatch order; never contains `primary`
    pub supporting: Vec<String>,
}

impl AgentSelection {
    pub fn new(primary: impl Into<String>, supporting: Vec<String>) -> Self {
        Self {
            primary: primary.into(),
            supporting,
        }
    }

    /// Every selected agent, supporting first
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.supporting
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.primary.as_str()))
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.primary == agent_id || self.supporting.iter().any(|s| s == agent_id)
    }
}
