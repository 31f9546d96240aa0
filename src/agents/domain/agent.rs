//! Agent domain types

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Well-known capability tags
pub mod capabilities {
    /// Agent supplies retrieved knowledge snippets
    pub const KNOWLEDGE_RETRIEVAL: &str = "knowledge_retrieval";
    /// Agent consumes fetched wiki/issue-tracker documents
    pub const EXTERNAL_DOCUMENTS: &str = "external_documents";
}

/// Cost/latency tier of the model backing an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Cheaper, lower-latency model
    Fast,
    /// Default model
    #[default]
    Standard,
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelTier::Fast => write!(f, "fast"),
            ModelTier::Standard => write!(f, "standard"),
        }
    }
}

/// Immutable description of a registered agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Unique agent id
    pub id: String,
    /// Human-readable role shown in prompts and traces
    pub display_role: String,
    /// Capability tags
    #[serde(default)]
    pub capability_tags: BTreeSet<String>,
    /// Whether this agent supplies retrieved knowledge
    #[serde(default)]
    pub supports_retrieval: bool,
    /// Model tier
    #[serde(default)]
    pub model_tier: ModelTier,
}

impl AgentDescriptor {
    /// Create a descriptor with no capability tags
    pub fn new(id: impl Into<String>, display_role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_role: display_role.into(),
            capability_tags: BTreeSet::new(),
            supports_retrieval: false,
            model_tier: ModelTier::Standard,
        }
    }

    /// Add a capability tag
    pub fn with_capability(mut self, tag: impl Into<String>) -> Self {
        self.capability_tags.insert(tag.into());
        self
    }

    /// Mark the agent as the knowledge-retrieval capability
    pub fn with_retrieval(mut self) -> Self {
        self.supports_retrieval = true;
        self.capability_tags
            .insert(capabilities::KNOWLEDGE_RETRIEVAL.to_string());
        self
    }

    /// Set the model tier
    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.model_tier = tier;
        self
    }

    /// Check for a capability tag
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capability_tags.contains(tag)
    }

    /// Whether fetched external documents belong in this agent's context
    pub fn consumes_external_documents(&self) -> bool {
        self.has_capability(capabilities::EXTERNAL_DOCUMENTS)
    }
}
