//! Configuration types for agents and the coordination engine

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::domain::{AgentDescriptor, CoordinationMode, ModelTier};

/// Configuration for one agent
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Unique agent id
    pub id: String,
    /// Human-readable role
    pub display_role: String,
    /// Capability tags
    #[serde(default)]
    pub capability_tags: Vec<String>,
    /// Whether this agent supplies retrieved knowledge
    #[serde(default)]
    pub supports_retrieval: bool,
    /// Model tier used when no `llm` override is present
    #[serde(default)]
    pub model_tier: ModelTier,
    /// System prompt, rendered with Tera (`{{ role }}`, `{{ scope }}`, `{{ agent_id }}`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Per-agent provider override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmProviderConfig>,
    /// Temperature override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Max tokens override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl AgentConfig {
    pub fn new(id: impl Into<String>, display_role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_role: display_role.into(),
            capability_tags: Vec::new(),
            supports_retrieval: false,
            model_tier: ModelTier::Standard,
            system_prompt: None,
            llm: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Immutable descriptor for the registry
    pub fn descriptor(&self) -> AgentDescriptor {
        let mut descriptor = AgentDescriptor::new(&self.id, &self.display_role)
            .with_tier(self.model_tier);
        for tag in &self.capability_tags {
            descriptor = descriptor.with_capability(tag);
        }
        if self.supports_retrieval {
            descriptor = descriptor.with_retrieval();
        }
        descriptor
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmProviderConfig {
    /// Provider type
    pub provider: LlmProviderType,
    /// Model name/identifier
    pub model: String,
    /// Environment variable (or credential-store key) holding the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Custom base URL (for self-hosted or proxied endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Default temperature for completions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Default max tokens for completions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl LlmProviderConfig {
    pub fn new(provider: LlmProviderType, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            api_key_env: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    /// OpenAI-compatible chat completions
    #[default]
    OpenAI,
    /// Anthropic messages API
    Anthropic,
    /// Offline provider that echoes the prompt back
    Echo,
}

impl std::fmt::Display for LlmProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProviderType::OpenAI => write!(f, "openai"),
            LlmProviderType::Anthropic => write!(f, "anthropic"),
            LlmProviderType::Echo => write!(f, "echo"),
        }
    }
}

/// Physical models backing the two tiers
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ModelsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fast: Option<LlmProviderConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard: Option<LlmProviderConfig>,
}

impl ModelsConfig {
    /// Provider config for a tier; `fast` falls back to `standard`
    pub fn for_tier(&self, tier: ModelTier) -> Option<&LlmProviderConfig> {
        match tier {
            ModelTier::Fast => self.fast.as_ref().or(self.standard.as_ref()),
            ModelTier::Standard => self.standard.as_ref(),
        }
    }
}

/// Deadlines, retries and chain limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoordinationConfig {
    /// Mode used when the caller does not pick one
    #[serde(default)]
    pub default_mode: CoordinationMode,
    /// Deadline for a whole coordination call
    #[serde(default = "default_overall_timeout")]
    pub overall_timeout_secs: f64,
    /// Deadline for one agent invocation; must be below the overall deadline
    #[serde(default = "default_agent_timeout")]
    pub agent_timeout_secs: f64,
    /// Deadline for the knowledge retriever and the document fetcher
    #[serde(default = "default_retrieval_timeout")]
    pub retrieval_timeout_secs: f64,
    /// Agents consulted by a sequential chain, primary included
    #[serde(default = "default_max_chain_length")]
    pub max_chain_length: usize,
    /// Extra attempts for retryable provider errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Share of the overall deadline held back for the primary agent
    #[serde(default = "default_primary_reserve_ratio")]
    pub primary_reserve_ratio: f64,
}

fn default_overall_timeout() -> f64 {
    60.0
}

fn default_agent_timeout() -> f64 {
    30.0
}

fn default_retrieval_timeout() -> f64 {
    5.0
}

fn default_max_chain_length() -> usize {
    5
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    250
}

fn default_primary_reserve_ratio() -> f64 {
    0.5
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            default_mode: CoordinationMode::default(),
            overall_timeout_secs: default_overall_timeout(),
            agent_timeout_secs: default_agent_timeout(),
            retrieval_timeout_secs: default_retrieval_timeout(),
            max_chain_length: default_max_chain_length(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            primary_reserve_ratio: default_primary_reserve_ratio(),
        }
    }
}

impl CoordinationConfig {
    pub fn overall_timeout(&self) -> Duration {
        secs_or(self.overall_timeout_secs, default_overall_timeout())
    }

    pub fn agent_timeout(&self) -> Duration {
        secs_or(self.agent_timeout_secs, default_agent_timeout())
    }

    pub fn retrieval_timeout(&self) -> Duration {
        secs_or(self.retrieval_timeout_secs, default_retrieval_timeout())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Time held back for the primary out of an `overall` budget
    ///
    /// Never more than one agent timeout. Out-of-range ratios use the default.
    pub fn primary_reserve(&self, overall: Duration) -> Duration {
        let ratio = if self.primary_reserve_ratio > 0.0 && self.primary_reserve_ratio < 1.0 {
            self.primary_reserve_ratio
        } else {
            default_primary_reserve_ratio()
        };
        Duration::try_from_secs_f64(overall.as_secs_f64() * ratio)
            .unwrap_or(overall)
            .min(self.agent_timeout())
    }
}

/// Converts seconds to a `Duration`, using `fallback` for negative or non-finite values
fn secs_or(secs: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(secs)
        .or_else(|_| Duration::try_from_secs_f64(fallback))
        .unwrap_or_default()
}

/// Per-category context budgets
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextBudgetConfig {
    /// Turns of history kept in non-enhanced modes
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    /// Turns of history kept in enhanced mode; unset keeps all of it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_history_turns: Option<usize>,
    /// Token cap per history message
    #[serde(default = "default_max_message_tokens")]
    pub max_message_tokens: usize,
    /// Maximum knowledge snippets
    #[serde(default = "default_max_snippets")]
    pub max_snippets: usize,
    /// Combined token budget for knowledge snippets
    #[serde(default = "default_knowledge_tokens")]
    pub knowledge_tokens: usize,
    /// Character cap per external fragment
    #[serde(default = "default_fragment_chars")]
    pub fragment_chars: usize,
    /// Token cap per consultation
    #[serde(default = "default_consultation_tokens")]
    pub consultation_tokens: usize,
    /// Characters per token used for estimates
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f32,
}

fn default_history_turns() -> usize {
    3
}

fn default_max_message_tokens() -> usize {
    500
}

fn default_max_snippets() -> usize {
    5
}

fn default_knowledge_tokens() -> usize {
    400
}

fn default_fragment_chars() -> usize {
    2000
}

fn default_consultation_tokens() -> usize {
    400
}

fn default_chars_per_token() -> f32 {
    4.0
}

impl Default for ContextBudgetConfig {
    fn default() -> Self {
        Self {
            history_turns: default_history_turns(),
            enhanced_history_turns: None,
            max_message_tokens: default_max_message_tokens(),
            max_snippets: default_max_snippets(),
            knowledge_tokens: default_knowledge_tokens(),
            fragment_chars: default_fragment_chars(),
            consultation_tokens: default_consultation_tokens(),
            chars_per_token: default_chars_per_token(),
        }
    }
}

/// Agent selection rules and fallbacks
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectionConfig {
    /// Ordered rule table; empty means the built-in table
    #[serde(default)]
    pub rules: Vec<SelectionRuleConfig>,
    /// Primary used when no rule matches
    #[serde(default = "default_primary")]
    pub default_primary: String,
    /// Supporting agents used when no rule matches
    #[serde(default = "default_supporting")]
    pub default_supporting: Vec<String>,
    /// Knowledge-retrieval agent; first `supports_retrieval` agent when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_agent: Option<String>,
}

fn default_primary() -> String {
    "general".to_string()
}

fn default_supporting() -> Vec<String> {
    vec!["analyst".to_string()]
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default_primary: default_primary(),
            default_supporting: default_supporting(),
            retrieval_agent: None,
        }
    }
}

/// One `(predicate, agent)` rule
///
/// Exactly one predicate kind should be set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SelectionRuleConfig {
    /// Agent included when the predicate matches
    pub agent: String,
    /// Matches when any keyword appears as a word of the query
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Matches when every keyword occurs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_keywords: Vec<String>,
    /// Rhai boolean expression over `query`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

impl SelectionRuleConfig {
    pub fn any_keyword<I, S>(agent: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            agent: agent.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn script(agent: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            script: Some(script.into()),
            ..Default::default()
        }
    }

    /// Number of predicate kinds set on this rule
    pub fn predicate_count(&self) -> usize {
        usize::from(!self.keywords.is_empty())
            + usize::from(!self.all_keywords.is_empty())
            + usize::from(self.script.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_from_yaml() {
        let yaml = r#"
id: research
display_role: Market Researcher
capability_tags: [web]
model_tier: fast
"#;
        let config: AgentConfig = serde_yaml::from_str(yaml).unwrap();
        let descriptor = config.descriptor();
        assert_eq!(descriptor.model_tier, ModelTier::Fast);
        assert!(descriptor.has_capability("web"));
        assert!(!descriptor.supports_retrieval);
    }

    #[test]
    fn test_coordination_defaults() {
        let config: CoordinationConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_chain_length, 5);
        assert_eq!(config.agent_timeout(), Duration::from_secs(30));
        assert!(config.agent_timeout() < config.overall_timeout());
    }

    #[test]
    fn test_primary_reserve() {
        let config = CoordinationConfig::default();
        assert_eq!(config.primary_reserve(Duration::from_millis(200)), Duration::from_millis(100));
        // Capped at one agent timeout
        assert_eq!(config.primary_reserve(Duration::from_secs(600)), Duration::from_secs(30));

        let config = CoordinationConfig {
            primary_reserve_ratio: 7.0,
            ..Default::default()
        };
        assert_eq!(config.primary_reserve(Duration::from_secs(2)), Duration::from_secs(1));
    }

    #[test]
    fn test_enhanced_window_defaults_to_full_history() {
        let budgets: ContextBudgetConfig = toml::from_str("").unwrap();
        assert_eq!(budgets.history_turns, 3);
        assert_eq!(budgets.enhanced_history_turns, None);

        let budgets: ContextBudgetConfig = toml::from_str("enhanced_history_turns = 8").unwrap();
        assert_eq!(budgets.enhanced_history_turns, Some(8));
    }

    #[test]
    fn test_invalid_seconds_fall_back() {
        let config = CoordinationConfig {
            agent_timeout_secs: f64::NAN,
            ..Default::default()
        };
        assert_eq!(config.agent_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_fast_tier_falls_back_to_standard() {
        let models = ModelsConfig {
            fast: None,
            standard: Some(LlmProviderConfig::new(LlmProviderType::Echo, "echo-1")),
        };
        assert_eq!(
            models.for_tier(ModelTier::Fast).map(|c| c.model.as_str()),
            Some("echo-1")
        );
    }

    #[test]
    fn test_rule_predicate_count() {
        let rule = SelectionRuleConfig::any_keyword("research", ["market"]);
        assert_eq!(rule.predicate_count(), 1);
        assert_eq!(SelectionRuleConfig::default().predicate_count(), 0);
    }
}
