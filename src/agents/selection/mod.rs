//! Agent selection
//!
//! Maps a query plus explicit overrides to a primary agent and an ordered
//! list of supporting agents. Selection is a pure function of the registry,
//! the rule table and the request.

mod rules;

pub use rules::{default_rules, validate_rule, Predicate, RuleError, RuleTable, SelectionRule};

use tracing::debug;

use crate::agents::config::SelectionConfig;
use crate::agents::domain::{AgentSelection, CoordinationMode};
use crate::agents::error::SelectionError;
use crate::agents::registry::AgentRegistry;

/// Rule-driven agent selector
#[derive(Debug)]
pub struct AgentSelector {
    rules: RuleTable,
    default_primary: String,
    default_supporting: Vec<String>,
    retrieval_agent: Option<String>,
}

impl AgentSelector {
    pub fn from_config(config: &SelectionConfig) -> Result<Self, RuleError> {
        Ok(Self {
            rules: RuleTable::compile(&config.rules)?,
            default_primary: config.default_primary.clone(),
            default_supporting: config.default_supporting.clone(),
            retrieval_agent: config.retrieval_agent.clone(),
        })
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// The knowledge-retrieval agent, if one is registered
    pub fn retrieval_agent<'a>(&'a self, registry: &'a AgentRegistry) -> Option<&'a str> {
        match &self.retrieval_agent {
            Some(id) if registry.contains(id) => Some(id.as_str()),
            _ => registry.first_retrieval_agent(),
        }
    }

    /// Choose agents for a request
    pub fn select(
        &self,
        registry: &AgentRegistry,
        query: &str,
        explicit_primary: Option<&str>,
        explicit_supporting: &[String],
        mode: CoordinationMode,
    ) -> Result<AgentSelection, SelectionError> {
        for id in explicit_primary.into_iter().chain(explicit_supporting.iter().map(String::as_str)) {
            if !registry.contains(id) {
                return Err(SelectionError::UnknownAgent {
                    agent_id: id.to_string(),
                });
            }
        }

        let mut matched: Vec<&str> = Vec::new();
        for agent_id in self.rules.matching(query) {
            if !registry.contains(agent_id) {
                debug!(agent = %agent_id, "Rule matched an unregistered agent, skipping");
                continue;
            }
            if !matched.contains(&agent_id) {
                matched.push(agent_id);
            }
        }

        let primary = match explicit_primary {
            Some(id) => id,
            None => match matched.first() {
                Some(id) => *id,
                None if registry.contains(&self.default_primary) => self.default_primary.as_str(),
                None => return Err(SelectionError::NoEligiblePrimary),
            },
        };

        let candidates: Vec<&str> = if !explicit_supporting.is_empty() {
            explicit_supporting.iter().map(String::as_str).collect()
        } else if !matched.is_empty() {
            matched
        } else {
            self.default_supporting
                .iter()
                .map(String::as_str)
                .filter(|id| registry.contains(id))
                .collect()
        };

        let mut supporting: Vec<String> = Vec::new();
        for id in candidates {
            if id != primary && !supporting.iter().any(|s| s == id) {
                supporting.push(id.to_string());
            }
        }

        if mode == CoordinationMode::EnhancedCollaborative {
            if let Some(retrieval) = self.retrieval_agent(registry) {
                if retrieval != primary && !supporting.iter().any(|s| s == retrieval) {
                    supporting.push(retrieval.to_string());
                }
            }
        }

        debug!(primary = %primary, supporting = ?supporting, mode = %mode, "Agents selected");
        Ok(AgentSelection::new(primary, supporting))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::agents::domain::AgentDescriptor;
    use crate::agents::llm::{EchoProvider, LlmProvider};

    fn registry() -> AgentRegistry {
        let provider: Arc<dyn LlmProvider> = Arc::new(EchoProvider::new("echo"));
        let mut builder = AgentRegistry::builder();
        for id in ["general", "analyst", "document", "research", "integration"] {
            builder = builder.ready(AgentDescriptor::new(id, id), provider.clone());
        }
        builder
            .ready(AgentDescriptor::new("knowledge", "Knowledge").with_retrieval(), provider)
            .build()
            .unwrap()
    }

    fn selector() -> AgentSelector {
        AgentSelector::from_config(&SelectionConfig::default()).unwrap()
    }

    #[test]
    fn test_prd_confluence_enhanced() {
        let selection = selector()
            .select(
                &registry(),
                "Generate PRD using Confluence page 12345",
                None,
                &[],
                CoordinationMode::EnhancedCollaborative,
            )
            .unwrap();
        assert_eq!(selection.primary, "document");
        assert_eq!(selection.supporting, vec!["integration", "knowledge"]);
    }

    #[test]
    fn test_zero_matches_uses_defaults() {
        let selection = selector()
            .select(&registry(), "hello", None, &[], CoordinationMode::Parallel)
            .unwrap();
        assert_eq!(selection, AgentSelection::new("general", vec!["analyst".into()]));
    }

    #[test]
    fn test_enhanced_includes_retrieval_without_matches() {
        let selection = selector()
            .select(&registry(), "hello", None, &[], CoordinationMode::EnhancedCollaborative)
            .unwrap();
        assert!(selection.supporting.contains(&"knowledge".to_string()));
    }

    #[test]
    fn test_retrieval_not_duplicated_when_primary() {
        let selection = selector()
            .select(
                &registry(),
                "hello",
                Some("knowledge"),
                &[],
                CoordinationMode::EnhancedCollaborative,
            )
            .unwrap();
        assert_eq!(selection.primary, "knowledge");
        assert!(!selection.supporting.contains(&"knowledge".to_string()));
    }

    #[test]
    fn test_explicit_unknown_agent() {
        let err = selector()
            .select(
                &registry(),
                "q",
                None,
                &["research".to_string(), "ghost".to_string()],
                CoordinationMode::Parallel,
            )
            .unwrap_err();
        assert_eq!(err, SelectionError::UnknownAgent { agent_id: "ghost".into() });
    }

    #[test]
    fn test_explicit_supporting_drops_primary() {
        let selection = selector()
            .select(
                &registry(),
                "q",
                Some("research"),
                &["research".to_string(), "document".to_string(), "document".to_string()],
                CoordinationMode::Sequential,
            )
            .unwrap();
        assert_eq!(selection.supporting, vec!["document"]);
    }

    #[test]
    fn test_explicit_primary_with_inferred_supporting() {
        let selection = selector()
            .select(
                &registry(),
                "market research for jira",
                Some("general"),
                &[],
                CoordinationMode::Parallel,
            )
            .unwrap();
        assert_eq!(selection.supporting, vec!["research", "integration"]);
    }

    #[test]
    fn test_unregistered_rule_agent_skipped() {
        let provider: Arc<dyn LlmProvider> = Arc::new(EchoProvider::new("echo"));
        let registry = AgentRegistry::builder()
            .ready(AgentDescriptor::new("research", "R"), provider)
            .build()
            .unwrap();
        let selection = selector()
            .select(&registry, "competitive PRD", None, &[], CoordinationMode::Parallel)
            .unwrap();
        assert_eq!(selection.primary, "research");
        assert!(selection.supporting.is_empty());
    }

    #[test]
    fn test_no_eligible_primary() {
        let registry = AgentRegistry::builder().build().unwrap();
        let err = selector()
            .select(&registry, "hello", None, &[], CoordinationMode::Parallel)
            .unwrap_err();
        assert_eq!(err, SelectionError::NoEligiblePrimary);
    }

    #[test]
    fn test_deterministic() {
        let registry = registry();
        let selector = selector();
        let a = selector.select(&registry, "publish the competitive spec", None, &[], CoordinationMode::Collaborative);
        let b = selector.select(&registry, "publish the competitive spec", None, &[], CoordinationMode::Collaborative);
        assert_eq!(a, b);
    }

    #[test]
    fn test_configured_retrieval_agent_wins() {
        let config = SelectionConfig {
            retrieval_agent: Some("research".into()),
            ..Default::default()
        };
        let selector = AgentSelector::from_config(&config).unwrap();
        assert_eq!(selector.retrieval_agent(&registry()), Some("research"));

        let missing = SelectionConfig {
            retrieval_agent: Some("ghost".into()),
            ..Default::default()
        };
        let selector = AgentSelector::from_config(&missing).unwrap();
        assert_eq!(selector.retrieval_agent(&registry()), Some("knowledge"));
    }
}
