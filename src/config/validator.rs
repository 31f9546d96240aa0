use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::agents::config::{AgentConfig, ContextBudgetConfig, CoordinationConfig, SelectionConfig};
use crate::agents::selection::validate_rule;
use crate::config::Settings;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Cross-reference error: {0}")]
    CrossReference(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),
}

/// Checks a whole `Settings` and reports every problem at once
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        errors.extend(Self::validate_coordination(&settings.coordination));
        errors.extend(Self::validate_context(&settings.context));
        errors.extend(Self::validate_agents(&settings.agents));
        errors.extend(Self::validate_selection(&settings.selection, &settings.agents));
        errors.extend(Self::validate_endpoints(settings));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_coordination(config: &CoordinationConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("coordination.overall_timeout_secs", config.overall_timeout_secs),
            ("coordination.agent_timeout_secs", config.agent_timeout_secs),
            ("coordination.retrieval_timeout_secs", config.retrieval_timeout_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                errors.push(ValidationError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("must be a positive number of seconds, got {}", value),
                });
            }
        }

        if config.agent_timeout_secs >= config.overall_timeout_secs {
            errors.push(ValidationError::InvalidValue {
                field: "coordination.agent_timeout_secs".to_string(),
                reason: format!(
                    "must be less than overall_timeout_secs ({} >= {})",
                    config.agent_timeout_secs, config.overall_timeout_secs
                ),
            });
        }

        let ratio = config.primary_reserve_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            errors.push(ValidationError::InvalidValue {
                field: "coordination.primary_reserve_ratio".to_string(),
                reason: format!("must lie strictly between 0 and 1, got {}", ratio),
            });
        }

        if config.max_chain_length == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "coordination.max_chain_length".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        errors
    }

    fn validate_context(budgets: &ContextBudgetConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("context.max_message_tokens", budgets.max_message_tokens),
            ("context.max_snippets", budgets.max_snippets),
            ("context.knowledge_tokens", budgets.knowledge_tokens),
            ("context.fragment_chars", budgets.fragment_chars),
            ("context.consultation_tokens", budgets.consultation_tokens),
        ] {
            if value == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: field.to_string(),
                    reason: "budget must be greater than 0".to_string(),
                });
            }
        }

        if !budgets.chars_per_token.is_finite() || budgets.chars_per_token <= 0.0 {
            errors.push(ValidationError::InvalidValue {
                field: "context.chars_per_token".to_string(),
                reason: format!("must be positive, got {}", budgets.chars_per_token),
            });
        }

        errors
    }

    fn validate_agents(agents: &[AgentConfig]) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut seen_ids = HashMap::new();

        for (idx, agent) in agents.iter().enumerate() {
            if agent.id.is_empty() {
                errors.push(ValidationError::MissingField(format!("agents[{}].id", idx)));
                continue;
            }

            if let Some(prev_idx) = seen_ids.insert(agent.id.as_str(), idx) {
                errors.push(ValidationError::Duplicate(format!(
                    "Agent id '{}' appears at indices {} and {}",
                    agent.id, prev_idx, idx
                )));
            }

            if agent.display_role.is_empty() {
                errors.push(ValidationError::MissingField(format!(
                    "agents[{}].display_role",
                    idx
                )));
            }

            if let Some(llm) = &agent.llm {
                if llm.model.is_empty() {
                    errors.push(ValidationError::MissingField(format!(
                        "agents[{}].llm.model",
                        idx
                    )));
                }
            }
        }

        errors
    }

    fn validate_selection(selection: &SelectionConfig, agents: &[AgentConfig]) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let ids: HashSet<&str> = agents.iter().map(|a| a.id.as_str()).collect();

        for (idx, rule) in selection.rules.iter().enumerate() {
            if !ids.contains(rule.agent.as_str()) {
                errors.push(ValidationError::CrossReference(format!(
                    "selection.rules[{}] references unknown agent '{}'",
                    idx, rule.agent
                )));
            }
            if let Err(e) = validate_rule(rule) {
                errors.push(ValidationError::InvalidValue {
                    field: format!("selection.rules[{}]", idx),
                    reason: e.to_string(),
                });
            }
        }

        if let Some(retrieval) = &selection.retrieval_agent {
            match agents.iter().find(|a| &a.id == retrieval) {
                None => errors.push(ValidationError::CrossReference(format!(
                    "selection.retrieval_agent references unknown agent '{}'",
                    retrieval
                ))),
                Some(agent) if !agent.supports_retrieval => {
                    errors.push(ValidationError::InvalidValue {
                        field: "selection.retrieval_agent".to_string(),
                        reason: format!("agent '{}' does not set supports_retrieval", retrieval),
                    })
                }
                Some(_) => {}
            }
        }

        errors
    }

    fn validate_endpoints(settings: &Settings) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Some(retrieval) = &settings.retrieval {
            if retrieval.endpoint.is_empty() {
                errors.push(ValidationError::MissingField("retrieval.endpoint".to_string()));
            }
        }

        if let Some(documents) = &settings.documents {
            if documents.wiki_base_url.is_none() && documents.tracker_base_url.is_none() {
                errors.push(ValidationError::InvalidValue {
                    field: "documents".to_string(),
                    reason: "set wiki_base_url, tracker_base_url, or both".to_string(),
                });
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::config::SelectionRuleConfig;
    use crate::config::{DocumentsConfig, RetrievalConfig};

    fn settings() -> Settings {
        let mut knowledge = AgentConfig::new("knowledge", "Knowledge");
        knowledge.supports_retrieval = true;
        Settings {
            agents: vec![AgentConfig::new("general", "Generalist"), knowledge],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_settings() {
        assert!(ConfigValidator::validate(&settings()).is_ok());
    }

    #[test]
    fn test_reports_all_errors() {
        let mut settings = settings();
        settings.agents.push(AgentConfig::new("general", "Again"));
        settings.coordination.agent_timeout_secs = 90.0;
        settings.coordination.max_chain_length = 0;
        settings.context.consultation_tokens = 0;
        settings
            .selection
            .rules
            .push(SelectionRuleConfig::any_keyword("ghost", ["boo"]));
        settings
            .selection
            .rules
            .push(SelectionRuleConfig::script("general", "query.contains("));
        settings.selection.retrieval_agent = Some("general".into());

        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 7, "{:?}", errors);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Duplicate(_))));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::CrossReference(m) if m.contains("ghost"))));
    }

    #[test]
    fn test_unknown_retrieval_agent() {
        let mut settings = settings();
        settings.selection.retrieval_agent = Some("librarian".into());
        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert!(matches!(&errors[0], ValidationError::CrossReference(m) if m.contains("librarian")));
    }

    #[test]
    fn test_non_positive_timeouts() {
        let mut settings = settings();
        settings.coordination.retrieval_timeout_secs = 0.0;
        settings.coordination.overall_timeout_secs = f64::NAN;
        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 2, "{:?}", errors);
    }

    #[test]
    fn test_primary_reserve_ratio_range() {
        for ratio in [0.0, 1.0, -0.2, f64::NAN] {
            let mut settings = settings();
            settings.coordination.primary_reserve_ratio = ratio;
            let errors = ConfigValidator::validate(&settings).unwrap_err();
            assert!(matches!(
                &errors[0],
                ValidationError::InvalidValue { field, .. } if field == "coordination.primary_reserve_ratio"
            ));
        }
    }

    #[test]
    fn test_endpoints() {
        let mut settings = settings();
        settings.retrieval = Some(RetrievalConfig {
            endpoint: String::new(),
            api_key_env: None,
        });
        settings.documents = Some(DocumentsConfig::default());
        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
