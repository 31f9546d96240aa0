//! Ordered `(predicate, agent)` rule table

use rhai::{Engine, Scope, AST};
use thiserror::Error;
use tracing::warn;

use crate::agents::config::SelectionRuleConfig;

/// Errors compiling a rule table
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule for '{agent}' has no predicate")]
    MissingPredicate { agent: String },

    #[error("rule for '{agent}' sets more than one predicate kind")]
    AmbiguousPredicate { agent: String },

    #[error("rule for '{agent}' has an invalid script: {message}")]
    InvalidScript { agent: String, message: String },
}

/// A keyword matched against whole words of the query
///
/// Multi-word keywords match a run of consecutive words. The last word also
/// matches its plural, so `spec` matches "specs" but not "perspective".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    words: Vec<String>,
}

impl Keyword {
    pub fn new(keyword: &str) -> Self {
        Self {
            words: words(&keyword.to_lowercase()).map(str::to_string).collect(),
        }
    }

    /// Whether the keyword occurs in `query_words`
    pub fn matches(&self, query_words: &[&str]) -> bool {
        let Some((last, leading)) = self.words.split_last() else {
            return false;
        };
        query_words.windows(self.words.len()).any(|window| {
            let tail = window[leading.len()];
            window.iter().zip(leading).all(|(word, keyword)| *word == keyword.as_str())
                && (tail == last.as_str() || tail.strip_suffix('s') == Some(last.as_str()))
        })
    }
}

/// Alphanumeric runs of `text`
fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
}

/// Match condition of one rule
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Any keyword occurs as a word of the query
    AnyKeyword(Vec<Keyword>),
    /// Every keyword occurs as a word of the query
    AllKeywords(Vec<Keyword>),
    /// Rhai boolean expression with `query` in scope
    Script(AST),
}

#[derive(Debug, Clone)]
pub struct SelectionRule {
    pub agent_id: String,
    pub predicate: Predicate,
}

/// Compiled rule table, evaluated in order
pub struct RuleTable {
    rules: Vec<SelectionRule>,
    engine: Engine,
}

impl std::fmt::Debug for RuleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleTable").field("rules", &self.rules).finish()
    }
}

/// Built-in rule table used when configuration supplies none
pub fn default_rules() -> Vec<SelectionRuleConfig> {
    vec![
        SelectionRuleConfig::any_keyword(
            "document",
            ["prd", "export", "document", "documentation", "spec"],
        ),
        SelectionRuleConfig::any_keyword(
            "research",
            ["research", "market", "competitive", "competitor"],
        ),
        SelectionRuleConfig::any_keyword(
            "integration",
            ["confluence", "jira", "publish", "page", "ticket"],
        ),
    ]
}

fn script_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(10_000);
    engine.set_max_expr_depths(32, 32);
    engine
}

impl RuleTable {
    /// Compile rules; an empty slice yields the built-in table
    pub fn compile(configs: &[SelectionRuleConfig]) -> Result<Self, RuleError> {
        let engine = script_engine();
        let defaults;
        let configs = if configs.is_empty() {
            defaults = default_rules();
            &defaults[..]
        } else {
            configs
        };

        let mut rules = Vec::with_capacity(configs.len());
        for config in configs {
            rules.push(SelectionRule {
                agent_id: config.agent.clone(),
                predicate: compile_predicate(&engine, config)?,
            });
        }

        Ok(Self { rules, engine })
    }

    pub fn rules(&self) -> &[SelectionRule] {
        &self.rules
    }

    /// Agents of matching rules in rule order (may repeat)
    pub fn matching(&self, query: &str) -> Vec<&str> {
        let lowered = query.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| self.evaluate(rule, &lowered))
            .map(|rule| rule.agent_id.as_str())
            .collect()
    }

    fn evaluate(&self, rule: &SelectionRule, lowered: &str) -> bool {
        match &rule.predicate {
            Predicate::AnyKeyword(keywords) => {
                let query_words: Vec<&str> = words(lowered).collect();
                keywords.iter().any(|k| k.matches(&query_words))
            }
            Predicate::AllKeywords(keywords) => {
                let query_words: Vec<&str> = words(lowered).collect();
                keywords.iter().all(|k| k.matches(&query_words))
            }
            Predicate::Script(ast) => {
                let mut scope = Scope::new();
                scope.push("query", lowered.to_string());
                match self.engine.eval_ast_with_scope::<bool>(&mut scope, ast) {
                    Ok(matched) => matched,
                    Err(e) => {
                        warn!(agent = %rule.agent_id, error = %e, "Selection script failed, treating as no match");
                        false
                    }
                }
            }
        }
    }
}

/// Check a rule without keeping the result
pub fn validate_rule(config: &SelectionRuleConfig) -> Result<(), RuleError> {
    compile_predicate(&script_engine(), config).map(|_| ())
}

fn compile_predicate(engine: &Engine, config: &SelectionRuleConfig) -> Result<Predicate, RuleError> {
    match config.predicate_count() {
        0 => {
            return Err(RuleError::MissingPredicate {
                agent: config.agent.clone(),
            })
        }
        1 => {}
        _ => {
            return Err(RuleError::AmbiguousPredicate {
                agent: config.agent.clone(),
            })
        }
    }

    if let Some(script) = &config.script {
        let ast = engine
            .compile_expression(script)
            .map_err(|e| RuleError::InvalidScript {
                agent: config.agent.clone(),
                message: e.to_string(),
            })?;
        return Ok(Predicate::Script(ast));
    }

    let compile = |keywords: &[String]| keywords.iter().map(|k| Keyword::new(k)).collect();
    if !config.all_keywords.is_empty() {
        Ok(Predicate::AllKeywords(compile(&config.all_keywords)))
    } else {
        Ok(Predicate::AnyKeyword(compile(&config.keywords)))
    }
}
