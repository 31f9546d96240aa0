//! Immutable registry of agents and their provider handles
//!
//! A registry is built once and never mutated. Credential refresh or a
//! config reload builds a new registry; callers holding the old `Arc` keep
//! using it until they finish.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{info, warn};

use crate::adapters::credentials::CredentialStore;
use crate::agents::config::{AgentConfig, LlmProviderConfig, ModelsConfig};
use crate::agents::domain::AgentDescriptor;
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::llm::{create_provider, LlmProvider};

/// Live invocation handle for an agent
#[derive(Clone)]
pub enum ProviderHandle {
    /// A client ready to be called
    Ready(Arc<dyn LlmProvider>),
    /// No usable client; the reason is surfaced in the invocation result
    NotConfigured(String),
}

impl ProviderHandle {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProviderHandle::Ready(_))
    }
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderHandle::Ready(provider) => f
                .debug_tuple("Ready")
                .field(&format_args!("{}/{}", provider.name(), provider.model()))
                .finish(),
            ProviderHandle::NotConfigured(reason) => {
                f.debug_tuple("NotConfigured").field(reason).finish()
            }
        }
    }
}

/// Source of provider clients for agents
pub trait ProviderRegistry: Send + Sync {
    fn get_client(&self, descriptor: &AgentDescriptor) -> ProviderHandle;
}

/// Descriptor plus everything needed to invoke the agent
#[derive(Debug, Clone)]
pub struct RegisteredAgent {
    pub descriptor: AgentDescriptor,
    pub provider: ProviderHandle,
    /// Tera template for the system prompt
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl RegisteredAgent {
    pub fn new(descriptor: AgentDescriptor, provider: ProviderHandle) -> Self {
        Self {
            descriptor,
            provider,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(mut self, template: impl Into<String>) -> Self {
        self.system_prompt = Some(template.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }
}

/// Immutable snapshot of registered agents, keyed by id
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, RegisteredAgent>,
}

impl AgentRegistry {
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::default()
    }

    /// Build a registry from agent configs
    ///
    /// Each agent is backed by its own `llm` override or the provider of its
    /// model tier. Providers are shared between agents with the same
    /// settings. Agents whose provider cannot be built are still registered,
    /// as `NotConfigured`.
    pub async fn from_config(
        configs: &[AgentConfig],
        models: &ModelsConfig,
        credentials: &CredentialStore,
    ) -> AgentResult<Self> {
        let mut cache: HashMap<String, ProviderHandle> = HashMap::new();
        let mut builder = Self::builder();

        for config in configs {
            let descriptor = config.descriptor();
            let provider_config = config
                .llm
                .as_ref()
                .or_else(|| models.for_tier(descriptor.model_tier));

            let handle = match provider_config {
                Some(provider_config) => {
                    let key = provider_key(provider_config);
                    match cache.get(&key) {
                        Some(handle) => handle.clone(),
                        None => {
                            let handle = match create_provider(provider_config, credentials).await {
                                Ok(provider) => ProviderHandle::Ready(provider),
                                Err(e) => {
                                    warn!(agent = %config.id, error = %e, "Provider unavailable, agent registered as not configured");
                                    ProviderHandle::NotConfigured(e.to_string())
                                }
                            };
                            cache.insert(key, handle.clone());
                            handle
                        }
                    }
                }
                None => {
                    warn!(agent = %config.id, tier = %descriptor.model_tier, "No model configured for agent");
                    ProviderHandle::NotConfigured(format!(
                        "no model configured for tier '{}'",
                        descriptor.model_tier
                    ))
                }
            };

            let mut agent = RegisteredAgent::new(descriptor, handle);
            agent.system_prompt = config.system_prompt.clone();
            agent.temperature = config.temperature;
            agent.max_tokens = config.max_tokens;
            builder = builder.agent(agent);
        }

        let registry = builder.build()?;
        info!(
            agents = registry.len(),
            ready = registry.agents.values().filter(|a| a.provider.is_ready()).count(),
            "Agent registry built"
        );
        Ok(registry)
    }

    pub fn get(&self, agent_id: &str) -> Option<&RegisteredAgent> {
        self.agents.get(agent_id)
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.agents.contains_key(agent_id)
    }

    /// Descriptors ordered by id
    pub fn descriptors(&self) -> Vec<AgentDescriptor> {
        self.agents.values().map(|a| a.descriptor.clone()).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    /// First agent (by id) that supports knowledge retrieval
    pub fn first_retrieval_agent(&self) -> Option<&str> {
        self.agents
            .values()
            .find(|a| a.descriptor.supports_retrieval)
            .map(RegisteredAgent::id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl ProviderRegistry for AgentRegistry {
    fn get_client(&self, descriptor: &AgentDescriptor) -> ProviderHandle {
        match self.agents.get(&descriptor.id) {
            Some(agent) => agent.provider.clone(),
            None => ProviderHandle::NotConfigured(format!("agent '{}' is not registered", descriptor.id)),
        }
    }
}

fn provider_key(config: &LlmProviderConfig) -> String {
    format!(
        "{}|{}|{}|{}",
        config.provider,
        config.model,
        config.base_url.as_deref().unwrap_or_default(),
        config.api_key_env.as_deref().unwrap_or_default()
    )
}

/// Collects agents and rejects duplicate ids
#[derive(Debug, Default)]
pub struct AgentRegistryBuilder {
    agents: Vec<RegisteredAgent>,
}

impl AgentRegistryBuilder {
    pub fn agent(mut self, agent: RegisteredAgent) -> Self {
        self.agents.push(agent);
        self
    }

    /// Register an agent backed by `provider`
    pub fn ready(self, descriptor: AgentDescriptor, provider: Arc<dyn LlmProvider>) -> Self {
        self.agent(RegisteredAgent::new(descriptor, ProviderHandle::Ready(provider)))
    }

    /// Register an agent with no usable provider
    pub fn unconfigured(self, descriptor: AgentDescriptor, reason: impl Into<String>) -> Self {
        self.agent(RegisteredAgent::new(
            descriptor,
            ProviderHandle::NotConfigured(reason.into()),
        ))
    }

    pub fn build(self) -> AgentResult<AgentRegistry> {
        let mut agents = BTreeMap::new();
        for agent in self.agents {
            let id = agent.descriptor.id.clone();
            if agents.insert(id.clone(), agent).is_some() {
                return Err(AgentError::Validation(format!("duplicate agent id '{}'", id)));
            }
        }
        Ok(AgentRegistry { agents })
    }
}
