//! Coordinator handler implementing CoordinationPort
//!
//! Owns the live engine behind a lock. A reload builds a complete new engine
//! from fresh settings and swaps it in; calls already running keep the
//! snapshot they started with.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::adapters::credentials::CredentialStore;
use crate::adapters::documents::HttpDocumentFetcher;
use crate::adapters::metrics::MetricsCollector;
use crate::adapters::retrieval::HttpKnowledgeRetriever;
use crate::agents::domain::{
    AgentDescriptor, AgentSelection, AggregatedResponse, CoordinationMode, CoordinationPort,
    CoordinationRequest,
};
use crate::agents::error::{AgentResult, CoordinationFailure, SelectionError};
use crate::agents::orchestration::CoordinationEngine;
use crate::agents::registry::AgentRegistry;
use crate::config::Settings;

/// Handler for coordination calls
pub struct CoordinatorHandler {
    settings: Arc<RwLock<Settings>>,
    credentials: Arc<CredentialStore>,
    metrics: Option<Arc<MetricsCollector>>,
    engine: Arc<RwLock<Arc<CoordinationEngine>>>,
}

impl CoordinatorHandler {
    /// Create a handler and build its first engine
    pub async fn new(
        settings: Settings,
        credentials: Arc<CredentialStore>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> AgentResult<Self> {
        let engine = build_engine(&settings, &credentials, metrics.clone()).await?;
        Ok(Self {
            settings: Arc::new(RwLock::new(settings)),
            credentials,
            metrics,
            engine: Arc::new(RwLock::new(Arc::new(engine))),
        })
    }

    /// Rebuild the engine from the current settings
    ///
    /// Picks up credentials that were added since the last build.
    pub async fn initialize(&self) -> AgentResult<()> {
        let settings = self.settings.read().await.clone();
        self.install(settings).await
    }

    /// Replace settings and engine together
    ///
    /// On error the previous engine stays in place.
    pub async fn reload(&self, settings: Settings) -> AgentResult<()> {
        self.install(settings).await
    }

    async fn install(&self, settings: Settings) -> AgentResult<()> {
        let engine = build_engine(&settings, &self.credentials, self.metrics.clone()).await?;
        let agents = engine.registry().len();

        *self.engine.write().await = Arc::new(engine);
        *self.settings.write().await = settings;

        tracing::info!(agents, "Coordination engine swapped in");
        Ok(())
    }

    /// Snapshot of the live engine
    pub async fn engine(&self) -> Arc<CoordinationEngine> {
        self.engine.read().await.clone()
    }

    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Mode used when a caller does not pick one
    pub async fn default_mode(&self) -> CoordinationMode {
        self.engine().await.config().default_mode
    }
}

async fn build_engine(
    settings: &Settings,
    credentials: &CredentialStore,
    metrics: Option<Arc<MetricsCollector>>,
) -> AgentResult<CoordinationEngine> {
    let registry =
        AgentRegistry::from_config(&settings.agents, &settings.models, credentials).await?;

    let mut builder = CoordinationEngine::builder(Arc::new(registry))
        .coordination(settings.coordination.clone())
        .budgets(settings.context.clone())
        .selection(settings.selection.clone());

    if let Some(retrieval) = &settings.retrieval {
        let retriever = HttpKnowledgeRetriever::from_config(retrieval, credentials).await;
        tracing::debug!(endpoint = %retriever.endpoint(), "Knowledge retrieval enabled");
        builder = builder.retriever(Arc::new(retriever));
    }
    if let Some(documents) = &settings.documents {
        let fetcher = HttpDocumentFetcher::from_config(documents, credentials).await;
        builder = builder.fetcher(Arc::new(fetcher));
    }
    if let Some(metrics) = metrics {
        builder = builder.metrics(metrics);
    }

    builder.build()
}

#[async_trait]
impl CoordinationPort for CoordinatorHandler {
    async fn coordinate(
        &self,
        request: CoordinationRequest,
    ) -> Result<AggregatedResponse, CoordinationFailure> {
        let engine = self.engine().await;
        engine.coordinate(request).await
    }

    async fn list_agents(&self) -> Vec<AgentDescriptor> {
        self.engine().await.list_agents()
    }

    async fn select(
        &self,
        query: &str,
        explicit_primary: Option<&str>,
        explicit_supporting: &[String],
        mode: CoordinationMode,
    ) -> Result<AgentSelection, SelectionError> {
        self.engine()
            .await
            .select(query, explicit_primary, explicit_supporting, mode)
    }
}
