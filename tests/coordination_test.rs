use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use consilium::adapters::credentials::CredentialStore;
use consilium::adapters::metrics::MetricsCollector;
use consilium::agents::domain::{
    capabilities, AgentDescriptor, ConversationContext, CoordinationMode, CoordinationPort,
    CoordinationRequest, InteractionEdge, InvocationStatus, KnowledgeRetriever, KnowledgeSnippet,
    TraceNote, COORDINATOR,
};
use consilium::agents::error::FailureReason;
use consilium::agents::llm::{EchoProvider, LlmProvider};
use consilium::agents::{AgentRegistry, CoordinationEngine, CoordinatorHandler};
use consilium::config::Settings;
use tempfile::TempDir;

const PRODUCT_TOML: &str = r#"
[coordination]
default_mode = "enhanced_collaborative"
overall_timeout_secs = 10
agent_timeout_secs = 5

[models.standard]
provider = "echo"
model = "echo-standard"

[[agents]]
id = "general"
display_role = "Generalist"

[[agents]]
id = "document"
display_role = "Document Writer"
capability_tags = ["external_documents"]

[[agents]]
id = "research"
display_role = "Market Researcher"

[[agents]]
id = "integration"
display_role = "Integration Specialist"

[[agents]]
id = "knowledge"
display_role = "Knowledge Specialist"
supports_retrieval = true
"#;

async fn product_handler(metrics: Option<Arc<MetricsCollector>>) -> anyhow::Result<(TempDir, CoordinatorHandler)> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("consilium.toml"), PRODUCT_TOML)?;
    let settings = Settings::from_root(temp_dir.path())?;
    let handler = CoordinatorHandler::new(settings, Arc::new(CredentialStore::new()), metrics).await?;
    Ok((temp_dir, handler))
}

fn request(query: &str, mode: CoordinationMode) -> CoordinationRequest {
    CoordinationRequest::new(query, mode, ConversationContext::new("", "payments"))
}

#[tokio::test]
async fn test_enhanced_prd_request_runs_knowledge_first() -> anyhow::Result<()> {
    let (_root, handler) = product_handler(None).await?;

    let response = handler
        .coordinate(request(
            "Draft a PRD from the competitor research and publish it to Confluence",
            CoordinationMode::EnhancedCollaborative,
        ))
        .await?;

    assert_eq!(response.primary_agent_id, "document");
    assert!(!response.is_degraded());

    let trace = &response.interactions;
    assert_eq!(trace.results.first().map(|r| r.agent_id.as_str()), Some("knowledge"));
    assert_eq!(trace.results.last().map(|r| r.agent_id.as_str()), Some("document"));
    assert_eq!(trace.edges[0], InteractionEdge::new(COORDINATOR, "knowledge"));
    assert!(trace.edges.contains(&InteractionEdge::new("knowledge", "document")));

    let participating: Vec<&str> = response.participating_agents.iter().map(String::as_str).collect();
    assert_eq!(participating, vec!["document", "integration", "knowledge", "research"]);

    // No retrieval service configured
    assert!(trace
        .notes
        .iter()
        .any(|n| matches!(n, TraceNote::RetrievalUnavailable { .. })));
    Ok(())
}

#[tokio::test]
async fn test_sequential_chain_ends_with_primary() -> anyhow::Result<()> {
    let (_root, handler) = product_handler(None).await?;

    let req = request("Summarize the roadmap", CoordinationMode::Sequential)
        .with_primary("general")
        .with_supporting(["research", "document"]);
    let response = handler.coordinate(req).await?;

    let order = response.interactions.invoked_agents();
    assert_eq!(order, vec!["research", "document", "general"]);
    assert_eq!(
        response.interactions.edges,
        vec![
            InteractionEdge::new(COORDINATOR, "research"),
            InteractionEdge::new("research", "document"),
            InteractionEdge::new("document", "general"),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_unknown_agent_fails_before_any_invocation() -> anyhow::Result<()> {
    let (_root, handler) = product_handler(None).await?;

    let failure = handler
        .coordinate(request("anything", CoordinationMode::Parallel).with_primary("ghost"))
        .await
        .unwrap_err();

    assert!(matches!(failure.reason, FailureReason::Selection(_)));
    assert!(!failure.is_retryable());
    assert!(failure.partial_trace.results.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_metrics_count_coordinations() -> anyhow::Result<()> {
    let metrics = Arc::new(MetricsCollector::new()?);
    let (_root, handler) = product_handler(Some(metrics.clone())).await?;

    handler
        .coordinate(request("hello", CoordinationMode::Parallel))
        .await?;

    let text = metrics.encode()?;
    assert!(text.contains("consilium_coordinations_total"));
    assert!(text.contains("outcome=\"ok\""));
    assert!(text.contains("consilium_invocations_total"));
    Ok(())
}

struct Glossary;

#[async_trait]
impl KnowledgeRetriever for Glossary {
    async fn retrieve(
        &self,
        _query: &str,
        product_scope_id: &str,
        top_k: usize,
    ) -> anyhow::Result<Vec<KnowledgeSnippet>> {
        let snippets = vec![
            KnowledgeSnippet::new("glossary-1", format!("{} settles nightly", product_scope_id), 0.9),
            KnowledgeSnippet::new("glossary-2", "refunds take 5 days", 0.7),
        ];
        Ok(snippets.into_iter().take(top_k).collect())
    }
}

#[tokio::test]
async fn test_engine_with_retriever_and_unconfigured_agent() -> anyhow::Result<()> {
    let provider: Arc<dyn LlmProvider> = Arc::new(EchoProvider::new("echo"));
    let registry = AgentRegistry::builder()
        .ready(AgentDescriptor::new("general", "Generalist"), provider.clone())
        .ready(
            AgentDescriptor::new("knowledge", "Knowledge Specialist").with_retrieval(),
            provider,
        )
        .unconfigured(
            AgentDescriptor::new("document", "Document Writer")
                .with_capability(capabilities::EXTERNAL_DOCUMENTS),
            "no api key",
        )
        .build()?;

    let engine = CoordinationEngine::builder(Arc::new(registry))
        .retriever(Arc::new(Glossary))
        .build()?;

    let req = request("When do payments settle?", CoordinationMode::EnhancedCollaborative)
        .with_primary("general")
        .with_supporting(["document"])
        .with_deadline(Duration::from_secs(5));
    let response = engine.coordinate(req).await?;

    assert_eq!(response.primary_agent_id, "general");
    assert!(response.primary_content.contains("payments"));

    let degradation = response.degradation.as_ref().expect("document agent failed");
    assert_eq!(degradation.failed_agents(), vec!["document"]);
    assert_eq!(
        response.interactions.result_for("document").map(|r| r.status()),
        Some(InvocationStatus::Error)
    );
    assert!(degradation.footnote().contains("document"));
    Ok(())
}
