//! Domain types for the coordination engine
//!
//! Core abstractions shared by the selector, the engine and the adapters,
//! plus the ports through which the engine reaches its collaborators.

mod agent;
mod context;
mod message;
mod request;
mod result;
mod tool_call;

pub use agent::*;
pub use context::*;
pub use message::*;
pub use request::*;
pub use result::*;
pub use tool_call::*;

use async_trait::async_trait;

use crate::agents::error::{CoordinationFailure, FetchError, SelectionError};

/// Port trait for coordination (the surface callers depend on)
#[async_trait]
pub trait CoordinationPort: Send + Sync {
    /// Run one coordination call
    async fn coordinate(
        &self,
        request: CoordinationRequest,
    ) -> Result<AggregatedResponse, CoordinationFailure>;

    /// List registered agents, ordered by id
    async fn list_agents(&self) -> Vec<AgentDescriptor>;

    /// Resolve the agents a request would use without invoking any
    async fn select(
        &self,
        query: &str,
        explicit_primary: Option<&str>,
        explicit_supporting: &[String],
        mode: CoordinationMode,
    ) -> Result<AgentSelection, SelectionError>;
}

/// Knowledge-retrieval collaborator
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    /// Return up to `top_k` snippets for `query`, best match first
    async fn retrieve(
        &self,
        query: &str,
        product_scope_id: &str,
        top_k: usize,
    ) -> anyhow::Result<Vec<KnowledgeSnippet>>;
}

/// External document fetcher (wiki pages, issue-tracker tickets)
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<ExternalFragment, FetchError>;
}
