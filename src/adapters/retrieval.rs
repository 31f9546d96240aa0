//! HTTP knowledge-retrieval client

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::adapters::credentials::{keys, CredentialStore};
use crate::agents::domain::{KnowledgeRetriever, KnowledgeSnippet};
use crate::config::RetrievalConfig;

/// Posts the query to a search endpoint and maps the ranked hits to snippets
pub struct HttpKnowledgeRetriever {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    product_scope_id: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(alias = "snippets", alias = "hits")]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(alias = "id", alias = "document_id")]
    source_id: String,
    #[serde(alias = "text", alias = "chunk")]
    content: String,
    #[serde(default)]
    score: f32,
}

impl HttpKnowledgeRetriever {
    pub fn new(endpoint: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    /// Build from config; the bearer token is optional
    pub async fn from_config(config: &RetrievalConfig, credentials: &CredentialStore) -> Self {
        let key_name = config.api_key_env.as_deref().unwrap_or(keys::RETRIEVAL_API_KEY);
        let api_key = credentials.get_or_env(key_name).await;
        Self::new(&config.endpoint, api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Hits in service order; that order is the rank
fn parse_hits(body: &str, top_k: usize) -> anyhow::Result<Vec<KnowledgeSnippet>> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response
        .results
        .into_iter()
        .take(top_k)
        .map(|hit| KnowledgeSnippet::new(hit.source_id, hit.content, hit.score))
        .collect())
}

#[async_trait]
impl KnowledgeRetriever for HttpKnowledgeRetriever {
    async fn retrieve(
        &self,
        query: &str,
        product_scope_id: &str,
        top_k: usize,
    ) -> anyhow::Result<Vec<KnowledgeSnippet>> {
        let mut request = self.client.post(&self.endpoint).json(&SearchRequest {
            query,
            product_scope_id,
            top_k,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("retrieval service returned {}: {}", status, body);
        }

        let snippets = parse_hits(&body, top_k)?;
        tracing::debug!(hits = snippets.len(), "Retrieval service answered");
        Ok(snippets)
    }
}
