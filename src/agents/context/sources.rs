//! Gathering knowledge snippets and external fragments under a deadline

use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::agents::domain::{
    DocumentFetcher, ExternalFragment, KnowledgeRetriever, KnowledgeSnippet, TraceNote,
};

/// Query the retriever, bounded by `timeout`
///
/// Failures are reported as a `RetrievalUnavailable` note instead of an error.
pub async fn retrieve_knowledge(
    retriever: &dyn KnowledgeRetriever,
    query: &str,
    product_scope_id: &str,
    top_k: usize,
    timeout: Duration,
) -> Result<Vec<KnowledgeSnippet>, TraceNote> {
    match tokio::time::timeout(timeout, retriever.retrieve(query, product_scope_id, top_k)).await {
        Ok(Ok(snippets)) => {
            debug!(count = snippets.len(), "Retrieved knowledge snippets");
            Ok(snippets)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Knowledge retrieval failed");
            Err(TraceNote::RetrievalUnavailable {
                reason: e.to_string(),
            })
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Knowledge retrieval timed out");
            Err(TraceNote::RetrievalUnavailable {
                reason: format!("timed out after {}ms", timeout.as_millis()),
            })
        }
    }
}

/// Fetch every reference concurrently, bounded by `timeout` each
///
/// Returns the fragments that arrived (in reference order) and a
/// `FetchFailed` note for each one that did not.
pub async fn fetch_fragments(
    fetcher: &dyn DocumentFetcher,
    references: &[String],
    timeout: Duration,
) -> (Vec<ExternalFragment>, Vec<TraceNote>) {
    let fetches = references.iter().map(|reference| async move {
        let outcome = tokio::time::timeout(timeout, fetcher.fetch(reference)).await;
        (reference, outcome)
    });

    let mut fragments = Vec::new();
    let mut notes = Vec::new();

    for (reference, outcome) in join_all(fetches).await {
        match outcome {
            Ok(Ok(fragment)) => fragments.push(fragment),
            Ok(Err(e)) => {
                warn!(reference = %reference, error = %e, "Document fetch failed");
                notes.push(TraceNote::FetchFailed {
                    reference: reference.clone(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(reference = %reference, "Document fetch timed out");
                notes.push(TraceNote::FetchFailed {
                    reference: reference.clone(),
                    reason: format!("timed out after {}ms", timeout.as_millis()),
                });
            }
        }
    }

    (fragments, notes)
}
