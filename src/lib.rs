//! # Consilium - multi-agent coordination engine
//!
//! Consilium answers one user query with a team of LLM agents. A selector
//! picks a primary agent and supporting agents, the engine runs them under
//! one of four coordination modes, and the result is a single primary answer
//! plus a complete interaction trace.
//!
//! ## Features
//!
//! - **Four modes**: Sequential, Parallel, Collaborative, Enhanced collaborative
//! - **Rule-based selection**: keyword and Rhai script rules
//! - **Bounded context**: per-agent history windows and token budgets
//! - **Deadlines**: per-agent and overall timeouts, retries with backoff
//! - **Graceful degradation**: supporting failures never sink the answer
//! - **Metrics**: Prometheus counters and histograms
//! - **Live Reload**: configuration changes swap in a fresh engine
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use consilium::adapters::credentials::CredentialStore;
//! use consilium::agents::{CoordinatorHandler, ConversationContext, CoordinationPort, CoordinationRequest};
//! use consilium::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::new()?;
//!     let mode = settings.coordination.default_mode;
//!     let handler = CoordinatorHandler::new(settings, Arc::new(CredentialStore::new()), None).await?;
//!
//!     let request = CoordinationRequest::new(
//!         "Draft a PRD for the export feature",
//!         mode,
//!         ConversationContext::new("", "default"),
//!     );
//!     let response = handler.coordinate(request).await?;
//!     println!("{}", response.primary_content);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Agents**: domain types, selection, context assembly, invocation, engine
//! - **Adapters**: credentials, metrics, knowledge retrieval, document fetching
//! - **Config**: layered settings, validation, file watching

pub mod adapters;
pub mod agents;
pub mod cli;
pub mod config;

use std::time::Duration;

use crate::agents::domain::{ConversationContext, CoordinationMode, CoordinationRequest, Message};
use crate::cli::AskArgs;

/// Build a coordination request from `ask` arguments
///
/// `history` is the conversation so far; `default_mode` applies when the
/// arguments name none.
pub fn request_from_args(
    args: &AskArgs,
    history: Vec<Message>,
    default_mode: CoordinationMode,
) -> CoordinationRequest {
    let selection = &args.selection;
    let context = ConversationContext::new("", &args.scope).with_history(history);
    let mut request = CoordinationRequest::new(
        &selection.query,
        selection.mode.unwrap_or(default_mode),
        context,
    )
    .with_supporting(selection.supporting.iter().cloned())
    .with_references(args.references.iter().cloned());

    if let Some(primary) = &selection.primary {
        request = request.with_primary(primary);
    }
    let deadline = args
        .timeout_secs
        .filter(|s| *s > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    if let Some(deadline) = deadline {
        request = request.with_deadline(deadline);
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    fn ask(args: &[&str]) -> AskArgs {
        let mut argv = vec!["consilium", "ask"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Command::Ask(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_request_from_args_defaults() {
        let request = request_from_args(&ask(&["hello"]), Vec::new(), CoordinationMode::Parallel);
        assert_eq!(request.query, "hello");
        assert_eq!(request.mode, CoordinationMode::Parallel);
        assert_eq!(request.context.query(), "hello");
        assert_eq!(request.context.product_scope_id(), "default");
        assert!(request.primary_agent_id.is_none());
        assert!(request.deadline.is_none());
    }

    #[test]
    fn test_request_from_args_overrides() {
        let args = ask(&[
            "ship it",
            "--mode",
            "sequential",
            "--primary",
            "document",
            "--supporting",
            "research",
            "--timeout-secs",
            "2.5",
            "--reference",
            "wiki:9",
        ]);
        let history = vec![Message::user("earlier"), Message::assistant("reply")];
        let request = request_from_args(&args, history, CoordinationMode::Parallel);

        assert_eq!(request.mode, CoordinationMode::Sequential);
        assert_eq!(request.primary_agent_id.as_deref(), Some("document"));
        assert_eq!(request.supporting_agent_ids, vec!["research"]);
        assert_eq!(request.deadline, Some(Duration::from_millis(2500)));
        assert_eq!(request.document_references, vec!["wiki:9"]);
        assert_eq!(request.context.history().len(), 2);
    }

    #[test]
    fn test_non_positive_timeout_ignored() {
        let request = request_from_args(
            &ask(&["q", "--timeout-secs", "0"]),
            Vec::new(),
            CoordinationMode::Parallel,
        );
        assert!(request.deadline.is_none());
    }

    #[test]
    fn test_out_of_range_timeout_ignored() {
        let request = request_from_args(
            &ask(&["q", "--timeout-secs", "1e30"]),
            Vec::new(),
            CoordinationMode::Parallel,
        );
        assert!(request.deadline.is_none());
    }
}
