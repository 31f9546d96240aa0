//! Multi-agent coordination
//!
//! One engine, four ways to run a selection:
//! - Sequential: supporting agents form a chain, each output feeding the next
//! - Parallel: supporting agents fan out, their outputs reach the primary
//! - Collaborative: like parallel, framed as consultation responses
//! - Enhanced collaborative: knowledge agent first, then collaborative
//!
//! A call moves through `Selecting -> Executing -> Aggregating -> Done`, or
//! ends in `Failed`. The engine holds no mutable state; concurrent calls
//! only share the immutable registry.

mod aggregate;
mod collaborative;
mod enhanced;
mod sequential;

pub use aggregate::aggregate;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::adapters::metrics::MetricsCollector;
use crate::agents::config::{ContextBudgetConfig, CoordinationConfig, SelectionConfig};
use crate::agents::context::{
    fetch_fragments, retrieve_knowledge, ContextAssembler, ContextSources, HistoryWindow,
};
use crate::agents::domain::{
    AgentDescriptor, AgentInvocationResult, AgentSelection, AggregatedResponse,
    ConversationContext, CoordinationMode, CoordinationPort, CoordinationRequest,
    DocumentFetcher, ExternalFragment, InteractionEdge, InteractionTrace, KnowledgeRetriever,
    KnowledgeSnippet, TraceNote,
};
use crate::agents::error::{
    AgentError, AgentResult, CoordinationFailure, FailureKind, FailureReason, SelectionError,
};
use crate::agents::invoker::{AgentInvoker, RetryPolicy};
use crate::agents::registry::AgentRegistry;
use crate::agents::selection::AgentSelector;

/// Lifecycle of one coordination call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinationPhase {
    Selecting,
    Executing,
    Aggregating,
    Done,
    Failed,
}

impl CoordinationPhase {
    /// Whether `next` may follow `self`
    pub fn can_advance_to(self, next: CoordinationPhase) -> bool {
        use CoordinationPhase::*;
        matches!(
            (self, next),
            (Selecting, Executing)
                | (Selecting, Failed)
                | (Executing, Aggregating)
                | (Aggregating, Done)
                | (Aggregating, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CoordinationPhase::Done | CoordinationPhase::Failed)
    }
}

impl fmt::Display for CoordinationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoordinationPhase::Selecting => "selecting",
            CoordinationPhase::Executing => "executing",
            CoordinationPhase::Aggregating => "aggregating",
            CoordinationPhase::Done => "done",
            CoordinationPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Coordinates agents from an immutable registry
pub struct CoordinationEngine {
    registry: Arc<AgentRegistry>,
    selector: AgentSelector,
    assembler: ContextAssembler,
    invoker: AgentInvoker,
    config: CoordinationConfig,
    retriever: Option<Arc<dyn KnowledgeRetriever>>,
    fetcher: Option<Arc<dyn DocumentFetcher>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl CoordinationEngine {
    pub fn builder(registry: Arc<AgentRegistry>) -> CoordinationEngineBuilder {
        CoordinationEngineBuilder::new(registry)
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &CoordinationConfig {
        &self.config
    }

    pub fn assembler(&self) -> &ContextAssembler {
        &self.assembler
    }

    /// Descriptors of every registered agent, ordered by id
    pub fn list_agents(&self) -> Vec<AgentDescriptor> {
        self.registry.descriptors()
    }

    /// Run selection without invoking anything
    pub fn select(
        &self,
        query: &str,
        explicit_primary: Option<&str>,
        explicit_supporting: &[String],
        mode: CoordinationMode,
    ) -> Result<AgentSelection, SelectionError> {
        self.selector
            .select(&self.registry, query, explicit_primary, explicit_supporting, mode)
    }

    /// Answer one request
    ///
    /// Returns a response whenever the primary agent succeeds, even if every
    /// supporting agent failed. Never runs past the request deadline (or
    /// `overall_timeout_secs` when the request has none).
    pub async fn coordinate(
        &self,
        request: CoordinationRequest,
    ) -> Result<AggregatedResponse, CoordinationFailure> {
        let run_id = Uuid::new_v4().to_string();
        let mode = request.mode;
        let span = info_span!("coordinate", run_id = %run_id, mode = %mode);

        async move {
            if let Some(metrics) = &self.metrics {
                metrics.coordinations_in_flight.inc();
            }

            let outcome = self.run(run_id, request).await;

            if let Some(metrics) = &self.metrics {
                metrics.coordinations_in_flight.dec();
                let label = match &outcome {
                    Ok(response) if response.is_degraded() => "degraded",
                    Ok(_) => "ok",
                    Err(_) => "failed",
                };
                metrics.record_coordination(mode, label);
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        run_id: String,
        request: CoordinationRequest,
    ) -> Result<AggregatedResponse, CoordinationFailure> {
        let (deadline, budget) = self.deadline_for(request.deadline);
        let reserve = self.config.primary_reserve(budget);
        let mut run = Run::new(self, run_id, deadline, reserve, request.mode);

        let selection = match self.select(
            &request.query,
            request.primary_agent_id.as_deref(),
            &request.supporting_agent_ids,
            request.mode,
        ) {
            Ok(selection) => selection,
            Err(e) => {
                warn!(error = %e, "Selection failed");
                run.advance(CoordinationPhase::Failed);
                return Err(CoordinationFailure {
                    reason: FailureReason::Selection(e),
                    partial_trace: run.trace,
                });
            }
        };

        run.advance(CoordinationPhase::Executing);
        info!(
            primary = %selection.primary,
            supporting = ?selection.supporting,
            deadline_ms = budget.as_millis() as u64,
            primary_reserve_ms = reserve.as_millis() as u64,
            "Coordinating"
        );

        let base = request.context.clone().with_query(request.query.clone());
        let knowledge = run.gather_knowledge(&selection, &base).await;
        run.fragments = run
            .gather_fragments(&selection, &request.document_references)
            .await;

        let mut sources = ContextSources::new(run.window);
        if let Some(snippets) = knowledge {
            sources = sources.with_knowledge(snippets);
        }
        let prepared = self.assembler.assemble(&base, sources);

        match request.mode {
            CoordinationMode::Sequential => sequential::run(&mut run, &selection, &prepared).await,
            CoordinationMode::Parallel | CoordinationMode::Collaborative => {
                collaborative::run(
                    &mut run,
                    &selection.supporting,
                    &selection.primary,
                    &prepared,
                    collaborative::framing_for(request.mode),
                )
                .await
            }
            CoordinationMode::EnhancedCollaborative => {
                enhanced::run(&mut run, &selection, &prepared).await
            }
        }

        run.advance(CoordinationPhase::Aggregating);
        let outcome = aggregate(&selection.primary, std::mem::take(&mut run.trace));
        match &outcome {
            Ok(response) => {
                run.advance(CoordinationPhase::Done);
                info!(
                    participating = response.participating_agents.len(),
                    degraded = response.is_degraded(),
                    "Coordination complete"
                );
            }
            Err(failure) => {
                run.advance(CoordinationPhase::Failed);
                warn!(reason = %failure.reason, "Coordination failed");
            }
        }
        outcome
    }

    /// Absolute deadline and budget for one call
    ///
    /// A requested budget too large to represent as an instant falls back to
    /// `overall_timeout_secs`.
    fn deadline_for(&self, requested: Option<Duration>) -> (Instant, Duration) {
        let now = Instant::now();
        let configured = self.config.overall_timeout();
        for budget in requested.into_iter().chain([configured]) {
            match now.checked_add(budget) {
                Some(deadline) => return (deadline, budget),
                None => warn!(secs = budget.as_secs(), "Deadline out of range, falling back"),
            }
        }
        let budget = CoordinationConfig::default().overall_timeout();
        (now + budget, budget)
    }
}

#[async_trait]
impl CoordinationPort for CoordinationEngine {
    async fn coordinate(
        &self,
        request: CoordinationRequest,
    ) -> Result<AggregatedResponse, CoordinationFailure> {
        CoordinationEngine::coordinate(self, request).await
    }

    async fn list_agents(&self) -> Vec<AgentDescriptor> {
        CoordinationEngine::list_agents(self)
    }

    async fn select(
        &self,
        query: &str,
        explicit_primary: Option<&str>,
        explicit_supporting: &[String],
        mode: CoordinationMode,
    ) -> Result<AgentSelection, SelectionError> {
        CoordinationEngine::select(self, query, explicit_primary, explicit_supporting, mode)
    }
}

/// Per-call state: the trace being built and the deadline it runs under
///
/// The last `reserve` before the deadline belongs to the primary; everything
/// else dispatched by the run must finish before it starts.
pub(crate) struct Run<'e> {
    engine: &'e CoordinationEngine,
    trace: InteractionTrace,
    deadline: Instant,
    reserve: Duration,
    window: HistoryWindow,
    fragments: Vec<ExternalFragment>,
    phase: CoordinationPhase,
}

impl<'e> Run<'e> {
    fn new(
        engine: &'e CoordinationEngine,
        run_id: String,
        deadline: Instant,
        reserve: Duration,
        mode: CoordinationMode,
    ) -> Self {
        let window = match mode {
            CoordinationMode::EnhancedCollaborative => HistoryWindow::Enhanced,
            _ => HistoryWindow::Standard,
        };
        Self {
            engine,
            trace: InteractionTrace::new(run_id),
            deadline,
            reserve,
            window,
            fragments: Vec::new(),
            phase: CoordinationPhase::Selecting,
        }
    }

    fn advance(&mut self, next: CoordinationPhase) {
        if !self.phase.can_advance_to(next) {
            warn!(from = %self.phase, to = %next, "Unexpected phase transition");
        }
        debug!(from = %self.phase, to = %next, "Phase transition");
        self.phase = next;
    }

    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Time left before the primary's reserve starts
    fn supporting_window(&self) -> Duration {
        self.remaining().saturating_sub(self.reserve)
    }

    /// Time a supporting agent dispatched now may use, or `None` once only the reserve is left
    fn supporting_budget(&self) -> Option<Duration> {
        self.cap(self.supporting_window())
    }

    /// Time the primary may use, or `None` once the deadline has passed
    fn primary_budget(&self) -> Option<Duration> {
        self.cap(self.remaining())
    }

    fn cap(&self, window: Duration) -> Option<Duration> {
        if window.is_zero() {
            None
        } else {
            Some(window.min(self.engine.config.agent_timeout()))
        }
    }

    fn assembler(&self) -> &'e ContextAssembler {
        &self.engine.assembler
    }

    fn edge(&mut self, from: &str, to: &str) {
        self.trace.edges.push(InteractionEdge::new(from, to));
    }

    fn dispatch_edge(&mut self, to: &str) {
        self.trace.edges.push(InteractionEdge::dispatch(to));
    }

    fn note(&mut self, note: TraceNote) {
        self.trace.notes.push(note);
    }

    /// Context an agent actually sees: fragments only for agents that consume them
    fn context_for(&self, agent_id: &str, context: &ConversationContext) -> ConversationContext {
        let consumes = self
            .engine
            .registry
            .get(agent_id)
            .is_some_and(|agent| agent.descriptor.consumes_external_documents());
        if consumes && !self.fragments.is_empty() {
            context.clone().with_fragments(self.fragments.clone())
        } else {
            context.clone()
        }
    }

    /// Invoke one agent without touching the trace
    ///
    /// The flag is set when the deadline had already passed and no call was made.
    async fn dispatch(
        &self,
        agent_id: &str,
        context: ConversationContext,
        budget: Option<Duration>,
    ) -> (AgentInvocationResult, bool) {
        let Some(agent) = self.engine.registry.get(agent_id) else {
            let kind = FailureKind::NotConfigured {
                reason: format!("agent '{}' is not registered", agent_id),
            };
            return (AgentInvocationResult::error(agent_id, kind, 0).with_attempts(0), false);
        };
        match budget {
            Some(timeout) => (self.engine.invoker.invoke(agent, &context, timeout).await, false),
            None => (AgentInvocationResult::timeout(agent_id, 0).with_attempts(0), true),
        }
    }

    fn record(&mut self, result: AgentInvocationResult, exhausted: bool) -> AgentInvocationResult {
        if exhausted {
            warn!(agent = %result.agent_id, "Deadline exhausted before dispatch");
            self.note(TraceNote::DeadlineExhausted {
                agent_id: result.agent_id.clone(),
            });
            if let Some(metrics) = &self.engine.metrics {
                metrics.record_invocation(&result);
            }
        }
        self.trace.results.push(result.clone());
        result
    }

    /// Invoke one supporting agent now and record the result
    async fn invoke_supporting(
        &mut self,
        agent_id: &str,
        context: &ConversationContext,
    ) -> AgentInvocationResult {
        let budget = self.supporting_budget();
        self.invoke(agent_id, context, budget).await
    }

    /// Invoke the primary now, with whatever time is left, and record the result
    async fn invoke_primary(
        &mut self,
        agent_id: &str,
        context: &ConversationContext,
    ) -> AgentInvocationResult {
        let budget = self.primary_budget();
        self.invoke(agent_id, context, budget).await
    }

    async fn invoke(
        &mut self,
        agent_id: &str,
        context: &ConversationContext,
        budget: Option<Duration>,
    ) -> AgentInvocationResult {
        let context = self.context_for(agent_id, context);
        let (result, exhausted) = self.dispatch(agent_id, context, budget).await;
        self.record(result, exhausted)
    }

    /// Invoke several supporting agents concurrently against the same context
    ///
    /// Results are recorded in dispatch order once every call is terminal.
    async fn invoke_all(
        &mut self,
        agent_ids: &[String],
        context: &ConversationContext,
    ) -> Vec<AgentInvocationResult> {
        let budget = self.supporting_budget();
        let calls = agent_ids.iter().map(|agent_id| {
            let context = self.context_for(agent_id, context);
            self.dispatch(agent_id, context, budget)
        });
        let outcomes = join_all(calls).await;

        outcomes
            .into_iter()
            .map(|(result, exhausted)| self.record(result, exhausted))
            .collect()
    }

    /// Knowledge snippets for this call, if retrieval applies and succeeds
    ///
    /// Snippets already on the caller's context are kept as-is.
    async fn gather_knowledge(
        &mut self,
        selection: &AgentSelection,
        base: &ConversationContext,
    ) -> Option<Vec<KnowledgeSnippet>> {
        if base.retrieved_knowledge().is_some() {
            return None;
        }

        let engine = self.engine;
        let wanted = self.window == HistoryWindow::Enhanced
            || engine
                .selector
                .retrieval_agent(&engine.registry)
                .is_some_and(|agent_id| selection.contains(agent_id));
        if !wanted {
            return None;
        }

        let Some(retriever) = &engine.retriever else {
            debug!("No knowledge retriever configured");
            self.note(TraceNote::RetrievalUnavailable {
                reason: "no knowledge retriever configured".to_string(),
            });
            return None;
        };

        let timeout = self.supporting_window().min(engine.config.retrieval_timeout());
        match retrieve_knowledge(
            retriever.as_ref(),
            base.query(),
            base.product_scope_id(),
            engine.assembler.budgets().max_snippets,
            timeout,
        )
        .await
        {
            Ok(snippets) => Some(snippets),
            Err(note) => {
                self.note(note);
                None
            }
        }
    }

    /// Bounded fragments for the referenced documents
    ///
    /// Nothing is fetched unless a selected agent consumes external documents.
    async fn gather_fragments(
        &mut self,
        selection: &AgentSelection,
        references: &[String],
    ) -> Vec<ExternalFragment> {
        if references.is_empty() {
            return Vec::new();
        }

        let engine = self.engine;
        let consumer = selection.all().any(|agent_id| {
            engine
                .registry
                .get(agent_id)
                .is_some_and(|agent| agent.descriptor.consumes_external_documents())
        });
        if !consumer {
            debug!(references = references.len(), "No selected agent consumes documents, skipping fetch");
            return Vec::new();
        }

        let Some(fetcher) = &engine.fetcher else {
            for reference in references {
                self.note(TraceNote::FetchFailed {
                    reference: reference.clone(),
                    reason: "no document fetcher configured".to_string(),
                });
            }
            return Vec::new();
        };

        let timeout = self.supporting_window().min(engine.config.retrieval_timeout());
        let (fragments, notes) = fetch_fragments(fetcher.as_ref(), references, timeout).await;
        for note in notes {
            self.note(note);
        }
        engine.assembler.bound_fragments(fragments)
    }
}

/// Assembles a `CoordinationEngine`
pub struct CoordinationEngineBuilder {
    registry: Arc<AgentRegistry>,
    coordination: CoordinationConfig,
    budgets: ContextBudgetConfig,
    selection: SelectionConfig,
    retriever: Option<Arc<dyn KnowledgeRetriever>>,
    fetcher: Option<Arc<dyn DocumentFetcher>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl CoordinationEngineBuilder {
    fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            coordination: CoordinationConfig::default(),
            budgets: ContextBudgetConfig::default(),
            selection: SelectionConfig::default(),
            retriever: None,
            fetcher: None,
            metrics: None,
        }
    }

    pub fn coordination(mut self, config: CoordinationConfig) -> Self {
        self.coordination = config;
        self
    }

    pub fn budgets(mut self, budgets: ContextBudgetConfig) -> Self {
        self.budgets = budgets;
        self
    }

    pub fn selection(mut self, selection: SelectionConfig) -> Self {
        self.selection = selection;
        self
    }

    pub fn retriever(mut self, retriever: Arc<dyn KnowledgeRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> AgentResult<CoordinationEngine> {
        let selector = AgentSelector::from_config(&self.selection)
            .map_err(|e| AgentError::Configuration(e.to_string()))?;

        let retry = RetryPolicy::new(self.coordination.max_retries, self.coordination.retry_delay());
        let mut invoker = AgentInvoker::new(retry);
        if let Some(metrics) = &self.metrics {
            invoker = invoker.with_metrics(metrics.clone());
        }

        Ok(CoordinationEngine {
            registry: self.registry,
            selector,
            assembler: ContextAssembler::new(self.budgets),
            invoker,
            config: self.coordination,
            retriever: self.retriever,
            fetcher: self.fetcher,
            metrics: self.metrics,
        })
    }
}
