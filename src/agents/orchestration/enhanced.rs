//! Enhanced collaboration: the knowledge agent answers first, everyone else builds on it

use tracing::debug;

use super::{collaborative, Run};
use crate::agents::context::ContextSources;
use crate::agents::domain::{
    AgentSelection, Consultation, ConsultationFraming, ConversationContext,
};

pub(super) async fn run(run: &mut Run<'_>, selection: &AgentSelection, prepared: &ConversationContext) {
    let engine = run.engine;
    let knowledge_agent = engine
        .selector
        .retrieval_agent(&engine.registry)
        .filter(|agent_id| selection.supporting.iter().any(|s| s == agent_id))
        .map(str::to_string);

    let Some(knowledge_agent) = knowledge_agent else {
        debug!("No knowledge agent in selection, running plain collaboration");
        collaborative::run(
            run,
            &selection.supporting,
            &selection.primary,
            prepared,
            ConsultationFraming::ConsultationResponse,
        )
        .await;
        return;
    };

    run.dispatch_edge(&knowledge_agent);
    let result = run.invoke_supporting(&knowledge_agent, prepared).await;

    let others: Vec<String> = selection
        .supporting
        .iter()
        .filter(|id| **id != knowledge_agent)
        .cloned()
        .collect();

    let base = match result.content() {
        Some(content) => {
            for agent_id in others.iter().chain(std::iter::once(&selection.primary)) {
                run.edge(&knowledge_agent, agent_id);
            }
            let display_role = engine
                .registry
                .get(&knowledge_agent)
                .map(|agent| agent.descriptor.display_role.clone())
                .unwrap_or_else(|| knowledge_agent.clone());
            let consultation = Consultation {
                agent_id: knowledge_agent.clone(),
                display_role,
                content: content.to_string(),
                framing: ConsultationFraming::ConsultationResponse,
            };
            run.assembler().assemble(
                prepared,
                ContextSources::new(run.window).with_consultations(vec![consultation]),
            )
        }
        None => prepared.clone(),
    };

    collaborative::run(
        run,
        &others,
        &selection.primary,
        &base,
        ConsultationFraming::ConsultationResponse,
    )
    .await;
}
