//! Fan-out: supporting agents run concurrently, then the primary consults their outputs
//!
//! Parallel and collaborative modes share this path and differ only in how
//! supporting outputs are framed to the primary.

use tracing::debug;

use super::Run;
use crate::agents::context::ContextSources;
use crate::agents::domain::{
    Consultation, ConsultationFraming, ConversationContext, CoordinationMode,
};

pub(super) fn framing_for(mode: CoordinationMode) -> ConsultationFraming {
    match mode {
        CoordinationMode::Parallel => ConsultationFraming::SupportingOutput,
        _ => ConsultationFraming::ConsultationResponse,
    }
}

/// Fan out to `supporting`, then invoke `primary` once all of them are terminal
///
/// Consultations already on `base` are carried through to the primary ahead
/// of the new ones.
pub(super) async fn run(
    run: &mut Run<'_>,
    supporting: &[String],
    primary: &str,
    base: &ConversationContext,
    framing: ConsultationFraming,
) {
    for agent_id in supporting {
        run.dispatch_edge(agent_id);
    }
    let results = run.invoke_all(supporting, base).await;

    let mut consultations = base.consultations().to_vec();
    for result in &results {
        let Some(content) = result.content() else {
            continue;
        };
        let display_role = run
            .engine
            .registry
            .get(&result.agent_id)
            .map(|agent| agent.descriptor.display_role.clone())
            .unwrap_or_else(|| result.agent_id.clone());
        consultations.push(Consultation {
            agent_id: result.agent_id.clone(),
            display_role,
            content: content.to_string(),
            framing,
        });
        run.edge(&result.agent_id, primary);
    }
    debug!(
        dispatched = supporting.len(),
        contributed = consultations.len(),
        "Supporting agents finished"
    );

    let context = run.assembler().assemble(
        base,
        ContextSources::new(run.window).with_consultations(consultations),
    );
    run.dispatch_edge(primary);
    run.invoke_primary(primary, &context).await;
}
