//! Sequential chain: each supporting agent sees the previous one's output

use tracing::debug;

use super::Run;
use crate::agents::context::ContextSources;
use crate::agents::domain::{AgentSelection, ConversationContext, Message, TraceNote, COORDINATOR};

/// Supporting agents that fit under `cap`, with the primary as the last link
///
/// Returns the kept supporting agents and the ones dropped.
pub(super) fn plan_chain(supporting: &[String], cap: usize) -> (Vec<String>, Vec<String>) {
    let room = cap.max(1) - 1;
    if supporting.len() <= room {
        return (supporting.to_vec(), Vec::new());
    }
    (supporting[..room].to_vec(), supporting[room..].to_vec())
}

/// Run the chain, then the primary; results land in the run's trace
pub(super) async fn run(run: &mut Run<'_>, selection: &AgentSelection, prepared: &ConversationContext) {
    let cap = run.engine.config.max_chain_length;
    let (chain, dropped) = plan_chain(&selection.supporting, cap);
    if !dropped.is_empty() {
        debug!(cap, dropped = ?dropped, "Chain longer than cap, truncating");
        run.note(TraceNote::ChainCapExceeded { cap, dropped });
    }

    let mut context = prepared.clone();
    let mut upstream = COORDINATOR.to_string();

    for agent_id in &chain {
        run.edge(&upstream, agent_id);
        let result = run.invoke_supporting(agent_id, &context).await;

        // A failed link passes nothing on; the next agent sees the last good output
        if let Some(content) = result.content() {
            let extended = context.appended(Message::from_agent(agent_id, content));
            context = run
                .assembler()
                .assemble(&extended, ContextSources::new(run.window));
            upstream = agent_id.clone();
        }
    }

    run.edge(&upstream, &selection.primary);
    run.invoke_primary(&selection.primary, &context).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plan_chain_within_cap() {
        let (chain, dropped) = plan_chain(&ids(&["a", "b"]), 3);
        assert_eq!(chain, ids(&["a", "b"]));
        assert!(dropped.is_empty());
    }

    #[test]
    fn test_plan_chain_truncates() {
        let (chain, dropped) = plan_chain(&ids(&["a", "b", "c", "d"]), 3);
        assert_eq!(chain, ids(&["a", "b"]));
        assert_eq!(dropped, ids(&["c", "d"]));
    }

    #[test]
    fn test_plan_chain_cap_of_one_keeps_only_primary() {
        let (chain, dropped) = plan_chain(&ids(&["a"]), 1);
        assert!(chain.is_empty());
        assert_eq!(dropped, ids(&["a"]));

        let (chain, _) = plan_chain(&ids(&["a"]), 0);
        assert!(chain.is_empty());
    }
}
