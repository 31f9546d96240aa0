//! Folding a trace into the caller-facing result

use std::collections::BTreeSet;

use crate::agents::domain::{
    AgentOutcome, AggregatedResponse, AggregationDegraded, DegradedAgent, InteractionTrace,
};
use crate::agents::error::{CoordinationFailure, FailureKind, FailureReason};

/// Build the response for `primary_id` from a finished trace
///
/// Total over every combination of outcomes: a primary success always
/// yields a response, with a degradation note listing each supporting
/// agent that did not succeed; anything else yields a failure carrying the
/// whole trace.
pub fn aggregate(
    primary_id: &str,
    trace: InteractionTrace,
) -> Result<AggregatedResponse, CoordinationFailure> {
    let primary = trace
        .results
        .iter()
        .rev()
        .find(|r| r.agent_id == primary_id)
        .map(|r| r.outcome.clone());

    let reason = match primary {
        Some(AgentOutcome::Ok { content }) => return Ok(respond(primary_id, content, trace)),
        Some(AgentOutcome::Timeout) | None => FailureReason::Timeout {
            agent_id: primary_id.to_string(),
        },
        Some(AgentOutcome::Error {
            kind: FailureKind::NotConfigured { reason },
        }) => FailureReason::NotConfigured {
            agent_id: primary_id.to_string(),
            reason,
        },
        Some(AgentOutcome::Error { kind }) => FailureReason::ProviderError {
            agent_id: primary_id.to_string(),
            kind,
        },
    };

    Err(CoordinationFailure {
        reason,
        partial_trace: trace,
    })
}

fn respond(primary_id: &str, content: String, trace: InteractionTrace) -> AggregatedResponse {
    let mut participating = BTreeSet::new();
    let mut failed = Vec::new();

    for result in trace.results.iter().filter(|r| r.agent_id != primary_id) {
        if result.is_ok() {
            participating.insert(result.agent_id.clone());
        } else {
            failed.push(DegradedAgent {
                agent_id: result.agent_id.clone(),
                status: result.status(),
                kind: result.failure_kind().cloned(),
            });
        }
    }
    participating.insert(primary_id.to_string());

    AggregatedResponse {
        primary_agent_id: primary_id.to_string(),
        primary_content: content,
        interactions: trace,
        participating_agents: participating,
        degradation: (!failed.is_empty()).then_some(AggregationDegraded { failed }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::domain::{AgentInvocationResult, InvocationStatus};

    fn trace(results: Vec<AgentInvocationResult>) -> InteractionTrace {
        InteractionTrace {
            results,
            ..InteractionTrace::new("run-1")
        }
    }

    #[test]
    fn test_all_ok() {
        let response = aggregate(
            "p",
            trace(vec![
                AgentInvocationResult::ok("a", "A", 1),
                AgentInvocationResult::ok("p", "answer", 2),
            ]),
        )
        .unwrap();
        assert_eq!(response.primary_content, "answer");
        assert!(!response.is_degraded());
        assert_eq!(
            response.participating_agents.into_iter().collect::<Vec<_>>(),
            vec!["a", "p"]
        );
    }

    #[test]
    fn test_supporting_failures_degrade() {
        let response = aggregate(
            "p",
            trace(vec![
                AgentInvocationResult::timeout("a", 30),
                AgentInvocationResult::error("b", FailureKind::RateLimited, 3),
                AgentInvocationResult::ok("c", "C", 1),
                AgentInvocationResult::ok("p", "answer", 2),
            ]),
        )
        .unwrap();
        let degradation = response.degradation.as_ref().unwrap();
        assert_eq!(degradation.failed_agents(), vec!["a", "b"]);
        assert_eq!(degradation.failed[0].status, InvocationStatus::Timeout);
        assert_eq!(degradation.failed[1].kind, Some(FailureKind::RateLimited));
        assert!(!response.participating_agents.contains("a"));
        assert!(response.participating_agents.contains("c"));
        assert_eq!(response.interactions.results.len(), 4);
    }

    #[test]
    fn test_primary_timeout_fails_with_trace() {
        let failure = aggregate(
            "p",
            trace(vec![
                AgentInvocationResult::ok("a", "A", 1),
                AgentInvocationResult::timeout("p", 10),
            ]),
        )
        .unwrap_err();
        assert_eq!(failure.reason, FailureReason::Timeout { agent_id: "p".into() });
        assert_eq!(failure.partial_trace.results.len(), 2);
        assert!(failure.is_retryable());
    }

    #[test]
    fn test_primary_not_configured() {
        let kind = FailureKind::NotConfigured {
            reason: "missing key".into(),
        };
        let failure = aggregate("p", trace(vec![AgentInvocationResult::error("p", kind, 0)])).unwrap_err();
        assert_eq!(
            failure.reason,
            FailureReason::NotConfigured {
                agent_id: "p".into(),
                reason: "missing key".into()
            }
        );
    }

    #[test]
    fn test_primary_provider_error() {
        let failure = aggregate(
            "p",
            trace(vec![AgentInvocationResult::error("p", FailureKind::Authentication, 5)]),
        )
        .unwrap_err();
        assert!(matches!(
            failure.reason,
            FailureReason::ProviderError { kind: FailureKind::Authentication, .. }
        ));
    }

    #[test]
    fn test_missing_primary_is_timeout() {
        let failure = aggregate("p", trace(Vec::new())).unwrap_err();
        assert!(matches!(failure.reason, FailureReason::Timeout { .. }));
    }
}
