use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

use crate::agents::domain::{AgentInvocationResult, CoordinationMode};

pub struct MetricsCollector {
    registry: Registry,

    // Invocation metrics
    pub invocations_total: CounterVec,
    pub invocation_duration: HistogramVec,

    // Coordination metrics
    pub coordinations_total: CounterVec,
    pub coordinations_in_flight: Gauge,
    pub degraded_responses: Counter,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let invocations_total = CounterVec::new(
            Opts::new("consilium_invocations_total", "Total agent invocations"),
            &["agent", "status"],
        )?;
        registry.register(Box::new(invocations_total.clone()))?;

        let invocation_duration = HistogramVec::new(
            HistogramOpts::new(
                "consilium_invocation_duration_seconds",
                "Agent invocation duration in seconds",
            ),
            &["agent"],
        )?;
        registry.register(Box::new(invocation_duration.clone()))?;

        let coordinations_total = CounterVec::new(
            Opts::new("consilium_coordinations_total", "Total coordination calls"),
            &["mode", "outcome"],
        )?;
        registry.register(Box::new(coordinations_total.clone()))?;

        let coordinations_in_flight = Gauge::new(
            "consilium_coordinations_in_flight",
            "Number of coordination calls currently running",
        )?;
        registry.register(Box::new(coordinations_in_flight.clone()))?;

        let degraded_responses = Counter::new(
            "consilium_degraded_responses_total",
            "Responses assembled despite supporting-agent failures",
        )?;
        registry.register(Box::new(degraded_responses.clone()))?;

        Ok(Self {
            registry,
            invocations_total,
            invocation_duration,
            coordinations_total,
            coordinations_in_flight,
            degraded_responses,
        })
    }

    pub fn record_invocation(&self, result: &AgentInvocationResult) {
        self.invocations_total
            .with_label_values(&[result.agent_id.as_str(), &result.status().to_string()])
            .inc();
        self.invocation_duration
            .with_label_values(&[result.agent_id.as_str()])
            .observe(result.latency_ms as f64 / 1000.0);
    }

    /// `outcome` is `ok`, `degraded`, or `failed`
    pub fn record_coordination(&self, mode: CoordinationMode, outcome: &str) {
        self.coordinations_total
            .with_label_values(&[mode.as_str(), outcome])
            .inc();
        if outcome == "degraded" {
            self.degraded_responses.inc();
        }
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::error::FailureKind;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new();
        assert!(collector.is_ok());
    }

    #[test]
    fn test_metrics_encoding() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_invocation(&AgentInvocationResult::ok("research", "x", 120));
        collector.record_invocation(&AgentInvocationResult::error(
            "integration",
            FailureKind::RateLimited,
            5,
        ));
        collector.record_coordination(CoordinationMode::Parallel, "degraded");

        let metrics_text = collector.encode().unwrap();
        assert!(metrics_text.contains("consilium_invocations_total"));
        assert!(metrics_text.contains(r#"agent="integration",status="error""#));
        assert!(metrics_text.contains(r#"mode="parallel",outcome="degraded""#));
        assert!(metrics_text.contains("consilium_degraded_responses_total 1"));
    }
}
