use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use consilium::agents::config::{ContextBudgetConfig, SelectionConfig, SelectionRuleConfig};
use consilium::agents::context::{ContextAssembler, ContextSources, HistoryWindow};
use consilium::agents::domain::{
    AgentDescriptor, Consultation, ConsultationFraming, ConversationContext, CoordinationMode,
    CoordinationRequest, KnowledgeSnippet, Message,
};
use consilium::agents::llm::{EchoProvider, LlmProvider};
use consilium::agents::selection::AgentSelector;
use consilium::agents::{AgentRegistry, CoordinationEngine};
use std::sync::Arc;

fn registry() -> AgentRegistry {
    let provider: Arc<dyn LlmProvider> = Arc::new(EchoProvider::new("echo"));
    let mut builder = AgentRegistry::builder();
    for id in ["general", "analyst", "document", "research", "integration"] {
        builder = builder.ready(AgentDescriptor::new(id, format!("{} role", id)), provider.clone());
    }
    builder
        .ready(AgentDescriptor::new("knowledge", "Knowledge").with_retrieval(), provider)
        .build()
        .unwrap()
}

fn benchmark_selection(c: &mut Criterion) {
    let registry = registry();
    let keyword_selector = AgentSelector::from_config(&SelectionConfig::default()).unwrap();

    let mut scripted = SelectionConfig::default();
    scripted.rules = vec![
        SelectionRuleConfig::script("document", r#"query.contains("prd") && query.len() > 10"#),
        SelectionRuleConfig::any_keyword("research", ["market", "competitor"]),
        SelectionRuleConfig::script("integration", r#"query.contains("confluence")"#),
    ];
    let script_selector = AgentSelector::from_config(&scripted).unwrap();

    let query = "Draft a PRD from the competitor research and publish it to Confluence";

    let mut group = c.benchmark_group("selection");
    for (name, selector) in [("keywords", &keyword_selector), ("scripts", &script_selector)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), selector, |b, selector| {
            b.iter(|| {
                selector
                    .select(
                        &registry,
                        black_box(query),
                        None,
                        &[],
                        CoordinationMode::EnhancedCollaborative,
                    )
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn benchmark_assembly(c: &mut Criterion) {
    let assembler = ContextAssembler::new(ContextBudgetConfig::default());

    let history: Vec<Message> = (0..40)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("question {} {}", i, "detail ".repeat(200)))
            } else {
                Message::assistant(format!("answer {} {}", i, "context ".repeat(400)))
            }
        })
        .collect();
    let base = ConversationContext::new("What changed in the last release?", "payments")
        .with_history(history);

    let snippets: Vec<KnowledgeSnippet> = (0..20)
        .map(|i| KnowledgeSnippet::new(format!("doc-{}", i), "release note ".repeat(100), 1.0 / (i + 1) as f32))
        .collect();
    let consultations: Vec<Consultation> = ["research", "integration", "analyst"]
        .iter()
        .map(|id| Consultation {
            agent_id: id.to_string(),
            display_role: format!("{} role", id),
            content: "finding ".repeat(600),
            framing: ConsultationFraming::ConsultationResponse,
        })
        .collect();

    let mut group = c.benchmark_group("assembly");
    for window in [HistoryWindow::Standard, HistoryWindow::Enhanced] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", window)),
            &window,
            |b, window| {
                b.iter(|| {
                    let sources = ContextSources::new(*window)
                        .with_knowledge(snippets.clone())
                        .with_consultations(consultations.clone());
                    assembler.assemble(black_box(&base), sources)
                })
            },
        );
    }
    group.finish();
}

fn benchmark_coordinate(c: &mut Criterion) {
    let engine = CoordinationEngine::builder(Arc::new(registry())).build().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("coordinate_echo");
    for mode in CoordinationMode::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(mode), &mode, |b, mode| {
            b.iter(|| {
                let request = CoordinationRequest::new(
                    "Draft a PRD with market research",
                    *mode,
                    ConversationContext::new("", "payments"),
                );
                rt.block_on(engine.coordinate(request)).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_selection, benchmark_assembly, benchmark_coordinate);
criterion_main!(benches);
