//! Provider request construction

use std::fmt::Write as _;

use tera::{Context, Tera};

use crate::agents::domain::{ConsultationFraming, ConversationContext, Message};
use crate::agents::llm::CompletionRequest;
use crate::agents::registry::RegisteredAgent;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are the {{ role }} agent ({{ agent_id }}) working on product scope {{ scope }}.";

/// Render a system prompt template with the agent's variables
///
/// Available variables: `role`, `agent_id`, `scope`, `capabilities`.
/// Falls back to the raw template if rendering fails.
pub fn render_system_prompt(template: &str, agent: &RegisteredAgent, scope: &str) -> String {
    if !template.contains("{{") && !template.contains("{%") {
        return template.to_string();
    }

    let mut context = Context::new();
    context.insert("role", &agent.descriptor.display_role);
    context.insert("agent_id", &agent.descriptor.id);
    context.insert("scope", scope);
    context.insert(
        "capabilities",
        &agent.descriptor.capability_tags.iter().collect::<Vec<_>>(),
    );

    match Tera::one_off(template, &context, false) {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::warn!(agent = %agent.descriptor.id, error = %e, "Failed to render system prompt template");
            template.to_string()
        }
    }
}

/// Builds the completion request for one agent from its assembled context
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, agent: &RegisteredAgent, context: &ConversationContext) -> CompletionRequest {
        let template = agent.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let mut system = render_system_prompt(template, agent, context.product_scope_id());
        system.push_str(&Self::source_blocks(context));

        let mut messages = Vec::with_capacity(context.history().len() + 2);
        messages.push(Message::system(system));
        messages.extend(context.history().iter().cloned());
        messages.push(Message::user(context.query()));

        CompletionRequest {
            messages,
            temperature: agent.temperature,
            max_tokens: agent.max_tokens,
            ..Default::default()
        }
    }

    /// Knowledge, fragment and consultation sections appended to the system prompt
    fn source_blocks(context: &ConversationContext) -> String {
        let mut out = String::new();

        if let Some(snippets) = context.retrieved_knowledge().filter(|s| !s.is_empty()) {
            out.push_str("\n\n## Retrieved knowledge\n");
            for (rank, snippet) in snippets.iter().enumerate() {
                let _ = write!(out, "\n[{}] ({}) {}", rank + 1, snippet.source_id, snippet.content);
            }
        }

        if let Some(fragments) = context.external_fragments().filter(|f| !f.is_empty()) {
            out.push_str("\n\n## Referenced documents\n");
            for fragment in fragments {
                let title = fragment.title.as_deref().unwrap_or(&fragment.reference);
                let _ = write!(out, "\n### {}\n{}", title, fragment.content);
                if fragment.truncated {
                    out.push_str("\n(truncated)");
                }
            }
        }

        for consultation in context.consultations() {
            let heading = match consultation.framing {
                ConsultationFraming::SupportingOutput => "Supporting output from",
                ConsultationFraming::ConsultationResponse => "Consultation response from",
            };
            let _ = write!(
                out,
                "\n\n## {} {} ({})\n{}",
                heading, consultation.display_role, consultation.agent_id, consultation.content
            );
        }

        out
    }
}
