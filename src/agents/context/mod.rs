//! Context assembly
//!
//! The assembler turns a base `ConversationContext` plus newly gathered
//! sources into a bounded context for one agent invocation. It never
//! mutates its input; every call returns a new value.

mod sources;
mod truncate;
mod window;

pub use sources::{fetch_fragments, retrieve_knowledge};
pub use truncate::{truncate_chars, ELLIPSIS};
pub use window::window_turns;

use crate::agents::config::ContextBudgetConfig;
use crate::agents::domain::{
    Consultation, ConversationContext, ExternalFragment, KnowledgeSnippet, Message,
};
use crate::agents::token::{TokenBudget, TokenCounter};

/// Which history window applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryWindow {
    /// `history_turns`
    #[default]
    Standard,
    /// `enhanced_history_turns`, or the full history when unset
    Enhanced,
}

/// New material for an assembly; `None` keeps what the base already has
#[derive(Debug, Clone, Default)]
pub struct ContextSources {
    pub window: HistoryWindow,
    pub knowledge: Option<Vec<KnowledgeSnippet>>,
    pub fragments: Option<Vec<ExternalFragment>>,
    pub consultations: Option<Vec<Consultation>>,
}

impl ContextSources {
    pub fn new(window: HistoryWindow) -> Self {
        Self {
            window,
            ..Default::default()
        }
    }

    pub fn with_knowledge(mut self, snippets: Vec<KnowledgeSnippet>) -> Self {
        self.knowledge = Some(snippets);
        self
    }

    pub fn with_fragments(mut self, fragments: Vec<ExternalFragment>) -> Self {
        self.fragments = Some(fragments);
        self
    }

    pub fn with_consultations(mut self, consultations: Vec<Consultation>) -> Self {
        self.consultations = Some(consultations);
        self
    }
}

/// Merges history, knowledge, fragments and consultations under budget
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    budgets: ContextBudgetConfig,
    counter: TokenCounter,
}

impl ContextAssembler {
    pub fn new(budgets: ContextBudgetConfig) -> Self {
        let counter = TokenCounter::with_ratio(budgets.chars_per_token);
        Self { budgets, counter }
    }

    pub fn budgets(&self) -> &ContextBudgetConfig {
        &self.budgets
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Build a bounded context from `base` and `sources`
    pub fn assemble(&self, base: &ConversationContext, sources: ContextSources) -> ConversationContext {
        let turns = match sources.window {
            HistoryWindow::Standard => Some(self.budgets.history_turns),
            HistoryWindow::Enhanced => self.budgets.enhanced_history_turns,
        };
        let history = self.bound_history(base.history(), turns);

        let mut next = ConversationContext::new(base.query(), base.product_scope_id())
            .with_history(history);

        let knowledge = match sources.knowledge {
            Some(snippets) => Some(snippets),
            None => base.retrieved_knowledge().map(<[_]>::to_vec),
        };
        if let Some(snippets) = knowledge {
            next = next.with_knowledge(self.bound_knowledge(snippets));
        }

        let fragments = match sources.fragments {
            Some(fragments) => Some(fragments),
            None => base.external_fragments().map(<[_]>::to_vec),
        };
        if let Some(fragments) = fragments {
            next = next.with_fragments(self.bound_fragments(fragments));
        }

        let consultations = sources
            .consultations
            .unwrap_or_else(|| base.consultations().to_vec());
        next.with_consultations(self.bound_consultations(consultations))
    }

    /// Estimated tokens of everything in `context`
    pub fn estimated_tokens(&self, context: &ConversationContext) -> usize {
        (context.char_len() as f32 / self.counter.chars_per_token()).ceil() as usize
    }

    fn bound_history(&self, history: &[Message], turns: Option<usize>) -> Vec<Message> {
        let max_chars = self.counter.chars_for(self.budgets.max_message_tokens);
        let windowed = match turns {
            Some(turns) => window_turns(history, turns),
            None => history.to_vec(),
        };
        windowed
            .into_iter()
            .map(|mut message| {
                let (content, _) = truncate_chars(&message.content, max_chars);
                message.content = content;
                message
            })
            .collect()
    }

    /// Cap count, then admit snippets in rank order until the token budget runs out
    fn bound_knowledge(&self, snippets: Vec<KnowledgeSnippet>) -> Vec<KnowledgeSnippet> {
        let mut budget = TokenBudget::new(self.budgets.knowledge_tokens);
        let mut admitted = Vec::new();

        for mut snippet in snippets.into_iter().take(self.budgets.max_snippets) {
            if budget.is_exhausted() {
                break;
            }
            let wanted = self.counter.count(&snippet.content);
            let granted = budget.take(wanted);
            if granted < wanted {
                let (content, _) = truncate_chars(&snippet.content, self.counter.chars_for(granted));
                snippet.content = content;
            }
            if !snippet.content.is_empty() {
                admitted.push(snippet);
            }
        }

        admitted
    }

    /// Truncate each fragment to `fragment_chars`
    pub fn bound_fragments(&self, fragments: Vec<ExternalFragment>) -> Vec<ExternalFragment> {
        fragments
            .into_iter()
            .map(|mut fragment| {
                let (content, cut) = truncate_chars(&fragment.content, self.budgets.fragment_chars);
                fragment.content = content;
                fragment.truncated |= cut;
                fragment
            })
            .collect()
    }

    fn bound_consultations(&self, consultations: Vec<Consultation>) -> Vec<Consultation> {
        let max_chars = self.counter.chars_for(self.budgets.consultation_tokens);
        consultations
            .into_iter()
            .map(|mut consultation| {
                let (content, _) = truncate_chars(&consultation.content, max_chars);
                consultation.content = content;
                consultation
            })
            .collect()
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(ContextBudgetConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::domain::ConsultationFraming;

    fn budgets() -> ContextBudgetConfig {
        ContextBudgetConfig {
            history_turns: 1,
            enhanced_history_turns: Some(2),
            max_message_tokens: 5,
            max_snippets: 3,
            knowledge_tokens: 6,
            fragment_chars: 10,
            consultation_tokens: 2,
            chars_per_token: 2.0,
        }
    }

    fn history() -> Vec<Message> {
        vec![
            Message::user("one"),
            Message::assistant("one-a"),
            Message::user("two"),
            Message::assistant("a very long answer that exceeds ten chars"),
        ]
    }

    #[test]
    fn test_history_windowed_and_truncated() {
        let assembler = ContextAssembler::new(budgets());
        let base = ConversationContext::new("q", "s").with_history(history());
        let out = assembler.assemble(&base, ContextSources::default());

        assert_eq!(out.history().len(), 2);
        assert_eq!(out.history()[0].content, "two");
        assert_eq!(out.history()[1].content.chars().count(), 10);
        assert!(out.history()[1].content.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_enhanced_window_is_wider() {
        let assembler = ContextAssembler::new(budgets());
        let base = ConversationContext::new("q", "s").with_history(history());
        let out = assembler.assemble(&base, ContextSources::new(HistoryWindow::Enhanced));
        assert_eq!(out.history().len(), 4);
    }

    #[test]
    fn test_enhanced_window_unbounded_by_default() {
        let assembler = ContextAssembler::default();
        let history: Vec<Message> = (0..30)
            .flat_map(|i| [Message::user(format!("q{}", i)), Message::assistant(format!("a{}", i))])
            .collect();
        let base = ConversationContext::new("q", "s").with_history(history);

        let enhanced = assembler.assemble(&base, ContextSources::new(HistoryWindow::Enhanced));
        assert_eq!(enhanced.history().len(), 60);
        assert_eq!(enhanced.history()[0].content, "q0");

        let standard = assembler.assemble(&base, ContextSources::new(HistoryWindow::Standard));
        assert_eq!(standard.history().len(), 6);
    }

    #[test]
    fn test_knowledge_budget_preserves_rank() {
        let assembler = ContextAssembler::new(budgets());
        let base = ConversationContext::new("q", "s");
        let snippets = vec![
            KnowledgeSnippet::new("a", "12345678", 0.9), // 4 tokens
            KnowledgeSnippet::new("b", "abcdefgh", 0.8), // 4 tokens, 2 granted
            KnowledgeSnippet::new("c", "zz", 0.7),       // budget exhausted
            KnowledgeSnippet::new("d", "yy", 0.6),       // over max_snippets
        ];
        let out = assembler.assemble(&base, ContextSources::default().with_knowledge(snippets));
        let knowledge = out.retrieved_knowledge().unwrap();

        assert_eq!(knowledge.len(), 2);
        assert_eq!(knowledge[0].content, "12345678");
        assert_eq!(knowledge[1].source_id, "b");
        assert_eq!(knowledge[1].content, "abc…");
    }

    #[test]
    fn test_fragments_marked_truncated() {
        let assembler = ContextAssembler::new(budgets());
        let base = ConversationContext::new("q", "s");
        let fragments = vec![
            ExternalFragment::new("page-1", "short"),
            ExternalFragment::new("page-2", "this page is much longer than ten"),
        ];
        let out = assembler.assemble(&base, ContextSources::default().with_fragments(fragments));
        let fragments = out.external_fragments().unwrap();
        assert!(!fragments[0].truncated);
        assert!(fragments[1].truncated);
        assert_eq!(fragments[1].content.chars().count(), 10);
    }

    #[test]
    fn test_base_is_not_mutated_and_sources_kept() {
        let assembler = ContextAssembler::new(budgets());
        let base = ConversationContext::new("q", "s")
            .with_history(history())
            .with_knowledge(vec![KnowledgeSnippet::new("a", "x", 1.0)]);
        let before = base.clone();

        let consultations = vec![Consultation {
            agent_id: "research".into(),
            display_role: "Researcher".into(),
            content: "long consultation".into(),
            framing: ConsultationFraming::ConsultationResponse,
        }];
        let out = assembler.assemble(
            &base,
            ContextSources::default().with_consultations(consultations),
        );

        assert_eq!(base, before);
        assert_eq!(out.retrieved_knowledge().map(|k| k.len()), Some(1));
        assert_eq!(out.consultations()[0].content, "lon…");
        assert!(out.external_fragments().is_none());
    }

    #[test]
    fn test_reassembly_is_stable() {
        let assembler = ContextAssembler::new(budgets());
        let base = ConversationContext::new("q", "s").with_history(history());
        let once = assembler.assemble(&base, ContextSources::default());
        let twice = assembler.assemble(&once, ContextSources::default());
        assert_eq!(once, twice);
    }
}
