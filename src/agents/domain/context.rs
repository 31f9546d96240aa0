//! Conversation context handed to agents
//!
//! A `ConversationContext` is never mutated after construction. Every step of
//! a coordination call that needs a different context builds a new value, so
//! concurrent branches can share one by `Arc` without seeing each other's
//! additions.

use serde::{Deserialize, Serialize};

use super::Message;

/// A snippet returned by the knowledge-retrieval collaborator
///
/// List order is rank: the collaborator returns the best match first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    /// Identifier of the source document or chunk
    pub source_id: String,
    /// Snippet text
    pub content: String,
    /// Relevance score reported by the retriever
    #[serde(default)]
    pub score: f32,
}

impl KnowledgeSnippet {
    pub fn new(source_id: impl Into<String>, content: impl Into<String>, score: f32) -> Self {
        Self {
            source_id: source_id.into(),
            content: content.into(),
            score,
        }
    }
}

/// Content fetched from an external document system (wiki page, issue)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalFragment {
    /// Reference the fragment was fetched for
    pub reference: String,
    /// Document title, if the fetcher knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Document text
    pub content: String,
    /// Whether `content` was cut to fit the context window
    #[serde(default)]
    pub truncated: bool,
}

impl ExternalFragment {
    pub fn new(reference: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            title: None,
            content: content.into(),
            truncated: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// How another agent's output is framed for the receiving agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationFraming {
    /// Independent output gathered by a parallel fan-out
    SupportingOutput,
    /// Response to a consultation in a collaborative mode
    ConsultationResponse,
}

/// Output of another agent made visible to the receiving agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    /// Agent that produced the output
    pub agent_id: String,
    /// Role of that agent
    pub display_role: String,
    /// Output content
    pub content: String,
    /// Presentation discriminator for prompt construction
    pub framing: ConsultationFraming,
}

/// Bounded context for one agent invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    query: String,
    product_scope_id: String,
    #[serde(default)]
    history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retrieved_knowledge: Option<Vec<KnowledgeSnippet>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    external_fragments: Option<Vec<ExternalFragment>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    consultations: Vec<Consultation>,
}

impl ConversationContext {
    /// Create a context for a query within a product scope
    pub fn new(query: impl Into<String>, product_scope_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            product_scope_id: product_scope_id.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_knowledge(mut self, snippets: Vec<KnowledgeSnippet>) -> Self {
        self.retrieved_knowledge = Some(snippets);
        self
    }

    pub fn with_fragments(mut self, fragments: Vec<ExternalFragment>) -> Self {
        self.external_fragments = Some(fragments);
        self
    }

    pub fn with_consultations(mut self, consultations: Vec<Consultation>) -> Self {
        self.consultations = consultations;
        self
    }

    /// New context with one more history entry; `self` is left untouched
    pub fn appended(&self, entry: Message) -> Self {
        let mut next = self.clone();
        next.history.push(entry);
        next
    }

    /// New context with the query replaced
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn product_scope_id(&self) -> &str {
        &self.product_scope_id
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn retrieved_knowledge(&self) -> Option<&[KnowledgeSnippet]> {
        self.retrieved_knowledge.as_deref()
    }

    pub fn external_fragments(&self) -> Option<&[ExternalFragment]> {
        self.external_fragments.as_deref()
    }

    pub fn consultations(&self) -> &[Consultation] {
        &self.consultations
    }

    /// Total characters across every source category
    pub fn char_len(&self) -> usize {
        let history: usize = self.history.iter().map(|m| m.content.chars().count()).sum();
        let knowledge: usize = self
            .retrieved_knowledge
            .iter()
            .flatten()
            .map(|s| s.content.chars().count())
            .sum();
        let fragments: usize = self
            .external_fragments
            .iter()
            .flatten()
            .map(|f| f.content.chars().count())
            .sum();
        let consultations: usize = self
            .consultations
            .iter()
            .map(|c| c.content.chars().count())
            .sum();
        self.query.chars().count() + history + knowledge + fragments + consultations
    }
}
