//! Token counting utilities

use crate::agents::domain::Message;

/// Approximate token counter based on a chars-per-token ratio
#[derive(Debug, Clone, Copy)]
pub struct TokenCounter {
    chars_per_token: f32,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::with_ratio(4.0)
    }

    /// Create with a specific chars-per-token ratio; non-positive ratios fall back to 4.0
    pub fn with_ratio(chars_per_token: f32) -> Self {
        let chars_per_token = if chars_per_token.is_finite() && chars_per_token > 0.0 {
            chars_per_token
        } else {
            4.0
        };
        Self { chars_per_token }
    }

    pub fn chars_per_token(&self) -> f32 {
        self.chars_per_token
    }

    /// Estimated tokens in `text`
    pub fn count(&self, text: &str) -> usize {
        (text.chars().count() as f32 / self.chars_per_token).ceil() as usize
    }

    /// Estimated tokens in a message, including role overhead
    pub fn count_message(&self, message: &Message) -> usize {
        self.count(&message.content) + 4
    }

    /// Estimated tokens in a conversation
    pub fn count_messages(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.count_message(m)).sum::<usize>() + 3
    }

    /// Character allowance for a token budget
    pub fn chars_for(&self, tokens: usize) -> usize {
        (tokens as f32 * self.chars_per_token).floor() as usize
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}
