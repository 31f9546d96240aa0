//! Token budget accounting

/// A budget drawn down as context is admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    total: usize,
    consumed: usize,
}

impl TokenBudget {
    pub fn new(total: usize) -> Self {
        Self { total, consumed: 0 }
    }

    pub fn can_afford(&self, tokens: usize) -> bool {
        self.consumed + tokens <= self.total
    }

    /// Consume up to `tokens`; returns how many were granted
    pub fn take(&mut self, tokens: usize) -> usize {
        let granted = tokens.min(self.remaining());
        self.consumed += granted;
        granted
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.consumed)
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}
