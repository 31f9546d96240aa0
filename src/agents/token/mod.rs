//! Token estimation and budget accounting

mod budget;
mod counter;

pub use budget::TokenBudget;
pub use counter::TokenCounter;
