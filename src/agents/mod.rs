//! Multi-agent coordination for Consilium
//!
//! Answers one user query by selecting a primary agent plus supporting
//! agents, running them under a coordination mode, and aggregating the
//! results into a single response with a full interaction trace.
//!
//! ## Architecture
//!
//! - `domain/` - Core types (descriptors, context, results, traces) and ports
//! - `llm/` - LLM provider implementations
//! - `registry` - Immutable agent registry backed by providers
//! - `selection/` - Keyword and script rules choosing primary and supporting agents
//! - `context/` - Per-agent context assembly under token budgets
//! - `invoker/` - Single-agent invocation with deadlines and retries
//! - `orchestration/` - The coordination engine and its four modes
//! - `handler` - Hot-swappable engine behind the `CoordinationPort`

pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod handler;
pub mod invoker;
pub mod llm;
pub mod orchestration;
pub mod registry;
pub mod selection;
pub mod token;

// Re-export commonly used types
pub use config::*;
pub use domain::*;
pub use error::*;
pub use handler::CoordinatorHandler;
pub use orchestration::CoordinationEngine;
pub use registry::AgentRegistry;
