//! Tool call records reported by providers

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call made by an agent during an invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool being called
    pub name: String,
    /// Arguments passed to the tool (as JSON)
    pub arguments: Value,
}

impl ToolCallRecord {
    /// Create a new tool call record
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Generate an id for providers that do not supply one
    pub fn generate_id() -> String {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        format!("call_{}", &raw[..24])
    }
}
