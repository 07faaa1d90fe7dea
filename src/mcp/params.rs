//! MCP tool parameter types.
//!
//! Defines the input schemas for MCP tools using `schemars` for automatic
//! JSON Schema generation required by the MCP protocol.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `ask` MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskParams {
    /// The course question to answer.
    pub query: String,

    /// Include the full pipeline state instead of just the answer.
    #[serde(default)]
    pub include_state: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_state_defaults_false() {
        let params: AskParams =
            serde_json::from_str(r#"{"query": "Who teaches CS 5800?"}"#).unwrap();
        assert_eq!(params.query, "Who teaches CS 5800?");
        assert!(!params.include_state);
    }
}
