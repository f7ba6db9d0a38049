//! MCP tool implementations.
//!
//! This module contains all tools exposed by the sw-cache server. Each tool
//! returns its output as pretty-printed JSON text content.

pub mod cache;
pub mod fetch;
pub mod precache;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use swcache_core::Error;

pub use fetch::{SwFetchOutput, SwFetchParams};

/// Serialize a tool output into a successful result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod test_support {
    use rmcp::model::CallToolResult;
    use serde::de::DeserializeOwned;

    /// Parse the JSON text content of a tool result.
    pub fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
