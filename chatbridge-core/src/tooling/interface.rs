use async_trait::async_trait;
use serde_json::Value;

use super::error::ToolInvokeError;
use crate::types::ToolDescriptor;

/// What the chat loop needs from the tool side.
#[async_trait]
pub trait ToolServerInterface: Send + Sync {
    /// Flattened tool catalogue, or one server's tools.
    async fn tools(&self, server: Option<&str>) -> Vec<ToolDescriptor>;

    /// Name of the connected server that owns `tool`, if any.
    async fn resolve_server(&self, tool: &str) -> Option<String>;

    async fn invoke_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
    ) -> Result<Value, ToolInvokeError>;
}
