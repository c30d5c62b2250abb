//! Shared types used across hello-agent modules
//!
//! Contains the message model, tool call and declaration structures, and the
//! tool result sum type with its text coercion.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A message in a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message (may be empty when tool calls are present)
    #[serde(default)]
    pub content: String,
    /// Tool calls requested by the assistant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Correlates a tool result with the call that produced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Create an assistant message that requests tool calls
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Create a tool result message for the given call id
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Whether this message requests at least one tool call.
    ///
    /// An empty `tool_calls` list counts as no request at all.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }

    /// Tool calls carried by this message, empty when there are none
    pub fn calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

/// A tool call made by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation token, unique within one assistant turn
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// JSON arguments for the tool
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Get a string argument by key
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

/// Declaration of a tool presented to the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (always "function" for now)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function details
    pub function: FunctionDefinition,
}

/// Function definition within a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// Name of the declared tool
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Raw result produced by a tool
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Plain text, used as-is
    Text(String),
    /// Structured fields; only a string `text` field can be rendered
    Structured(Map<String, Value>),
    /// The tool ran but reports failure
    Failure(String),
}

impl ToolOutput {
    /// Create a text output
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Create a failure output
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(reason.into())
    }

    /// Coerce the output into the text placed in a `tool` message.
    ///
    /// Priority: text as-is, then a string `text` field of a structured
    /// result. Anything else is a coercion error rather than malformed content.
    pub fn into_text(self, tool_name: &str) -> Result<String, ToolError> {
        match self {
            ToolOutput::Text(text) => Ok(text),
            ToolOutput::Structured(mut fields) => match fields.remove("text") {
                Some(Value::String(text)) => Ok(text),
                _ => Err(ToolError::Coercion {
                    name: tool_name.to_string(),
                }),
            },
            ToolOutput::Failure(reason) => Err(ToolError::Execution {
                name: tool_name.to_string(),
                reason,
            }),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Marker text carried by every unresolved-tool message
pub const UNRESOLVED_TOOL_MARKER: &str = "unresolved tool";

/// Recoverable tool failures; the `Display` output becomes the tool message content
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The requested tool is not in the registry
    #[error("Error: unresolved tool '{name}'. Available tools: {available}")]
    Unresolved { name: String, available: String },

    /// The tool ran and failed
    #[error("Error: tool '{name}' failed: {reason}")]
    Execution { name: String, reason: String },

    /// The tool returned a structured result without a text field
    #[error("Error: tool '{name}' returned a structured result without a 'text' field; try different arguments")]
    Coercion { name: String },

    /// The run stopped before the tool finished
    #[error("Error: tool '{name}' was cancelled because the run timed out")]
    Cancelled { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_tool_calls_is_no_request() {
        let msg = Message::assistant_with_tools("done", vec![]);
        assert!(!msg.has_tool_calls());
        assert!(msg.calls().is_empty());
        assert!(!Message::assistant("done").has_tool_calls());
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json, json!({"role": "user", "content": "hi"}));

        let json = serde_json::to_value(Message::tool("call_1", "ok")).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
    }

    #[test]
    fn test_coerce_text() {
        let text = ToolOutput::text("hello").into_text("echo").unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_coerce_structured_with_text_field() {
        let mut fields = Map::new();
        fields.insert("text".to_string(), json!("from field"));
        fields.insert("extra".to_string(), json!(42));
        let text = ToolOutput::Structured(fields).into_text("lookup").unwrap();
        assert_eq!(text, "from field");
    }

    #[test]
    fn test_coerce_structured_without_text_field_fails() {
        let mut fields = Map::new();
        fields.insert("rows".to_string(), json!([1, 2, 3]));
        let err = ToolOutput::Structured(fields).into_text("query").unwrap_err();
        assert_eq!(
            err,
            ToolError::Coercion {
                name: "query".to_string()
            }
        );
    }

    #[test]
    fn test_coerce_non_string_text_field_fails() {
        let mut fields = Map::new();
        fields.insert("text".to_string(), json!({"nested": true}));
        assert!(ToolOutput::Structured(fields).into_text("query").is_err());
    }

    #[test]
    fn test_failure_becomes_execution_error() {
        let err = ToolOutput::failure("disk full").into_text("write").unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert!(err.to_string().contains("write"));
    }

    #[test]
    fn test_unresolved_message_has_marker() {
        let err = ToolError::Unresolved {
            name: "fly".to_string(),
            available: "echo".to_string(),
        };
        assert!(err.to_string().contains(UNRESOLVED_TOOL_MARKER));
    }

    #[test]
    fn test_tool_call_get_string() {
        let call = ToolCall::new("c1", "read_file", json!({"path": "a.txt", "n": 3}));
        assert_eq!(call.get_string("path").as_deref(), Some("a.txt"));
        assert_eq!(call.get_string("n"), None);
    }
}
