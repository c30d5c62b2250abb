//! Error types for hello-agent
//!
//! `AgentError` covers everything that can abort a run or fail a setup step.
//! Tool-level failures are not errors at this level: they are folded into the
//! transcript as data (see [`crate::core::ToolError`]).

use thiserror::Error;

/// Main error type for agent operations
#[derive(Error, Debug)]
pub enum AgentError {
    /// Language-model client failures (connection, malformed response)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Non-success HTTP status returned by a remote API
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A tool with the same name is already registered
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    /// The transcript handed to the loop breaks its contract
    #[error("Invalid transcript: {0}")]
    InvalidTranscript(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Create an LLM client error
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid transcript error
    pub fn transcript(msg: impl Into<String>) -> Self {
        Self::InvalidTranscript(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = AgentError::Api {
            status: 401,
            body: "invalid api key".to_string(),
        };
        assert_eq!(err.to_string(), "API error (401): invalid api key");
    }

    #[test]
    fn test_duplicate_tool_display() {
        let err = AgentError::DuplicateTool("read_file".to_string());
        assert!(err.to_string().contains("read_file"));
    }
}
