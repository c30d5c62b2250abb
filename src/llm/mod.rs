//! LLM module - Language Model integrations
//!
//! Provides the provider abstraction the agent loop drives, with an
//! OpenAI-compatible HTTP implementation.

pub mod openai;
pub mod traits;

pub use openai::OpenAiClient;
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, StreamCallback, TokenUsage};
