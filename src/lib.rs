//! hello-agent - a bounded tool-calling agent
//!
//! Drives an OpenAI-compatible chat model in a loop: the model either answers
//! or asks for tools, the tools run (concurrently within a round) and their
//! results go back into the transcript, until the model answers, the iteration
//! bound is reached, or the deadline passes.
//!
//! # Architecture
//!
//! - **Core**: Message model, configuration, and error handling
//! - **LLM**: Provider trait with an OpenAI-compatible client
//! - **Tools**: Tool registry with filesystem and web-search tools
//! - **Agent**: Transcript, loop state machine, and the agent loop itself
//! - **CLI**: Interactive REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hello_agent::{AgentLoop, Config, OpenAiClient, ToolRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let client = Arc::new(OpenAiClient::new(&config.llm)?);
//!     let tools = Arc::new(ToolRegistry::with_builtin_tools(&config.tools)?);
//!     let agent = AgentLoop::new(client, tools, config.agent.settings(config.llm.temperature))?;
//!
//!     let outcome = agent.run_prompt(None, "What is in README.md?").await?;
//!     println!("{} ({})", outcome.answer, outcome.reason);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod tools;

// Re-export commonly used items
pub use agent::{AgentFailure, AgentLoop, AgentOutcome, AgentSettings, TerminationReason, Transcript};
pub use cli::Repl;
pub use core::{AgentError, Config, Result};
pub use llm::{LLMProvider, OpenAiClient};
pub use tools::ToolRegistry;
