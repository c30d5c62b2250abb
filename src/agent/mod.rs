//! Agent module - the bounded tool-calling loop
//!
//! Contains the transcript, the loop state machine, and the runner that
//! coordinates model calls with tool execution.

pub mod loop_state;
pub mod runner;
pub mod transcript;

pub use loop_state::{AgentLoopState, LoopEvent, LoopPhase, TerminationReason};
pub use runner::{AgentFailure, AgentLoop, AgentOutcome, AgentSettings};
pub use transcript::Transcript;
