//! Tools module - Tool implementations for the agent
//!
//! Contains the tool registry and the built-in filesystem and search tools.

pub mod filesystem;
pub mod registry;
pub mod search;

pub use registry::{FnTool, Tool, ToolRegistry};
