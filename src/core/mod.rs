//! Core module - shared infrastructure for hello-agent
//!
//! This module contains the message model, configuration, and error handling
//! used throughout the crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{AgentError, Result};
pub use types::*;
