//! Transcript management
//!
//! The ordered, append-only message history of one agent run.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{AgentError, Message, Result, Role};

/// Append-only message history for a single run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Create an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transcript seeded with an optional system prompt and a user request
    pub fn seeded(system_prompt: Option<&str>, user_input: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        if let Some(prompt) = system_prompt {
            transcript.push(Message::system(prompt));
        }
        transcript.push(Message::user(user_input));
        transcript
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Consume into the underlying messages
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// The most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Get message count
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether any user message is present
    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    /// Content of the latest assistant message with non-empty text
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.content.trim().is_empty())
            .map(|m| m.content.as_str())
    }

    /// Best-effort answer for a run that stopped early: the latest assistant
    /// text if there is one, otherwise the content of the last message.
    pub fn best_effort_answer(&self) -> String {
        self.last_assistant_text()
            .or_else(|| self.last().map(|m| m.content.as_str()))
            .unwrap_or_default()
            .to_string()
    }

    /// Check tool-call correlation.
    ///
    /// Every `tool` message must answer a distinct call of the assistant
    /// message that opened its block, and every such call must be answered
    /// before the next non-tool message or the end of the transcript.
    pub fn validate(&self) -> Result<()> {
        let mut pending: Option<(usize, HashSet<&str>)> = None;

        for (i, msg) in self.messages.iter().enumerate() {
            if msg.role == Role::Tool {
                let id = msg.tool_call_id.as_deref().ok_or_else(|| {
                    AgentError::transcript(format!("tool message {} has no tool_call_id", i))
                })?;
                let (_, open) = pending.as_mut().ok_or_else(|| {
                    AgentError::transcript(format!(
                        "tool message {} does not follow an assistant tool request",
                        i
                    ))
                })?;
                if !open.remove(id) {
                    return Err(AgentError::transcript(format!(
                        "tool message {} answers unknown or already answered call '{}'",
                        i, id
                    )));
                }
                continue;
            }

            Self::check_closed(&pending)?;
            pending = None;

            if msg.role == Role::Assistant && msg.has_tool_calls() {
                let mut open = HashSet::new();
                for call in msg.calls() {
                    if !open.insert(call.id.as_str()) {
                        return Err(AgentError::transcript(format!(
                            "assistant message {} repeats call id '{}'",
                            i, call.id
                        )));
                    }
                }
                pending = Some((i, open));
            }
        }

        Self::check_closed(&pending)
    }

    fn check_closed(pending: &Option<(usize, HashSet<&str>)>) -> Result<()> {
        match pending {
            Some((at, open)) if !open.is_empty() => {
                let mut ids: Vec<&str> = open.iter().copied().collect();
                ids.sort_unstable();
                Err(AgentError::transcript(format!(
                    "assistant message {} has unanswered calls: {}",
                    at,
                    ids.join(", ")
                )))
            }
            _ => Ok(()),
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the transcript as pretty JSON to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}
