//! Agent loop
//!
//! Drives one task to completion: invoke the model with the transcript and
//! the tool catalog, dispatch any requested tool calls, append their results,
//! and repeat until the model answers without tools or a bound is hit.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::agent::loop_state::{AgentLoopState, LoopEvent, LoopPhase, TerminationReason};
use crate::agent::transcript::Transcript;
use crate::core::{AgentError, Message, Result, ToolCall, ToolError};
use crate::llm::{GenerateOptions, LLMProvider};
use crate::tools::ToolRegistry;

/// Settings for one agent loop
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Maximum model invocations per run (must be positive)
    pub max_iterations: usize,
    /// Optional wall-clock limit for a whole run
    pub timeout: Option<Duration>,
    /// Run the tool calls of one round concurrently
    pub parallel_tools: bool,
    /// Sampling temperature passed to the model
    pub temperature: Option<f32>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            timeout: None,
            parallel_tools: true,
            temperature: None,
        }
    }
}

/// Result of a run that stopped without a fatal error
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Final (or best-effort) answer
    pub answer: String,
    /// Why the run stopped
    pub reason: TerminationReason,
    /// Full transcript, including the seed messages
    pub transcript: Transcript,
    /// Model invocations that completed
    pub iterations: usize,
}

impl AgentOutcome {
    /// Whether the model reached a natural conclusion
    pub fn is_complete(&self) -> bool {
        self.reason == TerminationReason::Completed
    }
}

/// A run aborted by a client failure or a contract violation.
///
/// Carries the transcript as it stood when the run stopped.
#[derive(Debug, Error)]
#[error("agent run failed: {error}")]
pub struct AgentFailure {
    #[source]
    pub error: AgentError,
    pub transcript: Transcript,
}

impl AgentFailure {
    /// Always `fatal-error`
    pub fn reason(&self) -> TerminationReason {
        TerminationReason::FatalError
    }
}

/// Bounded tool-calling agent loop
///
/// Holds no per-run state, so one instance can serve concurrent runs.
pub struct AgentLoop {
    llm: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    settings: AgentSettings,
}

impl AgentLoop {
    /// Create a loop over a provider and a shared tool registry
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
        settings: AgentSettings,
    ) -> Result<Self> {
        if settings.max_iterations == 0 {
            return Err(AgentError::config("max_iterations must be at least 1"));
        }
        Ok(Self {
            llm,
            tools,
            settings,
        })
    }

    /// Current settings
    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// The shared tool registry
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// The language-model provider
    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.llm
    }

    /// Seed a transcript with an optional system prompt and a user request, then run it
    pub async fn run_prompt(
        &self,
        system_prompt: Option<&str>,
        user_input: &str,
    ) -> std::result::Result<AgentOutcome, AgentFailure> {
        self.run(Transcript::seeded(system_prompt, user_input)).await
    }

    /// Run the loop over `transcript` until it terminates
    pub async fn run(
        &self,
        mut transcript: Transcript,
    ) -> std::result::Result<AgentOutcome, AgentFailure> {
        if !transcript.has_user_message() {
            return Err(AgentFailure {
                error: AgentError::transcript("must contain at least one user message"),
                transcript,
            });
        }

        let deadline = self.settings.timeout.map(|t| Instant::now() + t);
        let tool_defs = self.tools.describe_all();
        let options = GenerateOptions {
            temperature: self.settings.temperature,
            ..Default::default()
        };
        let mut state = AgentLoopState::new(self.settings.max_iterations);

        tracing::info!(
            model = self.llm.model(),
            max_iterations = state.max_iterations,
            tools = tool_defs.len(),
            "starting agent run"
        );

        while state.should_continue() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                state.transition(LoopEvent::DeadlineElapsed);
                break;
            }

            let turn = state.iteration + 1;
            tracing::debug!(turn, max = state.max_iterations, "invoking model");

            let reply = self.llm.chat_with_tools(
                transcript.messages(),
                &tool_defs,
                Some(options.clone()),
            );
            let response = match within(deadline, reply).await {
                None => {
                    state.transition(LoopEvent::DeadlineElapsed);
                    break;
                }
                Some(Err(error)) => {
                    state.transition(LoopEvent::ClientFailed);
                    tracing::warn!(turn, %error, "model invocation failed");
                    return Err(AgentFailure { error, transcript });
                }
                Some(Ok(response)) => response,
            };

            let message = response.into_message();
            let calls = message.calls().to_vec();
            transcript.push(message);

            if calls.is_empty() {
                state.transition(LoopEvent::FinalAnswer);
                break;
            }

            let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
            tracing::info!(
                turn,
                count = calls.len(),
                tools = %names.join(", "),
                "dispatching tool calls"
            );

            let (results, timed_out) = self.dispatch(&calls, deadline).await;
            for (call, content) in calls.iter().zip(results) {
                transcript.push(Message::tool(&call.id, content));
            }

            if timed_out {
                state.transition(LoopEvent::ToolRoundInterrupted);
            } else {
                state.transition(LoopEvent::ToolRoundFinished);
            }
        }

        // The loop only exits on a terminal phase.
        let reason = state
            .phase
            .reason()
            .unwrap_or(TerminationReason::MaxIterationsExhausted);

        let answer = match state.phase {
            LoopPhase::Completed => transcript
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
            _ => transcript.best_effort_answer(),
        };

        tracing::info!(
            %reason,
            iterations = state.iteration,
            messages = transcript.len(),
            "agent run finished"
        );

        Ok(AgentOutcome {
            answer,
            reason,
            transcript,
            iterations: state.iteration,
        })
    }

    /// Execute one round of tool calls.
    ///
    /// Returns one content string per call, in call order, and whether the
    /// deadline cut the round short. Calls without a result at the deadline
    /// are reported as cancelled; their tasks are aborted and any late
    /// result is dropped.
    async fn dispatch(&self, calls: &[ToolCall], deadline: Option<Instant>) -> (Vec<String>, bool) {
        let mut results: Vec<Option<std::result::Result<String, ToolError>>> =
            vec![None; calls.len()];
        let mut timed_out = false;

        if self.settings.parallel_tools {
            let mut set = JoinSet::new();
            for (index, call) in calls.iter().cloned().enumerate() {
                let tools = Arc::clone(&self.tools);
                set.spawn(async move { (index, execute_isolated(&tools, &call).await) });
            }

            loop {
                match within(deadline, set.join_next()).await {
                    None => {
                        timed_out = true;
                        set.abort_all();
                        break;
                    }
                    Some(None) => break,
                    Some(Some(Ok((index, result)))) => results[index] = Some(result),
                    Some(Some(Err(e))) => tracing::warn!(error = %e, "tool task failed"),
                }
            }
        } else {
            for (index, call) in calls.iter().enumerate() {
                match within(deadline, execute_isolated(&self.tools, call)).await {
                    Some(result) => results[index] = Some(result),
                    None => {
                        timed_out = true;
                        break;
                    }
                }
            }
        }

        let contents = calls
            .iter()
            .zip(results)
            .map(|(call, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(if timed_out {
                        ToolError::Cancelled {
                            name: call.name.clone(),
                        }
                    } else {
                        ToolError::Execution {
                            name: call.name.clone(),
                            reason: "tool task did not complete".to_string(),
                        }
                    })
                });
                result.unwrap_or_else(|e| e.to_string())
            })
            .collect();

        (contents, timed_out)
    }
}

/// Execute a call, turning a panicking tool into an execution failure
async fn execute_isolated(
    tools: &ToolRegistry,
    call: &ToolCall,
) -> std::result::Result<String, ToolError> {
    AssertUnwindSafe(tools.execute(call))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            Err(ToolError::Execution {
                name: call.name.clone(),
                reason: "tool panicked".to_string(),
            })
        })
}

/// Await `fut`, giving up at `deadline` if one is set
async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Role, ToolOutput};
    use crate::llm::{LLMResponse, StreamCallback};
    use crate::tools::FnTool;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::core::ToolDefinition;

    /// Replays canned responses, then keeps repeating the last one
    struct Scripted {
        responses: Mutex<Vec<LLMResponse>>,
    }

    impl Scripted {
        fn new(mut responses: Vec<LLMResponse>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        async fn chat(
            &self,
            messages: &[Message],
            options: Option<GenerateOptions>,
        ) -> Result<LLMResponse> {
            self.chat_with_tools(messages, &[], options).await
        }

        async fn chat_with_tools(
            &self,
            _messages: &[Message],
            _tools: &[ToolDefinition],
            _options: Option<GenerateOptions>,
        ) -> Result<LLMResponse> {
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                Ok(responses.pop().unwrap())
            } else {
                responses
                    .last()
                    .cloned()
                    .ok_or_else(|| AgentError::llm("script exhausted"))
            }
        }

        async fn chat_stream(
            &self,
            messages: &[Message],
            options: Option<GenerateOptions>,
            _on_token: StreamCallback,
        ) -> Result<LLMResponse> {
            self.chat(messages, options).await
        }

        fn model(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register(FnTool::new("echo", "echo", json!({}), |args| {
                Ok(ToolOutput::text(args["text"].as_str().unwrap_or_default()))
            }))
            .unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let settings = AgentSettings {
            max_iterations: 0,
            ..AgentSettings::default()
        };
        let result = AgentLoop::new(Scripted::new(vec![]), registry(), settings);
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[tokio::test]
    async fn test_transcript_without_user_message_is_rejected() {
        let agent = AgentLoop::new(
            Scripted::new(vec![LLMResponse::text("hi")]),
            registry(),
            AgentSettings::default(),
        )
        .unwrap();

        let seed = Transcript::from(vec![Message::system("rules")]);
        let failure = agent.run(seed.clone()).await.unwrap_err();
        assert!(matches!(failure.error, AgentError::InvalidTranscript(_)));
        assert_eq!(failure.transcript, seed);
    }

    #[tokio::test]
    async fn test_sequential_dispatch_keeps_order() {
        let agent = AgentLoop::new(
            Scripted::new(vec![
                LLMResponse::with_tool_calls(
                    "",
                    vec![
                        ToolCall::new("a", "echo", json!({"text": "first"})),
                        ToolCall::new("b", "echo", json!({"text": "second"})),
                    ],
                ),
                LLMResponse::text("done"),
            ]),
            registry(),
            AgentSettings {
                parallel_tools: false,
                ..AgentSettings::default()
            },
        )
        .unwrap();

        let outcome = agent.run_prompt(None, "go").await.unwrap();
        let tool_messages: Vec<_> = outcome
            .transcript
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| (m.tool_call_id.clone().unwrap(), m.content.clone()))
            .collect();
        assert_eq!(
            tool_messages,
            vec![
                ("a".to_string(), "first".to_string()),
                ("b".to_string(), "second".to_string())
            ]
        );
        assert_eq!(outcome.answer, "done");
    }

    #[tokio::test]
    async fn test_within_without_deadline() {
        assert_eq!(within(None, async { 7 }).await, Some(7));
        let past = Instant::now();
        let pending = within(Some(past), futures::future::pending::<()>()).await;
        assert!(pending.is_none());
    }
}
