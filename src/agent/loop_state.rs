//! Agent loop state management
//!
//! A bounded state machine: every iteration ends in exactly one event, and
//! [`AgentLoopState::transition`] is the only place the phase changes.

use serde::{Deserialize, Serialize};

/// Phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Running,
    Completed,
    Exhausted,
    TimedOut,
    Fatal,
}

impl LoopPhase {
    /// Whether the run has stopped
    pub fn is_terminal(self) -> bool {
        !matches!(self, LoopPhase::Running)
    }

    /// Termination reason for a stopped run
    pub fn reason(self) -> Option<TerminationReason> {
        match self {
            LoopPhase::Running => None,
            LoopPhase::Completed => Some(TerminationReason::Completed),
            LoopPhase::Exhausted => Some(TerminationReason::MaxIterationsExhausted),
            LoopPhase::TimedOut => Some(TerminationReason::TimedOut),
            LoopPhase::Fatal => Some(TerminationReason::FatalError),
        }
    }
}

/// What happened during one step of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    /// The model answered without requesting tools
    FinalAnswer,
    /// Every requested tool call of this iteration has a result
    ToolRoundFinished,
    /// The deadline passed while tool calls were still running
    ToolRoundInterrupted,
    /// The wall-clock deadline passed
    DeadlineElapsed,
    /// The language-model client failed
    ClientFailed,
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    Completed,
    MaxIterationsExhausted,
    TimedOut,
    FatalError,
}

impl TerminationReason {
    /// Tag used in logs and serialized output
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationReason::Completed => "completed",
            TerminationReason::MaxIterationsExhausted => "max-iterations-exhausted",
            TerminationReason::TimedOut => "timed-out",
            TerminationReason::FatalError => "fatal-error",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the agent loop
#[derive(Debug, Clone)]
pub struct AgentLoopState {
    /// Completed iterations
    pub iteration: usize,
    /// Maximum allowed iterations
    pub max_iterations: usize,
    /// Current phase
    pub phase: LoopPhase,
}

impl AgentLoopState {
    /// Create a new loop state with the given bound
    pub fn new(max_iterations: usize) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            phase: LoopPhase::Running,
        }
    }

    /// Check if the loop should continue
    pub fn should_continue(&self) -> bool {
        self.phase == LoopPhase::Running
    }

    /// Apply an event and return the resulting phase.
    ///
    /// Terminal phases absorb every further event.
    pub fn transition(&mut self, event: LoopEvent) -> LoopPhase {
        if self.phase.is_terminal() {
            return self.phase;
        }

        self.phase = match event {
            LoopEvent::FinalAnswer => {
                self.iteration += 1;
                LoopPhase::Completed
            }
            LoopEvent::ToolRoundFinished => {
                self.iteration += 1;
                if self.iteration >= self.max_iterations {
                    LoopPhase::Exhausted
                } else {
                    LoopPhase::Running
                }
            }
            LoopEvent::ToolRoundInterrupted => {
                self.iteration += 1;
                LoopPhase::TimedOut
            }
            LoopEvent::DeadlineElapsed => LoopPhase::TimedOut,
            LoopEvent::ClientFailed => LoopPhase::Fatal,
        };
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_state_new() {
        let state = AgentLoopState::new(10);
        assert_eq!(state.iteration, 0);
        assert_eq!(state.max_iterations, 10);
        assert!(state.should_continue());
    }

    #[test]
    fn test_exhaustion_after_bound() {
        let mut state = AgentLoopState::new(2);
        assert_eq!(state.transition(LoopEvent::ToolRoundFinished), LoopPhase::Running);
        assert_eq!(state.transition(LoopEvent::ToolRoundFinished), LoopPhase::Exhausted);
        assert!(!state.should_continue());
        assert_eq!(state.iteration, 2);
    }

    #[test]
    fn test_single_iteration_bound() {
        let mut state = AgentLoopState::new(1);
        assert_eq!(state.transition(LoopEvent::ToolRoundFinished), LoopPhase::Exhausted);
        assert_eq!(
            state.phase.reason(),
            Some(TerminationReason::MaxIterationsExhausted)
        );
    }

    #[test]
    fn test_final_answer_completes() {
        let mut state = AgentLoopState::new(5);
        state.transition(LoopEvent::ToolRoundFinished);
        assert_eq!(state.transition(LoopEvent::FinalAnswer), LoopPhase::Completed);
        assert_eq!(state.iteration, 2);
    }

    #[test]
    fn test_timeout_and_fatal() {
        let mut state = AgentLoopState::new(5);
        assert_eq!(state.transition(LoopEvent::DeadlineElapsed), LoopPhase::TimedOut);

        let mut state = AgentLoopState::new(5);
        assert_eq!(state.transition(LoopEvent::ClientFailed), LoopPhase::Fatal);
        assert_eq!(state.phase.reason(), Some(TerminationReason::FatalError));
    }

    #[test]
    fn test_interrupted_tool_round_counts_model_call() {
        let mut state = AgentLoopState::new(5);
        state.transition(LoopEvent::ToolRoundFinished);
        assert_eq!(
            state.transition(LoopEvent::ToolRoundInterrupted),
            LoopPhase::TimedOut
        );
        assert_eq!(state.iteration, 2);

        let mut state = AgentLoopState::new(5);
        state.transition(LoopEvent::DeadlineElapsed);
        assert_eq!(state.iteration, 0);
    }

    #[test]
    fn test_terminal_phase_absorbs_events() {
        let mut state = AgentLoopState::new(5);
        state.transition(LoopEvent::FinalAnswer);
        assert_eq!(state.transition(LoopEvent::ClientFailed), LoopPhase::Completed);
        assert_eq!(state.transition(LoopEvent::ToolRoundFinished), LoopPhase::Completed);
        assert_eq!(state.iteration, 1);
    }

    #[test]
    fn test_reason_tags() {
        assert_eq!(
            serde_json::to_string(&TerminationReason::MaxIterationsExhausted).unwrap(),
            "\"max-iterations-exhausted\""
        );
        assert_eq!(TerminationReason::TimedOut.to_string(), "timed-out");
        assert_eq!(LoopPhase::Running.reason(), None);
    }
}
