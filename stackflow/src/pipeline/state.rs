//! Pipeline execution state machine.

use crate::errors::InvalidTransitionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of one pipeline execution.
///
/// ```text
/// Pending → Sourcing → Building → Deploying → Succeeded
///     └─────────┴──────────┴───────────┴────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Waiting for a trigger.
    #[default]
    Pending,
    /// Source actions are running.
    Sourcing,
    /// Build actions are running.
    Building,
    /// Deploy actions are running.
    Deploying,
    /// Every stage succeeded.
    Succeeded,
    /// Some action failed.
    Failed,
}

impl ExecutionState {
    /// Returns true for `Succeeded` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Sourcing)
                | (Self::Sourcing, Self::Building)
                | (Self::Building, Self::Deploying)
                | (Self::Deploying, Self::Succeeded)
                | (Self::Pending | Self::Sourcing | Self::Building | Self::Deploying, Self::Failed)
        )
    }

    /// Returns the state that runs actions of the given stage.
    #[must_use]
    pub const fn for_stage(stage: crate::core::StageKind) -> Self {
        match stage {
            crate::core::StageKind::Source => Self::Sourcing,
            crate::core::StageKind::Build => Self::Building,
            crate::core::StageKind::Deploy => Self::Deploying,
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Sourcing => write!(f, "sourcing"),
            Self::Building => write!(f, "building"),
            Self::Deploying => write!(f, "deploying"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A single pipeline execution's state and the path it took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    state: ExecutionState,
    history: Vec<ExecutionState>,
}

impl Default for Execution {
    fn default() -> Self {
        Self::new()
    }
}

impl Execution {
    /// Creates an execution in `Pending`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ExecutionState::Pending,
            history: vec![ExecutionState::Pending],
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Returns every state visited, starting with `Pending`.
    #[must_use]
    pub fn history(&self) -> &[ExecutionState] {
        &self.history
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is not allowed; the state is left
    /// unchanged.
    pub fn transition(&mut self, next: ExecutionState) -> Result<(), InvalidTransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransitionError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}
