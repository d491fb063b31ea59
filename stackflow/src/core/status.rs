//! Stage kinds, action kinds and action status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A pipeline stage. Stages are totally ordered: an action in one stage
/// runs only after every action in every earlier stage has succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Fetches source; its actions are the pipeline's entry points.
    Source = 0,
    /// Turns one source artifact into one build artifact.
    Build = 1,
    /// Pushes a build artifact to every tag-matching host.
    Deploy = 2,
}

impl StageKind {
    /// All stages in execution order.
    pub const ALL: [Self; 3] = [Self::Source, Self::Build, Self::Deploy];

    /// Returns the position of the stage in the pipeline.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Returns the display name used for stage resources.
    #[must_use]
    pub const fn stage_name(self) -> &'static str {
        match self {
            Self::Source => "Source",
            Self::Build => "Build",
            Self::Deploy => "Deploy",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Build => write!(f, "build"),
            Self::Deploy => write!(f, "deploy"),
        }
    }
}

/// The type of work an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Fetches a repository revision.
    SourceFetch,
    /// Runs a build project.
    Build,
    /// Deploys to a deployment group.
    Deploy,
}

impl ActionKind {
    /// Returns the only stage this kind of action may live in.
    #[must_use]
    pub const fn stage(self) -> StageKind {
        match self {
            Self::SourceFetch => StageKind::Source,
            Self::Build => StageKind::Build,
            Self::Deploy => StageKind::Deploy,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceFetch => write!(f, "source_fetch"),
            Self::Build => write!(f, "build"),
            Self::Deploy => write!(f, "deploy"),
        }
    }
}

/// The execution status of a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Not started.
    #[default]
    Pending,
    /// Currently running.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with a failure.
    Failed,
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl ActionStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        assert!(StageKind::Source < StageKind::Build);
        assert!(StageKind::Build < StageKind::Deploy);
        assert_eq!(StageKind::Deploy.ordinal(), 2);
        assert_eq!(StageKind::ALL.len(), 3);
    }

    #[test]
    fn test_action_kind_stage() {
        assert_eq!(ActionKind::SourceFetch.stage(), StageKind::Source);
        assert_eq!(ActionKind::Build.stage(), StageKind::Build);
        assert_eq!(ActionKind::Deploy.stage(), StageKind::Deploy);
    }

    #[test]
    fn test_display() {
        assert_eq!(StageKind::Build.to_string(), "build");
        assert_eq!(StageKind::Build.stage_name(), "Build");
        assert_eq!(ActionKind::SourceFetch.to_string(), "source_fetch");
        assert_eq!(ActionStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_action_status_terminal() {
        assert!(ActionStatus::Succeeded.is_terminal());
        assert!(ActionStatus::Failed.is_terminal());
        assert!(!ActionStatus::Running.is_terminal());
        assert!(!ActionStatus::Failed.is_success());
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_string(&ActionKind::SourceFetch).unwrap();
        assert_eq!(json, r#""source_fetch""#);

        let kind: StageKind = serde_json::from_str(r#""deploy""#).unwrap();
        assert_eq!(kind, StageKind::Deploy);
    }
}
