//! Error types for stackflow.
//!
//! Errors fall into three families:
//!
//! - [`DefinitionError`]: raised while planning a topology or pipeline,
//!   before any external resource is touched. Always fatal to that plan.
//! - [`ActionFailure`]: reported by an external collaborator while an action
//!   runs. Recorded in the run report and drives the pipeline to `Failed`.
//! - Everything else is wrapped by [`StackflowError`].
//!
//! An empty deployment target set is deliberately *not* an error; see
//! [`crate::pipeline::DeployReport::targeting_mismatch`].

use crate::pipeline::ExecutionState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for stackflow operations.
#[derive(Debug, Error)]
pub enum StackflowError {
    /// A topology or pipeline definition was rejected.
    #[error("{0}")]
    Definition(#[from] DefinitionError),

    /// An illegal pipeline state transition was attempted.
    #[error("{0}")]
    Transition(#[from] InvalidTransitionError),

    /// An artifact was written twice within one run.
    #[error("{0}")]
    ArtifactConflict(#[from] ArtifactConflictError),

    /// The cloud provider rejected a provisioning call.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable codes attached to every [`DefinitionError`].
pub struct DefinitionCode;

impl DefinitionCode {
    /// The network was asked for zero segments.
    pub const NETWORK_EMPTY: &'static str = "DEF-NETWORK-EMPTY";
    /// A segment mask is outside what the network can hold.
    pub const NETWORK_MASK: &'static str = "DEF-NETWORK-MASK";
    /// The segments do not fit in the network's address space.
    pub const NETWORK_CAPACITY: &'static str = "DEF-NETWORK-CAPACITY";
    /// Two segments share a name.
    pub const NETWORK_DUPLICATE: &'static str = "DEF-NETWORK-DUPLICATE";
    /// A CIDR block could not be parsed.
    pub const NETWORK_CIDR: &'static str = "DEF-NETWORK-CIDR";
    /// The same ingress rule was listed twice.
    pub const ACCESS_DUPLICATE: &'static str = "DEF-ACCESS-DUPLICATE";
    /// An ingress rule uses port 0.
    pub const ACCESS_PORT: &'static str = "DEF-ACCESS-PORT";
    /// The bootstrap script could not be read.
    pub const BOOTSTRAP_UNREADABLE: &'static str = "DEF-BOOTSTRAP-UNREADABLE";
    /// A host was built without a required binding.
    pub const HOST_INCOMPLETE: &'static str = "DEF-HOST-INCOMPLETE";
    /// The host identity is malformed.
    pub const IDENTITY_INVALID: &'static str = "DEF-IDENTITY-INVALID";
    /// A tag key or value breaks the tagging rules.
    pub const TAG_INVALID: &'static str = "DEF-TAG-INVALID";
    /// A resource name breaks the naming rules.
    pub const NAME_INVALID: &'static str = "DEF-NAME-INVALID";
    /// The pipeline has no stages.
    pub const PIPELINE_EMPTY: &'static str = "DEF-PIPELINE-EMPTY";
    /// A stage has no actions.
    pub const PIPELINE_EMPTY_STAGE: &'static str = "DEF-PIPELINE-EMPTY-STAGE";
    /// Stages were added out of Source → Build → Deploy order.
    pub const PIPELINE_STAGE_ORDER: &'static str = "DEF-PIPELINE-STAGE-ORDER";
    /// An action was placed in a stage of a different kind.
    pub const PIPELINE_ACTION_KIND: &'static str = "DEF-PIPELINE-ACTION-KIND";
    /// Two actions share a name.
    pub const PIPELINE_DUPLICATE_ACTION: &'static str = "DEF-PIPELINE-DUPLICATE-ACTION";
    /// Two actions declare the same output artifact.
    pub const PIPELINE_DUPLICATE_ARTIFACT: &'static str = "DEF-PIPELINE-DUPLICATE-ARTIFACT";
    /// An input names an artifact nobody produces.
    pub const PIPELINE_UNKNOWN_ARTIFACT: &'static str = "DEF-PIPELINE-UNKNOWN-ARTIFACT";
    /// An input names an artifact produced in the same stage.
    pub const PIPELINE_FORWARD_REFERENCE: &'static str = "DEF-PIPELINE-FORWARD-REFERENCE";
    /// An action has the wrong number of inputs or outputs.
    pub const PIPELINE_ARITY: &'static str = "DEF-PIPELINE-ARITY";

    /// Gets a fix suggestion for a given code.
    #[must_use]
    pub fn suggestion(code: &str) -> Option<&'static str> {
        match code {
            Self::NETWORK_CAPACITY => Some(
                "Use a larger network block, fewer segments or a longer segment mask.",
            ),
            Self::NETWORK_MASK => Some(
                "Segment masks must be at least as long as the network prefix and at most /28.",
            ),
            Self::BOOTSTRAP_UNREADABLE => Some(
                "Check that the bootstrap script path is relative to the working directory.",
            ),
            Self::PIPELINE_FORWARD_REFERENCE | Self::PIPELINE_UNKNOWN_ARTIFACT => Some(
                "Actions may only consume artifacts produced by a strictly earlier stage.",
            ),
            Self::PIPELINE_STAGE_ORDER => Some("Add stages in Source, Build, Deploy order."),
            Self::PIPELINE_EMPTY => Some("Add at least a Source stage before building."),
            _ => None,
        }
    }
}

/// Error raised when a topology or pipeline definition is rejected.
///
/// Definition errors are always raised during planning, so no cloud
/// resource exists yet when one is returned.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct DefinitionError {
    /// Stable error code (see [`DefinitionCode`]).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Resources involved in the error.
    #[serde(default)]
    pub resources: Vec<String>,
    /// Hint for fixing the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
}

impl DefinitionError {
    /// Creates a new definition error, attaching the default suggestion for
    /// the code if one exists.
    #[must_use]
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            resources: Vec::new(),
            fix_hint: DefinitionCode::suggestion(code).map(str::to_string),
        }
    }

    /// Sets the resources involved.
    #[must_use]
    pub fn with_resources(mut self, resources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Converts to a JSON representation.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
            "resources": self.resources,
            "fix_hint": self.fix_hint,
        })
    }
}

/// Failure reported by an external collaborator while running an action.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("Action '{action}' failed{}: {reason}", .host.as_ref().map(|h| format!(" on host '{h}'")).unwrap_or_default())]
pub struct ActionFailure {
    /// The failing action. Filled in by the runner when a collaborator
    /// leaves it empty.
    pub action: String,
    /// The host involved, for per-host deploy failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Why the action failed.
    pub reason: String,
}

impl ActionFailure {
    /// Creates a failure with only a reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            action: String::new(),
            host: None,
            reason: reason.into(),
        }
    }

    /// Sets the action name if it has not been set yet.
    #[must_use]
    pub fn for_action(mut self, action: impl Into<String>) -> Self {
        if self.action.is_empty() {
            self.action = action.into();
        }
        self
    }

    /// Sets the host.
    #[must_use]
    pub fn on_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

/// Error raised when a pipeline execution attempts an illegal transition.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Invalid pipeline transition: {from} -> {to}")]
pub struct InvalidTransitionError {
    /// The current state.
    pub from: ExecutionState,
    /// The requested state.
    pub to: ExecutionState,
}

/// Error raised when an artifact is written a second time within a run.
#[derive(Debug, Clone, Error)]
#[error("Artifact conflict: '{artifact}' already produced by '{existing_producer}', rejected write from '{producer}'")]
pub struct ArtifactConflictError {
    /// The artifact name.
    pub artifact: String,
    /// The action that produced it first.
    pub existing_producer: String,
    /// The action whose write was rejected.
    pub producer: String,
}

/// Error returned by a [`crate::topology::CloudProvider`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Provider failed to create {resource}: {message}")]
pub struct ProviderError {
    /// The resource being created.
    pub resource: String,
    /// Provider message.
    pub message: String,
}

impl ProviderError {
    /// Creates a new provider error.
    #[must_use]
    pub fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_error_carries_default_hint() {
        let err = DefinitionError::new(DefinitionCode::NETWORK_CAPACITY, "does not fit")
            .with_resources(["vpc"]);

        assert_eq!(err.code, "DEF-NETWORK-CAPACITY");
        assert_eq!(err.resources, vec!["vpc".to_string()]);
        assert!(err.fix_hint.is_some());
        assert_eq!(err.to_string(), "[DEF-NETWORK-CAPACITY] does not fit");
    }

    #[test]
    fn test_definition_error_to_json() {
        let err = DefinitionError::new(DefinitionCode::TAG_INVALID, "bad key");
        let json = err.to_json();

        assert_eq!(json["code"], "DEF-TAG-INVALID");
        assert!(json["fix_hint"].is_null());
    }

    #[test]
    fn test_action_failure_display() {
        let err = ActionFailure::new("connection refused")
            .for_action("ChatApp_Deploy")
            .on_host("i-1");
        assert_eq!(
            err.to_string(),
            "Action 'ChatApp_Deploy' failed on host 'i-1': connection refused"
        );

        let err = ActionFailure::new("boom").for_action("a").for_action("b");
        assert_eq!(err.action, "a");
        assert_eq!(err.to_string(), "Action 'a' failed: boom");
    }

    #[test]
    fn test_transition_error_display() {
        let err = InvalidTransitionError {
            from: ExecutionState::Pending,
            to: ExecutionState::Deploying,
        };
        assert_eq!(err.to_string(), "Invalid pipeline transition: pending -> deploying");
    }

    #[test]
    fn test_suggestions() {
        assert!(DefinitionCode::suggestion(DefinitionCode::PIPELINE_FORWARD_REFERENCE).is_some());
        assert!(DefinitionCode::suggestion("UNKNOWN").is_none());
    }
}
