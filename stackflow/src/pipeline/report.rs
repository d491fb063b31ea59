//! Run reports.

use super::ExecutionState;
use crate::core::{ActionKind, ActionStatus, Artifact, ArtifactName, StageKind};
use crate::errors::ActionFailure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Outcome of deploying to one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HostOutcome {
    /// The host now runs the new artifact.
    Updated,
    /// The host kept whatever it ran before.
    Failed {
        /// Why the host was not updated.
        reason: String,
    },
}

/// One host's deployment result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDeployment {
    /// The host id.
    pub host: String,
    /// What happened.
    #[serde(flatten)]
    pub outcome: HostOutcome,
}

/// What a deploy action did across its targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReport {
    /// Deployment group name.
    pub group: String,
    /// Host ids the selector resolved to when the action started.
    pub targets: BTreeSet<String>,
    /// Per-host results, ordered by host id.
    pub hosts: Vec<HostDeployment>,
    /// Set when the selector matched no host. The action still succeeds.
    pub targeting_mismatch: bool,
}

impl DeployReport {
    /// Hosts that received the artifact.
    #[must_use]
    pub fn updated(&self) -> Vec<&str> {
        self.hosts
            .iter()
            .filter(|h| h.outcome == HostOutcome::Updated)
            .map(|h| h.host.as_str())
            .collect()
    }

    /// Hosts left on their previous version.
    #[must_use]
    pub fn stale(&self) -> Vec<&str> {
        self.hosts
            .iter()
            .filter(|h| matches!(h.outcome, HostOutcome::Failed { .. }))
            .map(|h| h.host.as_str())
            .collect()
    }
}

/// The result of one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionReport {
    /// Action name.
    pub action: String,
    /// Action kind.
    pub kind: ActionKind,
    /// Stage the action ran in.
    pub stage: StageKind,
    /// Final status.
    pub status: ActionStatus,
    /// Artifacts the action produced.
    #[serde(default)]
    pub outputs: Vec<ArtifactName>,
    /// Failures reported by collaborators. A deploy action may carry one
    /// per failed host.
    #[serde(default)]
    pub failures: Vec<ActionFailure>,
    /// Deploy details, for deploy actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeployReport>,
    /// Wall-clock duration.
    pub duration_ms: f64,
}

impl ActionReport {
    /// Returns true if the action succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Everything that happened during one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Run id.
    pub run_id: Uuid,
    /// Pipeline name.
    pub pipeline: String,
    /// What triggered the run.
    pub trigger: String,
    /// Final state.
    pub state: ExecutionState,
    /// Every state visited.
    pub history: Vec<ExecutionState>,
    /// Per-action results in completion order within each stage.
    pub actions: Vec<ActionReport>,
    /// Every artifact produced during the run.
    pub artifacts: Vec<Artifact>,
    /// Produced artifacts that no action consumed.
    pub unconsumed: Vec<ArtifactName>,
    /// When the run started.
    pub started_at: String,
    /// When the run finished.
    pub finished_at: String,
    /// Total duration.
    pub duration_ms: f64,
}

impl PipelineRun {
    /// Returns true if the run ended in `Succeeded`.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state == ExecutionState::Succeeded
    }

    /// Looks up an action's report.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&ActionReport> {
        self.actions.iter().find(|a| a.action == name)
    }

    /// Returns every recorded failure.
    pub fn failures(&self) -> impl Iterator<Item = &ActionFailure> {
        self.actions.iter().flat_map(|a| a.failures.iter())
    }

    /// Returns the deploy reports in execution order.
    pub fn deploy_reports(&self) -> impl Iterator<Item = &DeployReport> {
        self.actions.iter().filter_map(|a| a.deploy.as_ref())
    }

    /// Returns true if any deploy action matched no host.
    #[must_use]
    pub fn targeting_mismatch(&self) -> bool {
        self.deploy_reports().any(|d| d.targeting_mismatch)
    }

    /// Returns true if an artifact with this name was produced.
    #[must_use]
    pub fn produced(&self, name: &str) -> bool {
        self.artifacts.iter().any(|a| a.name.as_str() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_report_partitions_hosts() {
        let report = DeployReport {
            group: "g".to_string(),
            targets: ["i-1", "i-2", "i-3"].iter().map(ToString::to_string).collect(),
            hosts: vec![
                HostDeployment {
                    host: "i-1".to_string(),
                    outcome: HostOutcome::Updated,
                },
                HostDeployment {
                    host: "i-2".to_string(),
                    outcome: HostOutcome::Failed {
                        reason: "agent unreachable".to_string(),
                    },
                },
                HostDeployment {
                    host: "i-3".to_string(),
                    outcome: HostOutcome::Updated,
                },
            ],
            targeting_mismatch: false,
        };

        assert_eq!(report.updated(), vec!["i-1", "i-3"]);
        assert_eq!(report.stale(), vec!["i-2"]);
    }

    #[test]
    fn test_host_deployment_serializes_flat() {
        let json = serde_json::to_value(HostDeployment {
            host: "i-2".to_string(),
            outcome: HostOutcome::Failed {
                reason: "boom".to_string(),
            },
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"host": "i-2", "outcome": "failed", "reason": "boom"})
        );
    }
}
