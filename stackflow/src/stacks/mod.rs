//! The two stacks of the chat server deployment and the check that ties
//! them together.
//!
//! The stacks are independent: the pipeline never references the host it
//! deploys to. They meet only through tags, so [`check_targeting`] is the
//! one place that looks at both plans at once.

mod chat_server;
mod delivery_pipeline;

pub use chat_server::ChatServerStack;
pub use delivery_pipeline::DeliveryPipelineStack;

use crate::pipeline::PipelineDefinition;
use crate::topology::TopologyPlan;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A deploy action whose selector matches none of the planned hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetingFinding {
    /// The deploy action.
    pub action: String,
    /// Its deployment group.
    pub group: String,
    /// The host that was checked.
    pub host: String,
    /// One line per selector key the host fails.
    pub mismatches: Vec<String>,
}

/// Reports every deploy action in `pipeline` that would deploy to nothing
/// if `topology` were the whole fleet.
///
/// This does not change either plan. A finding is a warning: the pipeline
/// still runs and its deploy stage succeeds with no targets.
#[must_use]
pub fn check_targeting(
    topology: &TopologyPlan,
    pipeline: &PipelineDefinition,
) -> Vec<TargetingFinding> {
    let host = &topology.host;
    let mut findings = Vec::new();

    for action in pipeline.deploy_actions() {
        let Some(group) = action.deployment_group() else {
            continue;
        };
        if group.selector.matches(&host.tags) {
            continue;
        }

        let mismatches: Vec<String> = group
            .selector
            .iter()
            .filter_map(|(key, allowed)| {
                let allowed_list = allowed.iter().cloned().collect::<Vec<_>>().join(", ");
                match host.tags.get(key) {
                    Some(value) if allowed.contains(value) => None,
                    Some(value) => Some(format!(
                        "tag '{key}' is '{value}', selector allows [{allowed_list}]"
                    )),
                    None => Some(format!(
                        "tag '{key}' is missing, selector allows [{allowed_list}]"
                    )),
                }
            })
            .collect();

        warn!(
            action = %action.name,
            group = %group.group_name,
            host = %host.name,
            mismatches = ?mismatches,
            "Deployment group does not select the planned host"
        );
        findings.push(TargetingFinding {
            action: action.name.clone(),
            group: group.group_name.clone(),
            host: host.name.clone(),
            mismatches,
        });
    }

    findings
}
