//! Pipeline execution.

use super::{
    ActionReport, ActionSpec, ActionTarget, DeployReport, Execution, ExecutionState,
    HostDeployment, HostOutcome, PipelineDefinition, PipelineRun, StageSpec,
};
use crate::actions::{BuildEnvironment, DeployAgent, SourceProvider};
use crate::core::{ActionStatus, Artifact, ArtifactName, ArtifactStore, StageKind};
use crate::errors::{ActionFailure, StackflowError};
use crate::events::event_types::{
    ACTION_COMPLETED, ACTION_FAILED, DEPLOY_HOST_FAILED, DEPLOY_HOST_UPDATED, DEPLOY_NO_TARGETS,
    PIPELINE_FAILED, PIPELINE_STARTED, PIPELINE_SUCCEEDED, STAGE_COMPLETED, STAGE_FAILED,
    STAGE_STARTED,
};
use crate::events::{EventSink, NoOpEventSink};
use crate::observability::SpanTimer;
use crate::targeting::{select_targets, DeploymentGroup, HostRegistry};
use crate::utils::{generate_run_id, iso_timestamp};
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Runs a [`PipelineDefinition`] against its collaborators.
///
/// The runner holds no per-run state: each call to [`run`](Self::run)
/// starts a fresh execution in `Pending` with an empty artifact store.
/// Runs are not serialized, so two concurrent runs may deploy to the same
/// hosts.
pub struct PipelineRunner {
    definition: Arc<PipelineDefinition>,
    sources: Arc<dyn SourceProvider>,
    builds: Arc<dyn BuildEnvironment>,
    deployer: Arc<dyn DeployAgent>,
    registry: Arc<HostRegistry>,
    event_sink: Arc<dyn EventSink>,
}

impl fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("pipeline", &self.definition.name())
            .field("sources", &self.sources)
            .field("builds", &self.builds)
            .field("deployer", &self.deployer)
            .field("hosts", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl PipelineRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new(
        definition: Arc<PipelineDefinition>,
        sources: Arc<dyn SourceProvider>,
        builds: Arc<dyn BuildEnvironment>,
        deployer: Arc<dyn DeployAgent>,
        registry: Arc<HostRegistry>,
    ) -> Self {
        Self {
            definition,
            sources,
            builds,
            deployer,
            registry,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the sink that receives lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the definition being run.
    #[must_use]
    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    /// Executes the pipeline once.
    ///
    /// Stages run in order. Every action of a stage runs to completion
    /// before the stage is judged; a stage with any failed action moves the
    /// execution to `Failed` and no later stage starts. A stage the
    /// definition omits is passed through with no actions.
    ///
    /// Action failures are reported in the returned [`PipelineRun`], not as
    /// an `Err`. A collaborator that panics fails its action (or, during a
    /// deploy, its host) like any other failure. An `Err` means the runner
    /// itself broke with an illegal transition.
    pub async fn run(&self, trigger: impl Into<String>) -> Result<PipelineRun, StackflowError> {
        let trigger = trigger.into();
        let run_id = generate_run_id();
        let span = info_span!(
            "pipeline_run",
            pipeline = %self.definition.name(),
            run_id = %run_id,
        );
        self.run_inner(run_id, trigger).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, trigger: String) -> Result<PipelineRun, StackflowError> {
        let timer = SpanTimer::start(self.definition.name());
        let started_at = iso_timestamp();
        let pipeline = self.definition.name().to_string();
        let mut execution = Execution::new();
        let ctx = ActionContext {
            sources: Arc::clone(&self.sources),
            builds: Arc::clone(&self.builds),
            deployer: Arc::clone(&self.deployer),
            registry: Arc::clone(&self.registry),
            store: Arc::new(ArtifactStore::new()),
            events: Arc::clone(&self.event_sink),
            pipeline: pipeline.clone(),
            run_id,
        };

        info!(trigger = %trigger, "Pipeline started");
        self.event_sink.try_emit(
            PIPELINE_STARTED,
            Some(serde_json::json!({
                "pipeline": &pipeline,
                "run_id": run_id.to_string(),
                "trigger": &trigger,
            })),
        );

        let mut reports = Vec::new();
        let mut failed_stage = None;

        for kind in StageKind::ALL {
            let state = ExecutionState::for_stage(kind);
            execution.transition(state)?;
            info!(state = %state, "Pipeline state changed");

            let Some(stage) = self.definition.stage(kind) else {
                continue;
            };

            let stage_reports = run_stage(&ctx, stage).await;
            let failed: Vec<&str> = stage_reports
                .iter()
                .filter(|r| !r.is_success())
                .map(|r| r.action.as_str())
                .collect();

            if failed.is_empty() {
                self.event_sink.try_emit(
                    STAGE_COMPLETED,
                    Some(serde_json::json!({
                        "pipeline": &pipeline,
                        "stage": kind.stage_name(),
                    })),
                );
            } else {
                warn!(stage = kind.stage_name(), failed_actions = ?failed, "Stage failed");
                self.event_sink.try_emit(
                    STAGE_FAILED,
                    Some(serde_json::json!({
                        "pipeline": &pipeline,
                        "stage": kind.stage_name(),
                        "failed_actions": failed,
                    })),
                );
                failed_stage = Some(kind);
            }

            reports.extend(stage_reports);
            if failed_stage.is_some() {
                break;
            }
        }

        let duration_ms = timer.elapsed_ms();
        if let Some(stage) = failed_stage {
            execution.transition(ExecutionState::Failed)?;
            warn!(stage = stage.stage_name(), duration_ms, "Pipeline failed");
            self.event_sink.try_emit(
                PIPELINE_FAILED,
                Some(serde_json::json!({
                    "pipeline": &pipeline,
                    "run_id": run_id.to_string(),
                    "stage": stage.stage_name(),
                    "duration_ms": duration_ms,
                })),
            );
        } else {
            execution.transition(ExecutionState::Succeeded)?;
            info!(duration_ms, "Pipeline succeeded");
            self.event_sink.try_emit(
                PIPELINE_SUCCEEDED,
                Some(serde_json::json!({
                    "pipeline": &pipeline,
                    "run_id": run_id.to_string(),
                    "duration_ms": duration_ms,
                })),
            );
        }

        Ok(PipelineRun {
            run_id,
            pipeline,
            trigger,
            state: execution.state(),
            history: execution.history().to_vec(),
            actions: reports,
            artifacts: ctx.store.snapshot(),
            unconsumed: ctx.store.unconsumed(),
            started_at,
            finished_at: iso_timestamp(),
            duration_ms,
        })
    }
}

/// Everything an action task needs, cheap to clone into a spawned task.
#[derive(Clone)]
struct ActionContext {
    sources: Arc<dyn SourceProvider>,
    builds: Arc<dyn BuildEnvironment>,
    deployer: Arc<dyn DeployAgent>,
    registry: Arc<HostRegistry>,
    store: Arc<ArtifactStore>,
    events: Arc<dyn EventSink>,
    pipeline: String,
    run_id: Uuid,
}

/// Runs every action of a stage concurrently and waits for all of them.
///
/// Each action runs in its own task. A task that panics is reported as a
/// failed action; its siblings are still awaited.
async fn run_stage(ctx: &ActionContext, stage: &StageSpec) -> Vec<ActionReport> {
    ctx.events.try_emit(
        STAGE_STARTED,
        Some(serde_json::json!({
            "pipeline": &ctx.pipeline,
            "stage": stage.name(),
            "actions": stage.actions.len(),
        })),
    );

    let timer = SpanTimer::start(stage.name());
    let mut tasks: FuturesUnordered<_> = stage
        .actions
        .iter()
        .map(|action| {
            let task_ctx = ctx.clone();
            let owned = action.clone();
            let handle =
                tokio::spawn(async move { task_ctx.run_action(&owned).await }.in_current_span());
            async move { (action, handle.await) }
        })
        .collect();

    let mut reports = Vec::with_capacity(stage.actions.len());
    while let Some((action, joined)) = tasks.next().await {
        let report = match joined {
            Ok(report) => report,
            Err(e) => ctx.panicked_action(action, &e, timer.elapsed_ms()),
        };
        reports.push(report);
    }
    reports
}

impl ActionContext {
    fn panicked_action(
        &self,
        action: &ActionSpec,
        error: &JoinError,
        duration_ms: f64,
    ) -> ActionReport {
        let failure =
            ActionFailure::new(format!("action panicked: {error}")).for_action(&action.name);
        let stage = action.kind.stage();
        warn!(action = %action.name, error = %failure, "Action failed");
        self.events.try_emit(
            ACTION_FAILED,
            Some(serde_json::json!({
                "pipeline": &self.pipeline,
                "run_id": self.run_id.to_string(),
                "stage": stage.stage_name(),
                "action": &action.name,
                "failures": [&failure],
                "duration_ms": duration_ms,
            })),
        );
        ActionReport {
            action: action.name.clone(),
            kind: action.kind,
            stage,
            status: ActionStatus::Failed,
            outputs: Vec::new(),
            failures: vec![failure],
            deploy: None,
            duration_ms,
        }
    }

    async fn run_action(&self, action: &ActionSpec) -> ActionReport {
        let timer = SpanTimer::start(action.name.as_str());
        let stage = action.kind.stage();
        debug!(action = %action.name, kind = %action.kind, "Starting action");

        let mut outputs = Vec::new();
        let mut deploy = None;
        let failures = match &action.target {
            ActionTarget::Repository(repository) => {
                match self.fetch_source(action, repository).await {
                    Ok(name) => {
                        outputs.push(name);
                        Vec::new()
                    }
                    Err(failure) => vec![failure],
                }
            }
            ActionTarget::BuildProject(project) => match self.run_build(action, project).await {
                Ok(name) => {
                    outputs.push(name);
                    Vec::new()
                }
                Err(failure) => vec![failure],
            },
            ActionTarget::DeploymentGroup(group) => match self.deploy(action, group).await {
                Ok((report, failures)) => {
                    deploy = Some(report);
                    failures
                }
                Err(failure) => vec![failure],
            },
        };

        let duration_ms = timer.elapsed_ms();
        let status = if failures.is_empty() {
            ActionStatus::Succeeded
        } else {
            ActionStatus::Failed
        };

        if status.is_success() {
            self.events.try_emit(
                ACTION_COMPLETED,
                Some(serde_json::json!({
                    "pipeline": &self.pipeline,
                    "run_id": self.run_id.to_string(),
                    "stage": stage.stage_name(),
                    "action": &action.name,
                    "outputs": &outputs,
                    "duration_ms": duration_ms,
                })),
            );
        } else {
            for failure in &failures {
                warn!(action = %action.name, error = %failure, "Action failed");
            }
            self.events.try_emit(
                ACTION_FAILED,
                Some(serde_json::json!({
                    "pipeline": &self.pipeline,
                    "run_id": self.run_id.to_string(),
                    "stage": stage.stage_name(),
                    "action": &action.name,
                    "failures": &failures,
                    "duration_ms": duration_ms,
                })),
            );
        }

        ActionReport {
            action: action.name.clone(),
            kind: action.kind,
            stage,
            status,
            outputs,
            failures,
            deploy,
            duration_ms,
        }
    }

    async fn fetch_source(
        &self,
        action: &ActionSpec,
        repository: &super::SourceRepository,
    ) -> Result<ArtifactName, ActionFailure> {
        let payload = self
            .sources
            .fetch(repository)
            .await
            .map_err(|f| f.for_action(&action.name))?;
        self.store_output(action, payload)
    }

    async fn run_build(
        &self,
        action: &ActionSpec,
        project: &super::BuildProject,
    ) -> Result<ArtifactName, ActionFailure> {
        let input = self.consume_input(action)?;
        let payload = self
            .builds
            .build(project, &input)
            .await
            .map_err(|f| f.for_action(&action.name))?;
        self.store_output(action, payload)
    }

    /// Resolves the group against the live registry and deploys to every
    /// target concurrently, one task per host. Hosts that were updated stay
    /// updated when a sibling fails or panics.
    async fn deploy(
        &self,
        action: &ActionSpec,
        group: &DeploymentGroup,
    ) -> Result<(DeployReport, Vec<ActionFailure>), ActionFailure> {
        let artifact = self.consume_input(action)?;
        let targets = select_targets(&self.registry, &group.selector);

        let mut report = DeployReport {
            group: group.group_name.clone(),
            targets: targets.clone(),
            hosts: Vec::with_capacity(targets.len()),
            targeting_mismatch: targets.is_empty(),
        };

        if targets.is_empty() {
            warn!(
                action = %action.name,
                group = %group.group_name,
                selector = ?group.selector,
                "Deployment group matched no hosts; nothing was deployed"
            );
            self.events.try_emit(
                DEPLOY_NO_TARGETS,
                Some(serde_json::json!({
                    "pipeline": &self.pipeline,
                    "run_id": self.run_id.to_string(),
                    "action": &action.name,
                    "group": &group.group_name,
                    "selector": &group.selector,
                })),
            );
            return Ok((report, Vec::new()));
        }

        info!(
            action = %action.name,
            group = %group.group_name,
            targets = targets.len(),
            "Deploying to hosts"
        );

        let mut deployments: FuturesUnordered<_> = targets
            .iter()
            .map(|id| {
                let host = self.registry.get(id);
                let deployer = Arc::clone(&self.deployer);
                let group = group.clone();
                let artifact = Arc::clone(&artifact);
                let handle = tokio::spawn(
                    async move {
                        match host {
                            Some(host) => deployer.deploy(&group, &host, &artifact).await,
                            None => Err(ActionFailure::new(
                                "host left the registry before deployment",
                            )),
                        }
                    }
                    .in_current_span(),
                );
                async move {
                    let result = handle.await.unwrap_or_else(|e| {
                        Err(ActionFailure::new(format!("deployment panicked: {e}")))
                    });
                    (id.clone(), result)
                }
            })
            .collect();

        let mut failures = Vec::new();
        while let Some((host, result)) = deployments.next().await {
            match result {
                Ok(()) => {
                    debug!(action = %action.name, host = %host, "Host updated");
                    self.events.try_emit(
                        DEPLOY_HOST_UPDATED,
                        Some(serde_json::json!({
                            "run_id": self.run_id.to_string(),
                            "action": &action.name,
                            "host": &host,
                        })),
                    );
                    report.hosts.push(HostDeployment {
                        host,
                        outcome: HostOutcome::Updated,
                    });
                }
                Err(failure) => {
                    let failure = failure.for_action(&action.name).on_host(&host);
                    warn!(action = %action.name, host = %host, reason = %failure.reason, "Host deployment failed");
                    self.events.try_emit(
                        DEPLOY_HOST_FAILED,
                        Some(serde_json::json!({
                            "run_id": self.run_id.to_string(),
                            "action": &action.name,
                            "host": &host,
                            "reason": &failure.reason,
                        })),
                    );
                    report.hosts.push(HostDeployment {
                        host,
                        outcome: HostOutcome::Failed {
                            reason: failure.reason.clone(),
                        },
                    });
                    failures.push(failure);
                }
            }
        }

        report.hosts.sort_by(|a, b| a.host.cmp(&b.host));
        failures.sort_by(|a, b| a.host.cmp(&b.host));
        Ok((report, failures))
    }

    fn consume_input(&self, action: &ActionSpec) -> Result<Arc<Artifact>, ActionFailure> {
        let name = action.inputs.first().ok_or_else(|| {
            ActionFailure::new("action declares no input artifact").for_action(&action.name)
        })?;
        self.store.consume(name, &action.name).ok_or_else(|| {
            ActionFailure::new(format!("input artifact '{name}' was not produced"))
                .for_action(&action.name)
        })
    }

    fn store_output(
        &self,
        action: &ActionSpec,
        payload: crate::core::PayloadHandle,
    ) -> Result<ArtifactName, ActionFailure> {
        let name = action.outputs.first().ok_or_else(|| {
            ActionFailure::new("action declares no output artifact").for_action(&action.name)
        })?;
        let artifact = Artifact::new(name.clone(), payload, &action.name, action.kind.stage());
        self.store
            .insert(artifact)
            .map(|stored| stored.name.clone())
            .map_err(|conflict| ActionFailure::new(conflict.to_string()).for_action(&action.name))
    }
}
