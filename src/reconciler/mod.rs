//! The top-level reconciliation state machine.
//!
//! Each invocation is one short-lived reconcile pass: it observes the current
//! state, takes at most one action (submit, suspend, remediate, release the
//! finalizer) and returns the requeue hint. Long-running work always happens
//! in the external engine, never inside the loop.
//!
//! Phase mapping for the active forward workflow:
//! Unknown/Pending/Running mark the group `Progressing`; Succeeded marks it
//! `Succeeded` and persists the spec as the rollback target; Failed/Error
//! trigger remediation, which rolls back when a previous generation succeeded
//! and tears down otherwise.

mod status;

pub use status::StatusHelper;

use crate::config::ControllerConfig;
use crate::constants::{APP_GROUP_FINALIZER, WORKFLOW_TYPE_LABEL};
use crate::events::{names, EventPublisher};
use crate::graph::{Graph, GraphError};
use crate::models::application_group::ApplicationGroup;
use crate::models::conditions;
use crate::models::workflow::Workflow;
use crate::workflow::{
    self, Builder, ClientOptions, ClusterClient, ClusterError, WorkflowError, WorkflowType,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Validation(#[from] GraphError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("workflow is missing the workflow-type label")]
    MissingWorkflowTypeLabel,
}

/// Action taken by one reconcile pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReconcileAction {
    /// Forward workflow submitted or still running.
    Progressing,
    /// The group is fully deployed; the spec was persisted as rollback target.
    Succeeded,
    /// Remediation started: redeploying the last successful spec.
    StartedRollback,
    /// Remediation started: removing applications the failed generation introduced.
    StartedNewApplicationRollback,
    /// Teardown started.
    StartedReverse,
    /// Teardown finished and the finalizer was released.
    FinalizerReleased,
    /// The group is failed; the message carries the underlying error.
    Failed(String),
    /// Nothing to do for this observation.
    NoAction,
}

/// Outcome of a reconcile pass: the action taken and when to look again.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub action: ReconcileAction,
    pub requeue_after: Option<Duration>,
}

impl ReconcileOutcome {
    fn new(action: ReconcileAction, requeue_after: Option<Duration>) -> Self {
        Self {
            action,
            requeue_after,
        }
    }
}

/// Drives an ApplicationGroup towards its declared spec.
pub struct Reconciler {
    cluster: Arc<dyn ClusterClient>,
    builder: Builder,
    status: StatusHelper,
    publisher: EventPublisher,
    config: ControllerConfig,
}

impl Reconciler {
    pub fn new(cluster: Arc<dyn ClusterClient>, config: ControllerConfig) -> Self {
        Self::with_publisher(cluster, config, EventPublisher::default())
    }

    pub fn with_publisher(
        cluster: Arc<dyn ClusterClient>,
        config: ControllerConfig,
        publisher: EventPublisher,
    ) -> Self {
        let options = ClientOptions {
            namespace: config.workflow_namespace.clone(),
            parallelism: config.workflow_parallelism,
        };
        let builder = Builder::new(cluster.clone(), options);
        let status = StatusHelper::new(cluster.clone(), publisher.clone());
        Self {
            cluster,
            builder,
            status,
            publisher,
            config,
        }
    }

    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    pub fn status_helper(&self) -> &StatusHelper {
        &self.status
    }

    /// Reconcile the declared spec: validate it, submit the forward workflow
    /// and mark the group progressing. Deletion requests branch into
    /// teardown instead.
    pub async fn reconcile_spec(
        &self,
        group: &mut ApplicationGroup,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if group.is_deleting() {
            return self.handle_deletion(group).await;
        }

        group.init_status();
        if !group.finalizers.iter().any(|f| f == APP_GROUP_FINALIZER) {
            group.finalizers.push(APP_GROUP_FINALIZER.to_string());
        }

        if let Err(err) = Graph::validate(group) {
            warn!(group = %group.name, error = %err, "rejecting invalid application group spec");
            self.status.failed(group, &err.to_string()).await?;
            // No workflow is generated for an invalid spec; the normal
            // requeue cadence retries after the user fixes it.
            return Ok(ReconcileOutcome::new(
                ReconcileAction::Failed(err.to_string()),
                None,
            ));
        }

        let mut forward = self.builder.forward(group);
        if let Err(err) = workflow::run(&mut forward).await {
            error!(group = %group.name, error = %err, "failed to run forward workflow");
            self.status.failed(group, &err.to_string()).await?;
            return Err(err.into());
        }

        group.status.observed_generation = group.generation;
        self.status.progressing(group).await?;
        info!(group = %group.name, generation = group.generation, "forward workflow running");
        Ok(ReconcileOutcome::new(
            ReconcileAction::Progressing,
            Some(self.config.progressing_requeue),
        ))
    }

    /// React to the observed status of a workflow generated for this group.
    pub async fn observe_workflow(
        &self,
        group: &mut ApplicationGroup,
        observed: &Workflow,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let workflow_type = observed
            .metadata
            .label(WORKFLOW_TYPE_LABEL)
            .and_then(WorkflowType::from_label)
            .ok_or(ReconcileError::MissingWorkflowTypeLabel)?;

        // A workflow for an older generation is stale; the spec path will
        // replace it.
        if group.status.observed_generation != group.generation {
            return Ok(ReconcileOutcome::new(ReconcileAction::NoAction, None));
        }

        if group.is_deleting() && workflow_type == WorkflowType::Reverse {
            if observed.status.phase.is_terminal() {
                return self.release_finalizer(group).await;
            }
            return Ok(ReconcileOutcome::new(
                ReconcileAction::NoAction,
                Some(self.config.progressing_requeue),
            ));
        }

        // Mirror release health into the per-chart status surface.
        let releases = self.cluster.list_releases(&group.name).await?;
        StatusHelper::mirror_chart_status(group, &releases);

        match workflow_type {
            WorkflowType::Forward => self.observe_forward(group, observed).await,
            WorkflowType::Reverse => {
                self.status.patch(group).await?;
                let requeue = (!observed.status.phase.is_terminal())
                    .then_some(self.config.progressing_requeue);
                Ok(ReconcileOutcome::new(ReconcileAction::NoAction, requeue))
            }
            WorkflowType::Rollback | WorkflowType::NewApplicationRollback => {
                self.observe_rollback(group, observed).await
            }
        }
    }

    async fn observe_forward(
        &self,
        group: &mut ApplicationGroup,
        observed: &Workflow,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let phase = observed.status.phase;
        if phase.is_succeeded() {
            self.status.succeeded(group).await?;
            info!(group = %group.name, "workflow succeeded");
            let requeue = group.interval().unwrap_or(self.config.succeeded_requeue);
            return Ok(ReconcileOutcome::new(
                ReconcileAction::Succeeded,
                Some(requeue),
            ));
        }
        if phase.is_failed() {
            warn!(group = %group.name, phase = %phase, "workflow in failure condition, remediating");
            return self.remediate(group).await;
        }

        if group.ready_reason() != conditions::PROGRESSING_REASON {
            self.status.progressing(group).await?;
        } else {
            self.status.patch(group).await?;
        }
        Ok(ReconcileOutcome::new(
            ReconcileAction::Progressing,
            Some(self.config.progressing_requeue),
        ))
    }

    async fn observe_rollback(
        &self,
        group: &mut ApplicationGroup,
        observed: &Workflow,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let phase = observed.status.phase;
        if phase.is_succeeded() {
            self.status
                .failed(group, "rolled back to the last successful spec")
                .await?;
            return Ok(ReconcileOutcome::new(ReconcileAction::NoAction, None));
        }
        if phase.is_failed() {
            self.status.failed(group, "rollback workflow failed").await?;
            return Ok(ReconcileOutcome::new(
                ReconcileAction::Failed("rollback workflow failed".to_string()),
                None,
            ));
        }
        self.status.patch(group).await?;
        Ok(ReconcileOutcome::new(
            ReconcileAction::NoAction,
            Some(self.config.progressing_requeue),
        ))
    }

    /// Choose and start the remediation for a failed forward workflow:
    /// rollback when a previous generation succeeded (removing applications
    /// the failed generation introduced first), full teardown otherwise.
    pub async fn remediate(
        &self,
        group: &mut ApplicationGroup,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let _ = self.publisher.publish(
            names::REMEDIATION_STARTED,
            json!({ "group": group.name, "generation": group.generation }),
        );

        let Some(last_spec) = group.last_successful_spec() else {
            // First-ever deployment failed: tear everything down cleanly.
            self.status.reversing(group).await?;
            let mut reverse = self.builder.reverse(group);
            return match workflow::run(&mut reverse).await {
                Ok(()) => {
                    let _ = self
                        .publisher
                        .publish(names::TEARDOWN_STARTED, json!({ "group": group.name }));
                    Ok(ReconcileOutcome::new(
                        ReconcileAction::StartedReverse,
                        Some(self.config.progressing_requeue),
                    ))
                }
                Err(WorkflowError::ForwardWorkflowNotFound) => {
                    Err(WorkflowError::ForwardWorkflowNotFound.into())
                }
                Err(err) => self.escalate_remediation_failure(group, err).await,
            };
        };

        let introduces_new_applications = group.spec.applications.iter().any(|app| {
            !last_spec
                .applications
                .iter()
                .any(|last| last.name == app.name)
        });

        self.status.rolling_back(group).await?;
        let (mut client, action) = if introduces_new_applications {
            (
                self.builder
                    .build(WorkflowType::NewApplicationRollback, group),
                ReconcileAction::StartedNewApplicationRollback,
            )
        } else {
            (
                self.builder.build(WorkflowType::Rollback, group),
                ReconcileAction::StartedRollback,
            )
        };

        match workflow::run(client.as_mut()).await {
            Ok(()) => Ok(ReconcileOutcome::new(
                action,
                Some(self.config.progressing_requeue),
            )),
            Err(err) => self.escalate_remediation_failure(group, err).await,
        }
    }

    /// Handle a deletion request: suspend the forward workflow, start the
    /// reverse workflow and hold the finalizer until it completes.
    pub async fn handle_deletion(
        &self,
        group: &mut ApplicationGroup,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let namespace = &self.builder.options().namespace;
        let forward_name = WorkflowType::Forward.workflow_name(&group.name);
        workflow::suspend(self.cluster.as_ref(), namespace, &forward_name).await?;

        self.status.terminating(group).await?;

        let mut reverse = self.builder.reverse(group);
        match workflow::run(&mut reverse).await {
            Ok(()) => Ok(ReconcileOutcome::new(
                ReconcileAction::StartedReverse,
                Some(self.config.progressing_requeue),
            )),
            // Nothing was ever deployed, so there is nothing to reverse.
            Err(WorkflowError::ForwardWorkflowNotFound) => self.release_finalizer(group).await,
            Err(err) => self.escalate_remediation_failure(group, err).await,
        }
    }

    async fn release_finalizer(
        &self,
        group: &mut ApplicationGroup,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        group.finalizers.retain(|f| f != APP_GROUP_FINALIZER);
        self.status.patch(group).await?;
        let _ = self
            .publisher
            .publish(names::FINALIZER_RELEASED, json!({ "group": group.name }));
        info!(group = %group.name, "teardown complete, finalizer released");
        Ok(ReconcileOutcome::new(ReconcileAction::FinalizerReleased, None))
    }

    /// Remediation itself failed: delete the stuck forward workflow and
    /// surface the error on the group status.
    async fn escalate_remediation_failure(
        &self,
        group: &mut ApplicationGroup,
        err: WorkflowError,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        error!(group = %group.name, error = %err, "remediation failed, deleting forward workflow");
        let namespace = &self.builder.options().namespace;
        let forward_name = WorkflowType::Forward.workflow_name(&group.name);
        workflow::workflow_delete(self.cluster.as_ref(), namespace, &forward_name).await?;
        self.status.failed(group, &err.to_string()).await?;
        Ok(ReconcileOutcome::new(
            ReconcileAction::Failed(err.to_string()),
            None,
        ))
    }

    /// Surface a chart staging failure reported by the staging collaborator.
    pub async fn mark_chart_pull_failed(
        &self,
        group: &mut ApplicationGroup,
        message: &str,
    ) -> Result<(), ReconcileError> {
        self.status.chart_pull_failed(group, message).await?;
        Ok(())
    }
}
