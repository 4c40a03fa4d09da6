use super::{ClientOptions, ClusterClient, ClusterError, WorkflowError, WorkflowType};
use crate::constants::{GENERATION_LABEL, OWNERSHIP_LABEL, WORKFLOW_TYPE_LABEL};
use crate::graph::Graph;
use crate::models::application_group::ApplicationGroup;
use crate::models::conditions;
use crate::models::workflow::{Workflow, WorkflowPhase};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A workflow client generates and submits one workflow variant for a group.
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    fn workflow_type(&self) -> WorkflowType;
    fn group(&self) -> &ApplicationGroup;
    fn options(&self) -> &ClientOptions;
    fn cluster(&self) -> Arc<dyn ClusterClient>;

    /// Name of the workflow object this client manages.
    fn name(&self) -> String {
        self.workflow_type().workflow_name(&self.group().name)
    }

    /// The generated workflow, if `generate` has run.
    fn workflow(&self) -> Option<&Workflow>;

    /// Build the graph, compile it and assemble the labeled workflow object.
    async fn generate(&mut self) -> Result<(), WorkflowError>;

    /// Create the workflow object (and anything it needs) on the cluster.
    async fn submit(&mut self) -> Result<(), WorkflowError>;
}

/// Generate and submit a client's workflow unless the cluster already holds
/// one for the current spec generation.
pub async fn run(client: &mut dyn WorkflowClient) -> Result<(), WorkflowError> {
    let cluster = client.cluster();
    let namespace = client.options().namespace.clone();
    let name = client.name();

    if let Some(existing) = cluster.get_workflow(&namespace, &name).await? {
        let current_generation = client.group().generation.to_string();
        if existing.metadata.label(GENERATION_LABEL) == Some(current_generation.as_str()) {
            debug!(
                workflow = %name,
                workflow_type = %client.workflow_type(),
                "workflow already submitted for this generation"
            );
            return Ok(());
        }
        info!(
            workflow = %name,
            workflow_type = %client.workflow_type(),
            "spec generation changed, re-submitting workflow"
        );
    }

    client.generate().await?;
    client.submit().await
}

/// Suspend a workflow if it is not already finished or suspended.
pub async fn suspend(
    cluster: &dyn ClusterClient,
    namespace: &str,
    name: &str,
) -> Result<(), WorkflowError> {
    let Some(workflow) = cluster.get_workflow(namespace, name).await? else {
        return Ok(());
    };
    if workflow.is_finished() {
        return Ok(());
    }
    if !workflow.is_suspended() {
        info!(workflow = %name, "suspending running workflow");
        cluster.set_workflow_suspend(namespace, name, true).await?;
    }
    Ok(())
}

/// Delete a workflow object, tolerating its absence.
pub async fn workflow_delete(
    cluster: &dyn ClusterClient,
    namespace: &str,
    name: &str,
) -> Result<(), WorkflowError> {
    cluster.delete_workflow(namespace, name).await?;
    Ok(())
}

pub async fn is_failed(
    cluster: &dyn ClusterClient,
    namespace: &str,
    name: &str,
) -> Result<bool, WorkflowError> {
    Ok(cluster
        .get_workflow(namespace, name)
        .await?
        .map(|wf| wf.status.phase.is_failed())
        .unwrap_or(false))
}

pub async fn is_succeeded(
    cluster: &dyn ClusterClient,
    namespace: &str,
    name: &str,
) -> Result<bool, WorkflowError> {
    Ok(cluster
        .get_workflow(namespace, name)
        .await?
        .map(|wf| wf.status.phase.is_succeeded())
        .unwrap_or(false))
}

/// Map an engine phase onto the `Ready` condition reason it implies.
pub fn to_condition_reason(phase: WorkflowPhase) -> &'static str {
    match phase {
        WorkflowPhase::Succeeded => conditions::SUCCEEDED_REASON,
        WorkflowPhase::Failed | WorkflowPhase::Error => conditions::FAILED_REASON,
        WorkflowPhase::Unknown | WorkflowPhase::Pending | WorkflowPhase::Running => {
            conditions::PROGRESSING_REASON
        }
    }
}

/// Delete every release deployed for the group that has no counterpart in
/// the target spec. Used before rolling back to an older spec that had fewer
/// applications or subcharts than the currently-deployed generation.
pub async fn purge_absent_releases(
    cluster: &dyn ClusterClient,
    current: &Graph,
    target: &Graph,
) -> Result<(), WorkflowError> {
    let stale = Graph::diff(current, target);
    for node in stale.nodes.values() {
        for task in node.tasks.values() {
            let release_name = crate::utils::to_dns1123(&task.chart_name);
            info!(
                release = %release_name,
                namespace = %task.release.target_namespace,
                "purging release absent from the rollback target"
            );
            cluster
                .delete_release(&task.release.target_namespace, &release_name)
                .await?;
        }
    }
    Ok(())
}

pub(super) fn decorate_workflow(
    workflow: &mut Workflow,
    group: &ApplicationGroup,
    workflow_type: WorkflowType,
) {
    workflow
        .metadata
        .labels
        .insert(OWNERSHIP_LABEL.to_string(), group.name.clone());
    workflow
        .metadata
        .labels
        .insert(WORKFLOW_TYPE_LABEL.to_string(), workflow_type.as_label().to_string());
    workflow
        .metadata
        .labels
        .insert(GENERATION_LABEL.to_string(), group.generation.to_string());
}

/// Idempotently create every target namespace referenced by the group.
pub(super) async fn ensure_target_namespaces(
    cluster: &dyn ClusterClient,
    group: &ApplicationGroup,
) -> Result<(), WorkflowError> {
    let namespaces: BTreeSet<&str> = group
        .spec
        .applications
        .iter()
        .map(|app| app.spec.release.target_namespace.as_str())
        .filter(|ns| !ns.is_empty())
        .collect();
    for namespace in namespaces {
        cluster.ensure_namespace(namespace).await?;
    }
    Ok(())
}

/// Create the workflow, replacing any existing object of the same name. The
/// engine does not re-execute a workflow on in-place update, so recreation is
/// the only way to force re-execution.
pub(super) async fn create_or_recreate(
    cluster: &dyn ClusterClient,
    workflow: &Workflow,
) -> Result<(), WorkflowError> {
    match cluster.create_workflow(workflow).await {
        Ok(()) => Ok(()),
        Err(ClusterError::AlreadyExists(_)) => {
            warn!(
                workflow = %workflow.metadata.name,
                "workflow already exists, deleting and re-creating to force re-execution"
            );
            cluster
                .delete_workflow(&workflow.metadata.namespace, &workflow.metadata.name)
                .await?;
            cluster.create_workflow(workflow).await?;
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Suspend every competing workflow variant before a new one is generated.
pub(super) async fn suspend_competitors(
    cluster: &dyn ClusterClient,
    namespace: &str,
    group_name: &str,
    active: WorkflowType,
) -> Result<(), WorkflowError> {
    let competitors: &[WorkflowType] = match active {
        WorkflowType::Forward => &[
            WorkflowType::Reverse,
            WorkflowType::Rollback,
            WorkflowType::NewApplicationRollback,
        ],
        WorkflowType::Reverse => &[WorkflowType::Forward],
        // The forward workflow must not be running when a rollback starts.
        WorkflowType::Rollback | WorkflowType::NewApplicationRollback => &[WorkflowType::Forward],
    };
    for competitor in competitors {
        suspend(cluster, namespace, &competitor.workflow_name(group_name)).await?;
    }
    Ok(())
}
