use super::client::{
    create_or_recreate, decorate_workflow, ensure_target_namespaces, purge_absent_releases,
    suspend_competitors, WorkflowClient,
};
use super::{ClientOptions, ClusterClient, WorkflowError, WorkflowType};
use crate::graph::Graph;
use crate::models::application_group::ApplicationGroup;
use crate::models::workflow::Workflow;
use crate::models::OwnerReference;
use crate::templates;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Redeploys the last successfully-applied spec after a failed upgrade.
pub struct RollbackWorkflowClient {
    cluster: Arc<dyn ClusterClient>,
    options: ClientOptions,
    group: ApplicationGroup,
    workflow: Option<Workflow>,
}

impl RollbackWorkflowClient {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        options: ClientOptions,
        group: ApplicationGroup,
    ) -> Self {
        Self {
            cluster,
            options,
            group,
            workflow: None,
        }
    }

    /// The group as it looked when it last succeeded.
    fn rollback_target(&self) -> Result<ApplicationGroup, WorkflowError> {
        let last_spec = self
            .group
            .last_successful_spec()
            .ok_or(WorkflowError::PreviousSpecNotSet)?;
        let mut target = self.group.clone();
        target.spec = last_spec;
        Ok(target)
    }
}

#[async_trait]
impl WorkflowClient for RollbackWorkflowClient {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Rollback
    }

    fn group(&self) -> &ApplicationGroup {
        &self.group
    }

    fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn cluster(&self) -> Arc<dyn ClusterClient> {
        self.cluster.clone()
    }

    fn workflow(&self) -> Option<&Workflow> {
        self.workflow.as_ref()
    }

    async fn generate(&mut self) -> Result<(), WorkflowError> {
        let target = self.rollback_target()?;

        suspend_competitors(
            self.cluster.as_ref(),
            &self.options.namespace,
            &self.group.name,
            WorkflowType::Rollback,
        )
        .await?;

        let graph = Graph::forward(&target);
        let mut workflow = templates::generate_workflow(
            &self.name(),
            &self.options.namespace,
            self.options.parallelism,
        );
        let (entry_template, tpls) =
            templates::generate_templates(&graph, &self.options.namespace, self.options.parallelism)?;
        templates::update_workflow_templates(&mut workflow, tpls);
        templates::update_workflow_templates(&mut workflow, [entry_template]);

        decorate_workflow(&mut workflow, &self.group, WorkflowType::Rollback);
        workflow.metadata.owner_references.push(OwnerReference::workflow(
            WorkflowType::Forward.workflow_name(&self.group.name),
        ));

        info!(group = %self.group.name, "generated rollback workflow");
        self.workflow = Some(workflow);
        Ok(())
    }

    async fn submit(&mut self) -> Result<(), WorkflowError> {
        let Some(workflow) = self.workflow.clone() else {
            return Err(WorkflowError::NotGenerated);
        };
        let target = self.rollback_target()?;

        // Releases introduced by the failed generation have no counterpart in
        // the rollback target and must be purged before redeploying.
        let current_graph = Graph::forward(&self.group);
        let target_graph = Graph::forward(&target);
        purge_absent_releases(self.cluster.as_ref(), &current_graph, &target_graph).await?;

        ensure_target_namespaces(self.cluster.as_ref(), &target).await?;
        create_or_recreate(self.cluster.as_ref(), &workflow).await?;
        info!(
            group = %self.group.name,
            workflow = %workflow.metadata.name,
            "submitted rollback workflow"
        );
        Ok(())
    }
}
