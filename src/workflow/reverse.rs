use super::client::{decorate_workflow, suspend, WorkflowClient};
use super::{ClientOptions, ClusterClient, ClusterError, WorkflowError, WorkflowType};
use crate::graph::Graph;
use crate::models::application_group::ApplicationGroup;
use crate::models::workflow::Workflow;
use crate::models::OwnerReference;
use crate::templates;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Tears the group down in reverse dependency order. Used both for voluntary
/// deletion and for failure remediation when no prior generation succeeded.
pub struct ReverseWorkflowClient {
    cluster: Arc<dyn ClusterClient>,
    options: ClientOptions,
    group: ApplicationGroup,
    workflow: Option<Workflow>,
    forward_workflow: Option<Workflow>,
}

impl ReverseWorkflowClient {
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
            forward_workflow: None,
        }
    }
}

#[async_trait]
impl WorkflowClient for ReverseWorkflowClient {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Reverse
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
        // There is nothing to reverse without a forward workflow.
        let forward_name = WorkflowType::Forward.workflow_name(&self.group.name);
        let forward = self
            .cluster
            .get_workflow(&self.options.namespace, &forward_name)
            .await?
            .ok_or(WorkflowError::ForwardWorkflowNotFound)?;

        suspend(self.cluster.as_ref(), &self.options.namespace, &forward_name).await?;
        self.forward_workflow = Some(forward);

        let graph = Graph::reverse_of(&self.group);
        let mut workflow = templates::generate_workflow(
            &self.name(),
            &self.options.namespace,
            self.options.parallelism,
        );
        let (entry_template, tpls) =
            templates::generate_templates(&graph, &self.options.namespace, self.options.parallelism)?;
        templates::update_workflow_templates(&mut workflow, tpls);
        templates::update_workflow_templates(&mut workflow, [entry_template]);

        decorate_workflow(&mut workflow, &self.group, WorkflowType::Reverse);
        workflow
            .metadata
            .owner_references
            .push(OwnerReference::workflow(forward_name));

        info!(group = %self.group.name, "generated reverse workflow");
        self.workflow = Some(workflow);
        Ok(())
    }

    async fn submit(&mut self) -> Result<(), WorkflowError> {
        let Some(workflow) = self.workflow.clone() else {
            return Err(WorkflowError::NotGenerated);
        };
        if self.forward_workflow.is_none() {
            return Err(WorkflowError::ForwardWorkflowNotFound);
        }

        // A reverse workflow is never re-executed; submit only when absent.
        match self.cluster.create_workflow(&workflow).await {
            Ok(()) => {
                info!(
                    group = %self.group.name,
                    workflow = %workflow.metadata.name,
                    "submitted reverse workflow"
                );
                Ok(())
            }
            Err(ClusterError::AlreadyExists(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
