use super::client::{decorate_workflow, suspend_competitors, WorkflowClient};
use super::{ClientOptions, ClusterClient, ClusterError, WorkflowError, WorkflowType};
use crate::graph::Graph;
use crate::models::application_group::ApplicationGroup;
use crate::models::workflow::Workflow;
use crate::models::OwnerReference;
use crate::templates;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Rollback variant for the case where the failing generation introduced
/// applications that no prior successful generation contained: the new
/// applications are removed by reversing the difference between the failed
/// spec and the last successful one.
pub struct NewApplicationRollbackWorkflowClient {
    cluster: Arc<dyn ClusterClient>,
    options: ClientOptions,
    group: ApplicationGroup,
    workflow: Option<Workflow>,
}

impl NewApplicationRollbackWorkflowClient {
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
}

#[async_trait]
impl WorkflowClient for NewApplicationRollbackWorkflowClient {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::NewApplicationRollback
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
        let last_spec = self
            .group
            .last_successful_spec()
            .ok_or(WorkflowError::PreviousSpecNotSet)?;
        let mut last_group = self.group.clone();
        last_group.spec = last_spec;

        suspend_competitors(
            self.cluster.as_ref(),
            &self.options.namespace,
            &self.group.name,
            WorkflowType::NewApplicationRollback,
        )
        .await?;

        let current_graph = Graph::forward(&self.group);
        let last_graph = Graph::forward(&last_group);
        let diff_graph = Graph::diff(&current_graph, &last_graph);

        let mut workflow = templates::generate_workflow(
            &self.name(),
            &self.options.namespace,
            self.options.parallelism,
        );
        let (entry_template, tpls) = templates::generate_templates(
            &diff_graph.reverse(),
            &self.options.namespace,
            self.options.parallelism,
        )?;
        templates::update_workflow_templates(&mut workflow, tpls);
        templates::update_workflow_templates(&mut workflow, [entry_template]);

        decorate_workflow(&mut workflow, &self.group, WorkflowType::NewApplicationRollback);
        workflow.metadata.owner_references.push(OwnerReference::workflow(
            WorkflowType::Forward.workflow_name(&self.group.name),
        ));

        info!(group = %self.group.name, "generated new-application rollback workflow");
        self.workflow = Some(workflow);
        Ok(())
    }

    async fn submit(&mut self) -> Result<(), WorkflowError> {
        let Some(workflow) = self.workflow.clone() else {
            return Err(WorkflowError::NotGenerated);
        };

        // Submit only when absent; the removal of the new applications must
        // not restart mid-teardown.
        match self.cluster.create_workflow(&workflow).await {
            Ok(()) => {
                info!(
                    group = %self.group.name,
                    workflow = %workflow.metadata.name,
                    "submitted new-application rollback workflow"
                );
                Ok(())
            }
            Err(ClusterError::AlreadyExists(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
