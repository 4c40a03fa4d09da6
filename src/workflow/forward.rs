use super::client::{
    create_or_recreate, decorate_workflow, ensure_target_namespaces, suspend_competitors,
    WorkflowClient,
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

/// Installs the group in dependency order.
pub struct ForwardWorkflowClient {
    cluster: Arc<dyn ClusterClient>,
    options: ClientOptions,
    group: ApplicationGroup,
    workflow: Option<Workflow>,
}

impl ForwardWorkflowClient {
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
impl WorkflowClient for ForwardWorkflowClient {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Forward
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
        Graph::validate(&self.group)?;

        suspend_competitors(
            self.cluster.as_ref(),
            &self.options.namespace,
            &self.group.name,
            WorkflowType::Forward,
        )
        .await?;

        let graph = Graph::forward(&self.group);
        let mut workflow = templates::generate_workflow(
            &self.name(),
            &self.options.namespace,
            self.options.parallelism,
        );
        let (entry_template, tpls) =
            templates::generate_templates(&graph, &self.options.namespace, self.options.parallelism)?;
        templates::update_workflow_templates(&mut workflow, tpls);
        templates::update_workflow_templates(&mut workflow, [entry_template]);

        decorate_workflow(&mut workflow, &self.group, WorkflowType::Forward);
        workflow
            .metadata
            .owner_references
            .push(OwnerReference::application_group(&self.group.name));

        info!(
            group = %self.group.name,
            generation = self.group.generation,
            "generated forward workflow"
        );
        self.workflow = Some(workflow);
        Ok(())
    }

    async fn submit(&mut self) -> Result<(), WorkflowError> {
        let Some(workflow) = self.workflow.clone() else {
            return Err(WorkflowError::NotGenerated);
        };

        ensure_target_namespaces(self.cluster.as_ref(), &self.group).await?;
        create_or_recreate(self.cluster.as_ref(), &workflow).await?;
        info!(group = %self.group.name, workflow = %workflow.metadata.name, "submitted forward workflow");
        Ok(())
    }
}
