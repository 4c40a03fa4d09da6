//! Workflow lifecycle management: generation, submission and suspension of
//! the four workflow variants, and the cluster boundary they operate
//! through.
//!
//! At most one workflow object of each variant exists per group. The
//! variants are mutually exclusive by construction: a client suspends its
//! competitors before generating, so two workflows never mutate the same
//! releases concurrently. A single active controller is assumed.

mod client;
mod forward;
mod new_app_rollback;
mod reverse;
mod rollback;

pub use client::{
    is_failed, is_succeeded, purge_absent_releases, run, suspend, to_condition_reason,
    workflow_delete, WorkflowClient,
};
pub use forward::ForwardWorkflowClient;
pub use new_app_rollback::NewApplicationRollbackWorkflowClient;
pub use reverse::ReverseWorkflowClient;
pub use rollback::RollbackWorkflowClient;

use crate::graph::GraphError;
use crate::models::application_group::ApplicationGroup;
use crate::models::release::HelmRelease;
use crate::models::workflow::Workflow;
use crate::templates::TemplateError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The four lifecycle variants of the compiled execution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowType {
    Forward,
    Reverse,
    Rollback,
    NewApplicationRollback,
}

impl WorkflowType {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
            Self::Rollback => "rollback",
            Self::NewApplicationRollback => "newapp-rollback",
        }
    }

    /// Deterministic workflow object name for a group.
    pub fn workflow_name(&self, group_name: &str) -> String {
        match self {
            Self::Forward => group_name.to_string(),
            Self::Reverse => format!("{group_name}-reverse"),
            Self::Rollback => format!("{group_name}-rollback"),
            Self::NewApplicationRollback => format!("{group_name}-newapp-rollback"),
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "forward" => Some(Self::Forward),
            "reverse" => Some(Self::Reverse),
            "rollback" => Some(Self::Rollback),
            "newapp-rollback" => Some(Self::NewApplicationRollback),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("cluster api error: {0}")]
    Api(String),
}

/// Boundary to the cluster the controller runs against. Implemented by the
/// embedding controller; an in-memory fake backs the test suite.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get_workflow(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Workflow>, ClusterError>;

    /// Create a workflow object. Fails with [`ClusterError::AlreadyExists`]
    /// if one of the same name already exists.
    async fn create_workflow(&self, workflow: &Workflow) -> Result<(), ClusterError>;

    /// Delete a workflow object. Deleting an absent object is not an error.
    async fn delete_workflow(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    async fn set_workflow_suspend(
        &self,
        namespace: &str,
        name: &str,
        suspend: bool,
    ) -> Result<(), ClusterError>;

    /// Idempotently create a namespace.
    async fn ensure_namespace(&self, name: &str) -> Result<(), ClusterError>;

    /// List release objects labeled as owned by the given group.
    async fn list_releases(&self, owner: &str) -> Result<Vec<HelmRelease>, ClusterError>;

    /// Delete a release object. Deleting an absent object is not an error.
    async fn delete_release(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    /// Persist the group's status, annotations and finalizers in one patch.
    async fn patch_group(&self, group: &ApplicationGroup) -> Result<(), ClusterError>;

    /// Record a cluster event attached to the group.
    async fn record_event(&self, group: &ApplicationGroup, event_type: &str, reason: &str, message: &str);
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] GraphError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("forward workflow not found")]
    ForwardWorkflowNotFound,

    #[error("failed to generate rollback workflow, previous spec is unset")]
    PreviousSpecNotSet,

    #[error("workflow object has not been generated yet")]
    NotGenerated,

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Options shared by every workflow client of a controller instance.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Namespace the workflow objects are created in.
    pub namespace: String,
    /// Parallelism limit handed to the DAG engine.
    pub parallelism: Option<u32>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            namespace: "chartgroup".to_string(),
            parallelism: None,
        }
    }
}

/// Builds workflow clients wired to one cluster and option set.
#[derive(Clone)]
pub struct Builder {
    cluster: Arc<dyn ClusterClient>,
    options: ClientOptions,
}

impl Builder {
    pub fn new(cluster: Arc<dyn ClusterClient>, options: ClientOptions) -> Self {
        Self { cluster, options }
    }

    pub fn forward(&self, group: &ApplicationGroup) -> ForwardWorkflowClient {
        ForwardWorkflowClient::new(self.cluster.clone(), self.options.clone(), group.clone())
    }

    pub fn reverse(&self, group: &ApplicationGroup) -> ReverseWorkflowClient {
        ReverseWorkflowClient::new(self.cluster.clone(), self.options.clone(), group.clone())
    }

    pub fn rollback(&self, group: &ApplicationGroup) -> RollbackWorkflowClient {
        RollbackWorkflowClient::new(self.cluster.clone(), self.options.clone(), group.clone())
    }

    pub fn new_application_rollback(
        &self,
        group: &ApplicationGroup,
    ) -> NewApplicationRollbackWorkflowClient {
        NewApplicationRollbackWorkflowClient::new(
            self.cluster.clone(),
            self.options.clone(),
            group.clone(),
        )
    }

    pub fn build(&self, workflow_type: WorkflowType, group: &ApplicationGroup) -> Box<dyn WorkflowClient> {
        match workflow_type {
            WorkflowType::Forward => Box::new(self.forward(group)),
            WorkflowType::Reverse => Box::new(self.reverse(group)),
            WorkflowType::Rollback => Box::new(self.rollback(group)),
            WorkflowType::NewApplicationRollback => {
                Box::new(self.new_application_rollback(group))
            }
        }
    }

    pub fn cluster(&self) -> Arc<dyn ClusterClient> {
        self.cluster.clone()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_names_per_type() {
        assert_eq!(WorkflowType::Forward.workflow_name("bookinfo"), "bookinfo");
        assert_eq!(
            WorkflowType::Reverse.workflow_name("bookinfo"),
            "bookinfo-reverse"
        );
        assert_eq!(
            WorkflowType::Rollback.workflow_name("bookinfo"),
            "bookinfo-rollback"
        );
        assert_eq!(
            WorkflowType::NewApplicationRollback.workflow_name("bookinfo"),
            "bookinfo-newapp-rollback"
        );
    }

    #[test]
    fn test_label_round_trip() {
        for t in [
            WorkflowType::Forward,
            WorkflowType::Reverse,
            WorkflowType::Rollback,
            WorkflowType::NewApplicationRollback,
        ] {
            assert_eq!(WorkflowType::from_label(t.as_label()), Some(t));
        }
        assert_eq!(WorkflowType::from_label("bogus"), None);
    }
}
