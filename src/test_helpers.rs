//! In-memory [`ClusterClient`] implementation for tests and local
//! experimentation.

use crate::constants::OWNERSHIP_LABEL;
use crate::models::application_group::ApplicationGroup;
use crate::models::release::HelmRelease;
use crate::models::workflow::{Workflow, WorkflowPhase};
use crate::workflow::{ClusterClient, ClusterError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

/// In-memory stand-in for the cluster the controller runs against.
#[derive(Default)]
pub struct InMemoryCluster {
    pub workflows: Mutex<BTreeMap<(String, String), Workflow>>,
    pub namespaces: Mutex<BTreeSet<String>>,
    pub releases: Mutex<BTreeMap<(String, String), HelmRelease>>,
    pub groups: Mutex<BTreeMap<String, ApplicationGroup>>,
    pub events: Mutex<Vec<(String, String, String)>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the engine reporting a phase for a stored workflow.
    pub fn set_workflow_phase(&self, namespace: &str, name: &str, phase: WorkflowPhase) {
        let mut workflows = self.workflows.lock();
        if let Some(workflow) = workflows.get_mut(&(namespace.to_string(), name.to_string())) {
            workflow.status.phase = phase;
            if phase.is_terminal() {
                workflow.status.finished_at = Some(chrono::Utc::now());
            }
        }
    }

    pub fn workflow(&self, namespace: &str, name: &str) -> Option<Workflow> {
        self.workflows
            .lock()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn add_release(&self, release: HelmRelease) {
        self.releases.lock().insert(
            (
                release.metadata.namespace.clone(),
                release.metadata.name.clone(),
            ),
            release,
        );
    }

    pub fn has_release(&self, namespace: &str, name: &str) -> bool {
        self.releases
            .lock()
            .contains_key(&(namespace.to_string(), name.to_string()))
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn get_workflow(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Workflow>, ClusterError> {
        Ok(self.workflow(namespace, name))
    }

    async fn create_workflow(&self, workflow: &Workflow) -> Result<(), ClusterError> {
        let key = (
            workflow.metadata.namespace.clone(),
            workflow.metadata.name.clone(),
        );
        let mut workflows = self.workflows.lock();
        if workflows.contains_key(&key) {
            return Err(ClusterError::AlreadyExists(workflow.metadata.name.clone()));
        }
        workflows.insert(key, workflow.clone());
        Ok(())
    }

    async fn delete_workflow(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.workflows
            .lock()
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn set_workflow_suspend(
        &self,
        namespace: &str,
        name: &str,
        suspend: bool,
    ) -> Result<(), ClusterError> {
        let mut workflows = self.workflows.lock();
        let workflow = workflows
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| ClusterError::NotFound(name.to_string()))?;
        workflow.spec.suspend = Some(suspend);
        Ok(())
    }

    async fn ensure_namespace(&self, name: &str) -> Result<(), ClusterError> {
        self.namespaces.lock().insert(name.to_string());
        Ok(())
    }

    async fn list_releases(&self, owner: &str) -> Result<Vec<HelmRelease>, ClusterError> {
        Ok(self
            .releases
            .lock()
            .values()
            .filter(|release| release.metadata.label(OWNERSHIP_LABEL) == Some(owner))
            .cloned()
            .collect())
    }

    async fn delete_release(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.releases
            .lock()
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn patch_group(&self, group: &ApplicationGroup) -> Result<(), ClusterError> {
        self.groups.lock().insert(group.name.clone(), group.clone());
        Ok(())
    }

    async fn record_event(
        &self,
        group: &ApplicationGroup,
        event_type: &str,
        reason: &str,
        _message: &str,
    ) {
        self.events.lock().push((
            group.name.clone(),
            event_type.to_string(),
            reason.to_string(),
        ));
    }
}
