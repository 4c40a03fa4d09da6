use crate::constants::{CHART_LABEL, PARENT_CHART_ANNOTATION};
use crate::events::{names, EventPublisher};
use crate::models::application_group::ApplicationGroup;
use crate::models::release::HelmRelease;
use crate::utils;
use crate::workflow::{ClusterClient, ClusterError};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Applies condition changes to the group and persists them, recording
/// cluster events alongside.
pub struct StatusHelper {
    cluster: Arc<dyn ClusterClient>,
    publisher: EventPublisher,
}

impl StatusHelper {
    pub fn new(cluster: Arc<dyn ClusterClient>, publisher: EventPublisher) -> Self {
        Self { cluster, publisher }
    }

    pub async fn patch(&self, group: &ApplicationGroup) -> Result<(), ClusterError> {
        self.cluster.patch_group(group).await
    }

    pub async fn succeeded(&self, group: &mut ApplicationGroup) -> Result<(), ClusterError> {
        group.ready_succeeded();
        // The rollback target is persisted in the same patch as the
        // condition change; this is the only place it is ever written.
        group.set_last_successful();
        self.patch(group).await?;

        let _ = self.publisher.publish(
            names::RECONCILE_SUCCESS,
            json!({ "group": group.name, "generation": group.generation }),
        );
        self.cluster
            .record_event(
                group,
                "Normal",
                "ReconcileSuccess",
                &format!("Successfully reconciled ApplicationGroup {}", group.name),
            )
            .await;
        Ok(())
    }

    pub async fn failed(&self, group: &mut ApplicationGroup, message: &str) -> Result<(), ClusterError> {
        group.ready_failed(message);
        self.patch(group).await?;

        let _ = self.publisher.publish(
            names::RECONCILE_ERROR,
            json!({ "group": group.name, "error": message }),
        );
        self.cluster
            .record_event(
                group,
                "Warning",
                "ReconcileError",
                &format!(
                    "Failed to reconcile ApplicationGroup {} with Error: {}",
                    group.name, message
                ),
            )
            .await;
        Ok(())
    }

    pub async fn progressing(&self, group: &mut ApplicationGroup) -> Result<(), ClusterError> {
        group.ready_progressing();
        self.patch(group).await
    }

    pub async fn rolling_back(&self, group: &mut ApplicationGroup) -> Result<(), ClusterError> {
        group.ready_rolling_back();
        self.patch(group).await
    }

    pub async fn reversing(&self, group: &mut ApplicationGroup) -> Result<(), ClusterError> {
        group.ready_reversing();
        self.patch(group).await
    }

    pub async fn terminating(&self, group: &mut ApplicationGroup) -> Result<(), ClusterError> {
        group.ready_terminating();
        self.patch(group).await
    }

    pub async fn chart_pull_failed(
        &self,
        group: &mut ApplicationGroup,
        message: &str,
    ) -> Result<(), ClusterError> {
        group.ready_chart_pull_failed(message);
        self.patch(group).await
    }

    /// Mirror observed release conditions into the per-application and
    /// per-subchart chart status. The workflow phase alone does not reflect
    /// release health, so the release objects are consulted directly.
    pub fn mirror_chart_status(group: &mut ApplicationGroup, releases: &[HelmRelease]) {
        for release in releases {
            let conditions = release
                .status
                .as_ref()
                .map(|s| s.conditions.clone())
                .unwrap_or_default();

            if let Some(parent) = release
                .metadata
                .annotation(PARENT_CHART_ANNOTATION)
                .map(str::to_string)
            {
                let release_name = release.release_name().to_string();
                if let Some(app_status) = group.application_status_mut(&parent) {
                    let matched = app_status
                        .subcharts
                        .iter_mut()
                        .find(|(name, _)| utils::to_dns1123(name.as_str()) == release_name);
                    if let Some((_, subchart_status)) = matched {
                        subchart_status.conditions = conditions;
                        continue;
                    }
                }
                debug!(release = %release_name, parent = %parent, "no status entry for subchart release");
                continue;
            }

            let chart = release.metadata.label(CHART_LABEL).map(str::to_string);
            let matched = group.spec.applications.iter().find(|app| {
                Some(app.spec.chart.name.as_str()) == chart.as_deref()
            });
            if let Some(app_name) = matched.map(|app| app.name.clone()) {
                if let Some(app_status) = group.application_status_mut(&app_name) {
                    app_status.chart_status.conditions = conditions;
                }
            }
        }
    }
}
