use crate::constants::LAST_SUCCESSFUL_ANNOTATION;
use crate::models::conditions::{
    self, set_condition, Condition, ConditionStatus, READY_CONDITION,
};
use crate::models::values::Values;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Reference to the Helm chart an application deploys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRef {
    /// Helm repository URL the chart is pulled from.
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPolicy {
    #[serde(default)]
    pub disable_wait: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePolicy {
    #[serde(default)]
    pub disable_wait: bool,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackPolicy {
    #[serde(default)]
    pub disable_wait: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallPolicy {
    #[serde(default)]
    pub keep_history: bool,
}

/// Release configuration applied to every task generated for an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// Interval at which the release reconciler re-checks the release, as a
    /// duration literal understood by the executor ("5m", "30s").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// Namespace the release is installed into.
    pub target_namespace: String,
    /// Time to wait for any individual operation during a Helm action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Values::is_empty")]
    pub values: Values,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<UpgradePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstall: Option<UninstallPolicy>,
}

impl Release {
    pub fn disable_wait_for_install(&self) -> bool {
        self.install.as_ref().map(|p| p.disable_wait).unwrap_or(false)
    }

    pub fn disable_wait_for_upgrade(&self) -> bool {
        self.upgrade.as_ref().map(|p| p.disable_wait).unwrap_or(false)
    }

    pub fn force_for_upgrade(&self) -> bool {
        self.upgrade.as_ref().map(|p| p.force).unwrap_or(false)
    }
}

/// Dependency-ordering entry for a subchart within an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// The closed set of executor strategies a task may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorType {
    HelmRelease,
    Custom,
    Pipeline,
}

/// One entry of an application's declared executor chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub executor_type: ExecutorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub chart: ChartRef,
    pub release: Release,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcharts: Vec<DagEntry>,
    /// Optional executor chain run for every task of this application.
    /// Empty means the default release executor.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workflow: Vec<ExecutorSpec>,
}

/// One deployable chart-based unit within a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    pub spec: ApplicationSpec,
}

impl Application {
    pub fn values(&self) -> &Values {
        &self.spec.release.values
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationGroupSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<Application>,
    /// Reconcile interval after success, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u64>,
}

/// Current status of a chart or subchart in the staging pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub version: String,
    /// True once the chart has been pushed to the staging repository at a
    /// resolvable version.
    #[serde(default)]
    pub staged: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    pub name: String,
    #[serde(flatten)]
    pub chart_status: ChartStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subcharts: BTreeMap<String, ChartStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationGroupStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<ApplicationStatus>,
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Root aggregate: an ordered set of applications deployed together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationGroup {
    pub name: String,
    /// Monotonic revision of the spec, used to label generated workflows so a
    /// stale workflow can be distinguished from the current one.
    #[serde(default)]
    pub generation: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub spec: ApplicationGroupSpec,
    #[serde(default)]
    pub status: ApplicationGroupStatus,
}

impl ApplicationGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Requeue interval after success, if declared on the spec.
    pub fn interval(&self) -> Option<Duration> {
        self.spec.interval_seconds.map(Duration::from_secs)
    }

    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Initialize per-application status entries so the staging collaborator
    /// has somewhere to record chart versions. Idempotent.
    pub fn init_status(&mut self) {
        if self.status.applications.len() == self.spec.applications.len() {
            return;
        }
        self.status.applications = self
            .spec
            .applications
            .iter()
            .map(|app| ApplicationStatus {
                name: app.name.clone(),
                chart_status: ChartStatus {
                    version: app.spec.chart.version.clone(),
                    ..ChartStatus::default()
                },
                subcharts: BTreeMap::new(),
            })
            .collect();
    }

    pub fn application_status(&self, name: &str) -> Option<&ApplicationStatus> {
        self.status.applications.iter().find(|s| s.name == name)
    }

    pub fn application_status_mut(&mut self, name: &str) -> Option<&mut ApplicationStatus> {
        self.status.applications.iter_mut().find(|s| s.name == name)
    }

    /// Persist the current spec as the rollback target. Called exactly once,
    /// immediately after observing workflow success, inside the same status
    /// patch as the condition update.
    pub fn set_last_successful(&mut self) {
        if let Ok(serialized) = serde_json::to_string(&self.spec) {
            self.annotations
                .insert(LAST_SUCCESSFUL_ANNOTATION.to_string(), serialized);
        }
    }

    /// The most recently fully-succeeded spec, if any generation ever
    /// succeeded.
    pub fn last_successful_spec(&self) -> Option<ApplicationGroupSpec> {
        self.annotations
            .get(LAST_SUCCESSFUL_ANNOTATION)
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    pub fn ready_succeeded(&mut self) {
        set_condition(
            &mut self.status.conditions,
            READY_CONDITION,
            ConditionStatus::True,
            conditions::SUCCEEDED_REASON,
            "workflow and reconciliation succeeded",
        );
    }

    pub fn ready_failed(&mut self, message: &str) {
        set_condition(
            &mut self.status.conditions,
            READY_CONDITION,
            ConditionStatus::True,
            conditions::FAILED_REASON,
            message,
        );
    }

    pub fn ready_progressing(&mut self) {
        self.status.conditions.clear();
        set_condition(
            &mut self.status.conditions,
            READY_CONDITION,
            ConditionStatus::Unknown,
            conditions::PROGRESSING_REASON,
            "workflow is reconciling",
        );
    }

    pub fn ready_chart_pull_failed(&mut self, message: &str) {
        set_condition(
            &mut self.status.conditions,
            READY_CONDITION,
            ConditionStatus::False,
            conditions::CHART_PULL_FAILED_REASON,
            message,
        );
    }

    pub fn ready_rolling_back(&mut self) {
        set_condition(
            &mut self.status.conditions,
            READY_CONDITION,
            ConditionStatus::True,
            conditions::ROLLING_BACK_REASON,
            "workflow failed, rolling back to the last successful spec",
        );
    }

    pub fn ready_reversing(&mut self) {
        set_condition(
            &mut self.status.conditions,
            READY_CONDITION,
            ConditionStatus::False,
            conditions::REVERSING_REASON,
            "workflow failed without a prior success, tearing down",
        );
    }

    pub fn ready_terminating(&mut self) {
        set_condition(
            &mut self.status.conditions,
            READY_CONDITION,
            ConditionStatus::False,
            conditions::TERMINATING_REASON,
            "application group is deleting",
        );
    }

    /// Reason of the `Ready` condition, defaulting to `Progressing` when the
    /// condition has not been set yet.
    pub fn ready_reason(&self) -> &str {
        conditions::get_condition(&self.status.conditions, READY_CONDITION)
            .map(|c| c.reason.as_str())
            .unwrap_or(conditions::PROGRESSING_REASON)
    }
}
