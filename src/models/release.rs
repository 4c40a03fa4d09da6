use crate::constants::{DEFAULT_TIMEOUT, HELM_REPOSITORY_KIND, STAGING_REPO_NAME};
use crate::models::application_group::{
    InstallPolicy, Release, RollbackPolicy, UninstallPolicy, UpgradePolicy,
};
use crate::models::meta::ObjectMeta;
use crate::models::values::Values;
use crate::utils;
use serde::{Deserialize, Serialize};

/// Reference to the repository a staged chart is served from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSource {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartTemplate {
    pub chart: String,
    pub version: String,
    pub source_ref: ChartSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseSpec {
    pub chart: ChartTemplate,
    pub release_name: String,
    pub target_namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
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

/// Conditions reported back on the release object by the external release
/// reconciler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<crate::models::conditions::Condition>,
}

/// Release manifest attached to every generated task. Consumed by the
/// external release reconciler that performs the actual install.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmRelease {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: HelmReleaseSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<HelmReleaseStatus>,
}

impl HelmRelease {
    pub const KIND: &'static str = "HelmRelease";
    pub const API_VERSION: &'static str = "helm.chartgroup.io/v2";

    /// Build the release manifest for a chart deployed by one task. The chart
    /// is always sourced from the staging repository in the workflow
    /// namespace.
    pub fn from_release(
        release: &Release,
        workflow_namespace: &str,
        chart_name: &str,
        chart_version: &str,
    ) -> Self {
        let name = utils::to_dns1123(chart_name);
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::new(name.clone(), release.target_namespace.clone()),
            spec: HelmReleaseSpec {
                chart: ChartTemplate {
                    chart: name.clone(),
                    version: chart_version.to_string(),
                    source_ref: ChartSource {
                        kind: HELM_REPOSITORY_KIND.to_string(),
                        name: STAGING_REPO_NAME.to_string(),
                        namespace: workflow_namespace.to_string(),
                    },
                },
                release_name: name,
                target_namespace: release.target_namespace.clone(),
                timeout: release.timeout.clone(),
                interval: release.interval.clone(),
                values: release.values.clone(),
                install: release.install.clone(),
                upgrade: release.upgrade.clone(),
                rollback: release.rollback.clone(),
                uninstall: release.uninstall.clone(),
            },
            status: None,
        }
    }

    pub fn release_name(&self) -> &str {
        &self.spec.release_name
    }

    /// Timeout argument for the task invoking this release.
    pub fn timeout_or_default(&self) -> String {
        self.spec
            .timeout
            .clone()
            .unwrap_or_else(|| DEFAULT_TIMEOUT.to_string())
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
