//! Shared constants for labels, annotations, workflow arguments and naming limits.

/// Fixed product tag attached to every generated object.
pub const PROJECT: &str = "chartgroup";

/// Label carrying the owning ApplicationGroup name.
pub const OWNERSHIP_LABEL: &str = "chartgroup/owner";
/// Label carrying the fixed product tag.
pub const HERITAGE_LABEL: &str = "chartgroup/heritage";
/// Label carrying the workflow variant (forward, reverse, rollback, newapp-rollback).
pub const WORKFLOW_TYPE_LABEL: &str = "chartgroup/workflow-type";
/// Label carrying the ApplicationGroup spec generation the workflow was built from.
pub const GENERATION_LABEL: &str = "chartgroup/generation";
/// Label carrying the chart a release belongs to.
pub const CHART_LABEL: &str = "chartgroup/chart";

/// Annotation on subchart releases recording the parent application chart.
pub const PARENT_CHART_ANNOTATION: &str = "chartgroup/parent-chart";
/// Annotation holding the last successfully applied ApplicationGroupSpec as JSON.
pub const LAST_SUCCESSFUL_ANNOTATION: &str = "chartgroup/last-successful-applicationgroup";

/// Finalizer held on the ApplicationGroup until teardown completes.
pub const APP_GROUP_FINALIZER: &str = "application-group-finalizer";

/// Name of the entrypoint DAG template in every generated workflow.
pub const ENTRYPOINT_TEMPLATE_NAME: &str = "entry";

/// Task parameter carrying the base64-encoded release manifest.
pub const RELEASE_ARG: &str = "helmrelease";
/// Task parameter carrying the per-task timeout string.
pub const TIMEOUT_ARG: &str = "timeout";
/// Task parameter carrying opaque data for the custom executor.
pub const OPAQUE_DATA_ARG: &str = "data";
/// Task parameters carrying the pipeline executor config map reference.
pub const CONFIG_MAP_NAME_ARG: &str = "configMapName";
pub const CONFIG_MAP_NAMESPACE_ARG: &str = "configMapNamespace";

/// Default per-task timeout applied when a release does not declare one.
pub const DEFAULT_TIMEOUT: &str = "5m";

/// Helm repository name the staged charts are served from.
pub const STAGING_REPO_NAME: &str = "chartmuseum";
/// Kind of the chart source reference in generated release manifests.
pub const HELM_REPOSITORY_KIND: &str = "HelmRepository";

/// Values key merged into every subchart's values.
pub const VALUES_KEY_GLOBAL: &str = "global";

/// Maximum length enforced by DNS-1123 label names.
pub const DNS1123_NAME_MAX_LEN: usize = 63;
/// Maximum length of a subchart name. The remainder of the DNS-1123
/// budget is reserved for the hashed application name prefix.
pub const SUBCHART_NAME_MAX_LEN: usize = 53;
