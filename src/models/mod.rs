//! Serde data model for the ApplicationGroup aggregate, the generated
//! workflow-engine object and the per-task release manifest.

pub mod application_group;
pub mod conditions;
pub mod meta;
pub mod release;
pub mod values;
pub mod workflow;

pub use application_group::{
    Application, ApplicationGroup, ApplicationGroupSpec, ApplicationGroupStatus, ApplicationSpec,
    ApplicationStatus, ChartRef, ChartStatus, DagEntry, ExecutorSpec, ExecutorType, InstallPolicy,
    Release, RollbackPolicy, UninstallPolicy, UpgradePolicy,
};
pub use conditions::{set_condition, get_condition, Condition, ConditionStatus};
pub use meta::{ObjectMeta, OwnerReference};
pub use release::{ChartSource, ChartTemplate, HelmRelease, HelmReleaseSpec};
pub use values::Values;
pub use workflow::{
    ContainerSpec, DagTask, DagTemplate, Inputs, NodeStatus, Parameter, Template, Workflow,
    WorkflowPhase, WorkflowSpec, WorkflowStatus,
};
