//! Executor strategies: pluggable definitions of how a task is actually run.
//!
//! Each strategy renders itself two ways: as a reusable template (the
//! runnable container unit, emitted once per workflow) and as a task
//! invocation bound to that template (emitted once per task). Every strategy
//! also knows its logical inverse, used when a graph is reversed for
//! teardown. Strategies are stateless and shared across tasks.

pub mod custom;
pub mod helmrelease;
pub mod pipeline;

pub use custom::{CustomForward, CustomReverse};
pub use helmrelease::{HelmReleaseForward, HelmReleaseReverse};
pub use pipeline::{PipelineForward, PipelineReverse};

use crate::models::application_group::{ExecutorSpec, ExecutorType};
use crate::models::workflow::DagTask;
use crate::models::Template;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The action an executor performs against a release object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorAction {
    Install,
    Delete,
}

impl fmt::Display for ExecutorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("task parameters are required for the {0} executor task")]
    MissingParams(&'static str),

    #[error("invalid parameters for the {executor} executor: {source}")]
    InvalidParams {
        executor: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Strategy capability set: render the reusable template, render a task
/// invocation, produce the logical inverse.
pub trait ExecutorStrategy: Send + Sync {
    /// Stable name; doubles as the template name in the generated workflow.
    fn name(&self) -> &'static str;

    /// The reusable runnable unit for this strategy.
    fn template(&self) -> Template;

    /// A task invocation bound to this strategy's template.
    fn task(
        &self,
        name: &str,
        dependencies: Vec<String>,
        timeout: &str,
        manifest: &str,
        params: Option<&serde_json::Value>,
    ) -> Result<DagTask, ExecutorError>;

    /// The logically-inverse strategy (install <-> delete).
    fn reverse(&self) -> Arc<dyn ExecutorStrategy>;
}

/// Resolve the forward strategy for a declared executor chain entry.
pub fn forward_factory(spec: &ExecutorSpec) -> Arc<dyn ExecutorStrategy> {
    match spec.executor_type {
        ExecutorType::HelmRelease => Arc::new(HelmReleaseForward),
        ExecutorType::Custom => Arc::new(CustomForward),
        ExecutorType::Pipeline => Arc::new(PipelineForward),
    }
}

/// The strategy applied when an application declares no executor chain.
pub fn default_forward() -> Arc<dyn ExecutorStrategy> {
    Arc::new(HelmReleaseForward)
}

pub(crate) fn workflow_service_account_name() -> String {
    std::env::var("WORKFLOW_SERVICEACCOUNT_NAME").unwrap_or_else(|_| "chartgroup".to_string())
}
