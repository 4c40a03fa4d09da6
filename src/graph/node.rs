use crate::executor::ExecutorStrategy;
use crate::models::application_group::{Application, Release};
use crate::utils;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One application in the dependency graph, holding its task nodes.
#[derive(Debug, Clone)]
pub struct AppNode {
    pub name: String,
    pub dependencies: Vec<String>,
    pub tasks: BTreeMap<String, TaskNode>,
}

impl AppNode {
    pub fn new(application: &Application) -> Self {
        Self {
            name: application.name.clone(),
            dependencies: application.dependencies.clone(),
            tasks: BTreeMap::new(),
        }
    }

    pub fn task(&self, name: &str) -> Option<&TaskNode> {
        self.tasks.get(name)
    }
}

/// One chart to deploy: the application's own chart or a staged subchart.
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub name: String,
    pub chart_name: String,
    pub chart_version: String,
    /// Parent application name, non-empty only for subchart tasks.
    pub parent: Option<String>,
    /// Release configuration, deep-copied and value-overlaid per task.
    pub release: Release,
    /// Intra-application dependencies on sibling task nodes.
    pub dependencies: Vec<String>,
    /// Executor chain to run for this task.
    pub executors: BTreeMap<String, ExecutorNode>,
}

impl TaskNode {
    /// Task node for the application's own chart.
    pub fn from_application(application: &Application) -> Self {
        Self {
            name: utils::get_task_name(&application.name, &application.name),
            chart_name: application.spec.chart.name.clone(),
            chart_version: application.spec.chart.version.clone(),
            parent: None,
            release: application.spec.release.clone(),
            dependencies: Vec::new(),
            executors: BTreeMap::new(),
        }
    }

    pub fn is_subchart_task(&self) -> bool {
        self.parent.is_some()
    }
}

/// One executor invocation within a task's chain. The strategy itself is
/// stateless and shared; the node owns only the chain wiring and parameters.
#[derive(Clone)]
pub struct ExecutorNode {
    pub name: String,
    pub dependencies: Vec<String>,
    pub strategy: Arc<dyn ExecutorStrategy>,
    pub params: Option<serde_json::Value>,
}

impl fmt::Debug for ExecutorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorNode")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("strategy", &self.strategy.name())
            .field("params", &self.params)
            .finish()
    }
}
