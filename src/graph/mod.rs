//! Dependency graph construction for an ApplicationGroup.
//!
//! The graph is ephemeral and derived: rebuilt on every reconciliation from
//! the declarative application list and the observed subchart staging status,
//! then handed to the template compiler. Nodes are value-like and deep-copied
//! whenever a graph is reversed, diffed or combined, so mutation never
//! aliases the source graph.

mod node;

pub use node::{AppNode, ExecutorNode, TaskNode};

use crate::executor::{self, ExecutorStrategy};
use crate::models::application_group::{ApplicationGroup, ChartStatus, ExecutorSpec};
use crate::utils;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("application group must list at least one application")]
    EmptyGroup,

    #[error("duplicate application name: {0}")]
    DuplicateApplication(String),

    #[error("application {application} depends on unknown application {dependency}")]
    UnknownDependency {
        application: String,
        dependency: String,
    },

    #[error(
        "subchart {subchart} of application {application} depends on unknown subchart {dependency}"
    )]
    UnknownSubchartDependency {
        application: String,
        subchart: String,
        dependency: String,
    },
}

/// Two-level dependency graph: application nodes containing task nodes.
#[derive(Clone)]
pub struct Graph {
    pub name: String,
    /// Every distinct executor strategy used anywhere in the graph, keyed by
    /// strategy name. Used to emit each reusable template exactly once.
    pub all_executors: BTreeMap<String, Arc<dyn ExecutorStrategy>>,
    pub nodes: BTreeMap<String, AppNode>,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("executors", &self.all_executors.keys().collect::<Vec<_>>())
            .field("nodes", &self.nodes)
            .finish()
    }
}

fn is_staged(status: &ChartStatus) -> bool {
    status.staged && !status.version.is_empty()
}

impl Graph {
    /// Build the forward (install-order) graph for an application group.
    ///
    /// A task node is created for each application chart, plus one per
    /// subchart the status collaborator reports as staged. Un-staged
    /// subcharts are treated as not present in the execution plan: no task
    /// node is created for them and the parent keeps them enabled.
    pub fn forward(group: &ApplicationGroup) -> Self {
        let mut graph = Self {
            name: group.name.clone(),
            all_executors: BTreeMap::new(),
            nodes: BTreeMap::new(),
        };

        for application in &group.spec.applications {
            let mut app_node = AppNode::new(application);
            let mut app_task = TaskNode::from_application(application);
            graph.assign_executors(&mut app_task, &application.spec.workflow);
            let mut app_values = application.spec.release.values.clone();

            if let Some(app_status) = group.application_status(&application.name) {
                for subchart in &application.spec.subcharts {
                    let Some(subchart_status) = app_status.subcharts.get(&subchart.name) else {
                        continue;
                    };
                    if !is_staged(subchart_status) {
                        continue;
                    }

                    let mut release = application.spec.release.clone();
                    release.values = application
                        .spec
                        .release
                        .values
                        .subchart_values(&subchart.name);

                    let mut subchart_task = TaskNode {
                        name: utils::get_task_name(&application.name, &subchart.name),
                        chart_name: utils::get_subchart_name(&application.name, &subchart.name),
                        chart_version: subchart_status.version.clone(),
                        parent: Some(application.name.clone()),
                        release,
                        dependencies: subchart
                            .dependencies
                            .iter()
                            .map(|dep| utils::get_task_name(&application.name, dep))
                            .collect(),
                        executors: BTreeMap::new(),
                    };
                    graph.assign_executors(&mut subchart_task, &application.spec.workflow);

                    // The subchart deploys as its own task, so the parent
                    // chart must not deploy it again, and must wait for it.
                    app_values.disable_subchart(&subchart.name);
                    app_task.dependencies.push(subchart_task.name.clone());

                    app_node.tasks.insert(subchart_task.name.clone(), subchart_task);
                }
            }

            app_task.release.values = app_values;
            app_node.tasks.insert(app_task.name.clone(), app_task);
            graph.nodes.insert(app_node.name.clone(), app_node);
        }
        graph
    }

    /// Build the reverse (teardown-order) graph for an application group.
    pub fn reverse_of(group: &ApplicationGroup) -> Self {
        Self::forward(group).reverse()
    }

    /// Reverse the graph: every dependency edge is re-inserted inverted and
    /// every executor strategy is swapped for its logical inverse, so
    /// teardown proceeds from the sink outward to the source.
    ///
    /// The reversed graph is built fresh from the original's edge list, never
    /// by flipping edges in place on shared nodes.
    pub fn reverse(&self) -> Self {
        let mut reversed = self.clone();
        reversed.clear();

        for application in self.nodes.values() {
            for dep in &application.dependencies {
                if let Some(node) = reversed.nodes.get_mut(dep) {
                    node.dependencies.push(application.name.clone());
                }
            }

            for task in application.tasks.values() {
                for dep in &task.dependencies {
                    if let Some(dep_task) = reversed
                        .nodes
                        .get_mut(&application.name)
                        .and_then(|n| n.tasks.get_mut(dep))
                    {
                        dep_task.dependencies.push(task.name.clone());
                    }
                }

                for executor in task.executors.values() {
                    for dep in &executor.dependencies {
                        if let Some(dep_executor) = reversed
                            .nodes
                            .get_mut(&application.name)
                            .and_then(|n| n.tasks.get_mut(&task.name))
                            .and_then(|t| t.executors.get_mut(dep))
                        {
                            dep_executor.dependencies.push(executor.name.clone());
                        }
                    }
                }

                let mut inverted: Vec<Arc<dyn ExecutorStrategy>> = Vec::new();
                if let Some(reversed_task) = reversed
                    .nodes
                    .get_mut(&application.name)
                    .and_then(|n| n.tasks.get_mut(&task.name))
                {
                    for executor in reversed_task.executors.values_mut() {
                        executor.strategy = executor.strategy.reverse();
                        inverted.push(executor.strategy.clone());
                    }
                }
                for strategy in inverted {
                    reversed.add_executor_if_missing(strategy);
                }
            }
        }
        reversed
    }

    /// Structural set difference `a - b` at two granularities: a task is
    /// removed if the same task exists in `b` under the same application; an
    /// application is dropped entirely only when all of its tasks matched.
    pub fn diff(a: &Graph, b: &Graph) -> Graph {
        let mut diff_graph = a.clone();
        for (name, app_a) in &a.nodes {
            let Some(app_b) = b.nodes.get(name) else {
                continue;
            };
            let mut got_all_tasks = true;
            for task_name in app_a.tasks.keys() {
                if app_b.tasks.contains_key(task_name) {
                    if let Some(node) = diff_graph.nodes.get_mut(name) {
                        node.tasks.remove(task_name);
                    }
                } else {
                    got_all_tasks = false;
                }
            }
            if got_all_tasks {
                diff_graph.nodes.remove(name);
            }
        }
        diff_graph
    }

    /// Union of application nodes by name; on collision `a`'s node wins.
    /// Executor sets are merged.
    pub fn combine(a: &Graph, b: &Graph) -> Graph {
        let mut combined = a.clone();
        for (name, node) in &b.nodes {
            if !a.nodes.contains_key(name) {
                combined.nodes.insert(name.clone(), node.clone());
            }
        }
        for strategy in b.all_executors.values() {
            combined.add_executor_if_missing(strategy.clone());
        }
        combined
    }

    /// Validate the group spec before building any graph: the group must not
    /// be empty, application names must be unique, and every declared
    /// dependency (application-level and subchart-level) must reference a
    /// name that exists.
    pub fn validate(group: &ApplicationGroup) -> Result<(), GraphError> {
        if group.spec.applications.is_empty() {
            return Err(GraphError::EmptyGroup);
        }

        let mut names: BTreeSet<&str> = BTreeSet::new();
        for application in &group.spec.applications {
            if !names.insert(application.name.as_str()) {
                return Err(GraphError::DuplicateApplication(application.name.clone()));
            }
        }

        for application in &group.spec.applications {
            for dep in &application.dependencies {
                if !names.contains(dep.as_str()) {
                    return Err(GraphError::UnknownDependency {
                        application: application.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            let subchart_names: BTreeSet<&str> = application
                .spec
                .subcharts
                .iter()
                .map(|s| s.name.as_str())
                .collect();
            for subchart in &application.spec.subcharts {
                for dep in &subchart.dependencies {
                    if !subchart_names.contains(dep.as_str()) {
                        return Err(GraphError::UnknownSubchartDependency {
                            application: application.name.clone(),
                            subchart: subchart.name.clone(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.all_executors.clear();
        for node in self.nodes.values_mut() {
            node.dependencies.clear();
            for task in node.tasks.values_mut() {
                task.dependencies.clear();
                for executor in task.executors.values_mut() {
                    executor.dependencies.clear();
                }
            }
        }
    }

    fn add_executor_if_missing(&mut self, strategy: Arc<dyn ExecutorStrategy>) {
        self.all_executors
            .entry(strategy.name().to_string())
            .or_insert(strategy);
    }

    fn assign_executors(&mut self, task: &mut TaskNode, workflow: &[ExecutorSpec]) {
        if workflow.is_empty() {
            let strategy = executor::default_forward();
            task.executors.insert(
                "helmrelease".to_string(),
                ExecutorNode {
                    name: "helmrelease".to_string(),
                    dependencies: Vec::new(),
                    strategy: strategy.clone(),
                    params: None,
                },
            );
            self.add_executor_if_missing(strategy);
            return;
        }
        for item in workflow {
            let strategy = executor::forward_factory(item);
            task.executors.insert(
                item.name.clone(),
                ExecutorNode {
                    name: item.name.clone(),
                    dependencies: item.dependencies.clone(),
                    strategy: strategy.clone(),
                    params: item.params.clone(),
                },
            );
            self.add_executor_if_missing(strategy);
        }
    }

    /// Names of every application node, useful for purge bookkeeping.
    pub fn application_names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    pub fn app(&self, name: &str) -> Option<&AppNode> {
        self.nodes.get(name)
    }
}

#[cfg(test)]
pub(crate) fn sample_application(name: &str) -> crate::models::application_group::Application {
    use crate::models::application_group::{Application, ApplicationSpec, ChartRef, Release};
    Application {
        name: name.to_string(),
        dependencies: Vec::new(),
        spec: ApplicationSpec {
            chart: ChartRef {
                url: "https://charts.example.com".to_string(),
                name: name.to_string(),
                version: "0.1.0".to_string(),
            },
            release: Release {
                target_namespace: name.to_string(),
                ..Release::default()
            },
            ..ApplicationSpec::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::application_group::{
        ApplicationGroup, ChartStatus, DagEntry, ExecutorSpec, ExecutorType,
    };
    use crate::models::Values;
    use serde_json::json;

    fn ordered_group() -> ApplicationGroup {
        let mut group = ApplicationGroup::new("group");
        let first = sample_application("first");
        let mut second = sample_application("second");
        second.dependencies = vec!["first".to_string()];
        group.spec.applications = vec![first, second];
        group.init_status();
        group
    }

    fn group_with_staged_subcharts() -> ApplicationGroup {
        let mut group = ApplicationGroup::new("group");
        let mut app = sample_application("app");
        app.spec.release.values = Values::from(json!({
            "global": { "env": "prod" },
            "backend": { "replicas": 2 },
            "frontend": { "replicas": 1 },
        }));
        app.spec.subcharts = vec![
            DagEntry {
                name: "backend".to_string(),
                dependencies: vec![],
            },
            DagEntry {
                name: "frontend".to_string(),
                dependencies: vec!["backend".to_string()],
            },
        ];
        group.spec.applications = vec![app];
        group.init_status();
        for name in ["backend", "frontend"] {
            group.status.applications[0].subcharts.insert(
                name.to_string(),
                ChartStatus {
                    version: "0.1.0".to_string(),
                    staged: true,
                    ..ChartStatus::default()
                },
            );
        }
        group
    }

    #[test]
    fn test_forward_basic_ordered_set() {
        let graph = Graph::forward(&ordered_group());
        assert_eq!(graph.name, "group");
        assert_eq!(graph.nodes.len(), 2);

        let first = graph.app("first").unwrap();
        assert!(first.dependencies.is_empty());
        assert!(first.task("first-first").is_some());

        let second = graph.app("second").unwrap();
        assert_eq!(second.dependencies, vec!["first".to_string()]);

        // The default executor is registered once for the whole graph.
        assert_eq!(graph.all_executors.len(), 1);
        assert!(graph.all_executors.contains_key("helmrelease-forward-executor"));
    }

    #[test]
    fn test_forward_builds_subchart_tasks() {
        let graph = Graph::forward(&group_with_staged_subcharts());
        let app = graph.app("app").unwrap();
        assert_eq!(app.tasks.len(), 3);

        let backend = app.task("app-backend").unwrap();
        assert_eq!(backend.parent.as_deref(), Some("app"));
        assert_eq!(backend.chart_version, "0.1.0");
        assert_eq!(
            backend.chart_name,
            crate::utils::get_subchart_name("app", "backend")
        );
        assert!(backend.dependencies.is_empty());

        let frontend = app.task("app-frontend").unwrap();
        assert_eq!(frontend.dependencies, vec!["app-backend".to_string()]);

        // The parent task waits for every staged subchart.
        let parent = app.task("app-app").unwrap();
        let mut parent_deps = parent.dependencies.clone();
        parent_deps.sort();
        assert_eq!(
            parent_deps,
            vec!["app-backend".to_string(), "app-frontend".to_string()]
        );
    }

    #[test]
    fn test_forward_disables_staged_subcharts_in_parent_values() {
        let graph = Graph::forward(&group_with_staged_subcharts());
        let parent = graph.app("app").unwrap().task("app-app").unwrap();
        assert!(parent.release.values.subchart_disabled("backend"));
        assert!(parent.release.values.subchart_disabled("frontend"));
        // Global stays intact for the parent.
        assert!(parent.release.values.get("global").is_some());
    }

    #[test]
    fn test_forward_subchart_value_layering() {
        let graph = Graph::forward(&group_with_staged_subcharts());
        let backend = graph.app("app").unwrap().task("app-backend").unwrap();
        assert_eq!(
            serde_json::to_value(&backend.release.values).unwrap(),
            json!({ "replicas": 2, "global": { "env": "prod" } })
        );
    }

    #[test]
    fn test_forward_skips_unstaged_subcharts() {
        let mut group = group_with_staged_subcharts();
        group.status.applications[0]
            .subcharts
            .get_mut("frontend")
            .unwrap()
            .staged = false;

        let graph = Graph::forward(&group);
        let app = graph.app("app").unwrap();
        assert!(app.task("app-frontend").is_none());

        let parent = app.task("app-app").unwrap();
        assert_eq!(parent.dependencies, vec!["app-backend".to_string()]);
        // The value-disable step is skipped for the un-staged subchart.
        assert!(!parent.release.values.subchart_disabled("frontend"));
        assert!(parent.release.values.subchart_disabled("backend"));
    }

    #[test]
    fn test_reverse_inverts_application_edges() {
        let graph = Graph::forward(&ordered_group()).reverse();
        assert_eq!(
            graph.app("first").unwrap().dependencies,
            vec!["second".to_string()]
        );
        assert!(graph.app("second").unwrap().dependencies.is_empty());
    }

    #[test]
    fn test_reverse_inverts_task_edges_and_executors() {
        let graph = Graph::forward(&group_with_staged_subcharts()).reverse();
        let app = graph.app("app").unwrap();

        // Parent no longer depends on anything; subcharts depend on it.
        assert!(app.task("app-app").unwrap().dependencies.is_empty());
        assert_eq!(
            app.task("app-frontend").unwrap().dependencies,
            vec!["app-app".to_string()]
        );
        let mut backend_deps = app.task("app-backend").unwrap().dependencies.clone();
        backend_deps.sort();
        assert_eq!(
            backend_deps,
            vec!["app-app".to_string(), "app-frontend".to_string()]
        );

        // Every executor strategy is swapped for its inverse.
        for task in app.tasks.values() {
            for executor in task.executors.values() {
                assert_eq!(executor.strategy.name(), "helmrelease-reverse-executor");
            }
        }
        assert!(graph.all_executors.contains_key("helmrelease-reverse-executor"));
        assert!(!graph.all_executors.contains_key("helmrelease-forward-executor"));
    }

    #[test]
    fn test_reverse_twice_recovers_dependencies() {
        let original = Graph::forward(&group_with_staged_subcharts());
        let round_trip = original.reverse().reverse();
        for (name, app) in &original.nodes {
            let rt_app = round_trip.app(name).unwrap();
            let mut expected = app.dependencies.clone();
            expected.sort();
            let mut actual = rt_app.dependencies.clone();
            actual.sort();
            assert_eq!(actual, expected);
            for (task_name, task) in &app.tasks {
                let mut expected = task.dependencies.clone();
                expected.sort();
                let mut actual = rt_app.tasks[task_name].dependencies.clone();
                actual.sort();
                assert_eq!(actual, expected, "task {task_name}");
            }
        }
    }

    #[test]
    fn test_reverse_does_not_mutate_original() {
        let original = Graph::forward(&ordered_group());
        let _ = original.reverse();
        assert_eq!(
            original.app("second").unwrap().dependencies,
            vec!["first".to_string()]
        );
    }

    #[test]
    fn test_diff_with_self_is_empty() {
        let graph = Graph::forward(&group_with_staged_subcharts());
        let diff = Graph::diff(&graph, &graph);
        assert!(diff.nodes.is_empty());
    }

    #[test]
    fn test_diff_keeps_tasks_missing_from_b() {
        let current = Graph::forward(&group_with_staged_subcharts());

        let mut older = group_with_staged_subcharts();
        older.status.applications[0].subcharts.remove("frontend");
        older.spec.applications[0].spec.subcharts.pop();
        let older_graph = Graph::forward(&older);

        let diff = Graph::diff(&current, &older_graph);
        let app = diff.app("app").unwrap();
        assert_eq!(app.tasks.len(), 1);
        assert!(app.task("app-frontend").is_some());
    }

    #[test]
    fn test_diff_drops_application_absent_from_a() {
        let small = Graph::forward(&ordered_group());
        let mut larger_group = ordered_group();
        larger_group.spec.applications.push(sample_application("third"));
        larger_group.init_status();
        let large = Graph::forward(&larger_group);

        let diff = Graph::diff(&large, &small);
        assert_eq!(diff.application_names(), vec!["third".to_string()]);
    }

    #[test]
    fn test_combine_with_empty_is_identity() {
        let graph = Graph::forward(&group_with_staged_subcharts());
        let empty = Graph {
            name: String::new(),
            all_executors: BTreeMap::new(),
            nodes: BTreeMap::new(),
        };
        let combined = Graph::combine(&graph, &empty);
        assert_eq!(combined.application_names(), graph.application_names());
        for (name, app) in &graph.nodes {
            let combined_tasks: Vec<_> = combined.nodes[name].tasks.keys().collect();
            let original_tasks: Vec<_> = app.tasks.keys().collect();
            assert_eq!(combined_tasks, original_tasks);
        }
    }

    #[test]
    fn test_combine_collision_prefers_first() {
        let a = Graph::forward(&ordered_group());
        let mut other_group = ordered_group();
        other_group.spec.applications[0].spec.chart.version = "9.9.9".to_string();
        let b = Graph::forward(&other_group);

        let combined = Graph::combine(&a, &b);
        assert_eq!(
            combined.app("first").unwrap().task("first-first").unwrap().chart_version,
            "0.1.0"
        );
    }

    #[test]
    fn test_validate_rejects_empty_group() {
        let group = ApplicationGroup::new("empty");
        assert!(matches!(
            Graph::validate(&group),
            Err(GraphError::EmptyGroup)
        ));
    }

    #[test]
    fn test_validate_rejects_dangling_dependency() {
        let mut group = ordered_group();
        group.spec.applications[1].dependencies = vec!["missing".to_string()];
        assert!(matches!(
            Graph::validate(&group),
            Err(GraphError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_dangling_subchart_dependency() {
        let mut group = group_with_staged_subcharts();
        group.spec.applications[0].spec.subcharts[1].dependencies = vec!["missing".to_string()];
        assert!(matches!(
            Graph::validate(&group),
            Err(GraphError::UnknownSubchartDependency { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_application() {
        let mut group = ordered_group();
        group.spec.applications.push(sample_application("first"));
        assert!(matches!(
            Graph::validate(&group),
            Err(GraphError::DuplicateApplication(_))
        ));
    }

    #[test]
    fn test_declared_executor_chain_is_assigned() {
        let mut group = ordered_group();
        group.spec.applications[0].spec.workflow = vec![
            ExecutorSpec {
                name: "install".to_string(),
                executor_type: ExecutorType::HelmRelease,
                params: None,
                dependencies: vec![],
            },
            ExecutorSpec {
                name: "evaluate".to_string(),
                executor_type: ExecutorType::Pipeline,
                params: Some(json!({ "configMapRef": { "name": "eval" } })),
                dependencies: vec!["install".to_string()],
            },
        ];

        let graph = Graph::forward(&group);
        let task = graph.app("first").unwrap().task("first-first").unwrap();
        assert_eq!(task.executors.len(), 2);
        assert_eq!(
            task.executors["evaluate"].dependencies,
            vec!["install".to_string()]
        );
        assert!(graph.all_executors.contains_key("pipeline-forward-executor"));
        assert!(graph.all_executors.contains_key("helmrelease-forward-executor"));
    }

    #[test]
    fn test_reverse_inverts_executor_chain_edges() {
        let mut group = ordered_group();
        group.spec.applications[0].spec.workflow = vec![
            ExecutorSpec {
                name: "install".to_string(),
                executor_type: ExecutorType::HelmRelease,
                params: None,
                dependencies: vec![],
            },
            ExecutorSpec {
                name: "evaluate".to_string(),
                executor_type: ExecutorType::Pipeline,
                params: Some(json!({ "configMapRef": { "name": "eval" } })),
                dependencies: vec!["install".to_string()],
            },
        ];

        let graph = Graph::forward(&group).reverse();
        let task = graph.app("first").unwrap().task("first-first").unwrap();
        assert!(task.executors["evaluate"].dependencies.is_empty());
        assert_eq!(
            task.executors["install"].dependencies,
            vec!["evaluate".to_string()]
        );
        assert_eq!(
            task.executors["evaluate"].strategy.name(),
            "pipeline-reverse-executor"
        );
    }
}
