//! Compilation of a dependency graph into the workflow-engine object: one
//! entrypoint DAG over applications, one nested DAG template per application,
//! and one reusable template per distinct executor strategy.

use crate::constants::{
    CHART_LABEL, ENTRYPOINT_TEMPLATE_NAME, HERITAGE_LABEL, OWNERSHIP_LABEL,
    PARENT_CHART_ANNOTATION, PROJECT,
};
use crate::executor::ExecutorError;
use crate::graph::Graph;
use crate::models::release::HelmRelease;
use crate::models::workflow::{DagTask, DagTemplate, Template, Workflow, WorkflowSpec};
use crate::models::ObjectMeta;
use crate::utils;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("graph must contain at least one application node")]
    EmptyGraph,

    #[error("task {0} has no executors assigned")]
    NoExecutors(String),

    #[error("failed to serialize release manifest: {0}")]
    ManifestSerialization(#[from] serde_yaml::Error),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Scaffold an empty workflow object carrying the heritage label and the
/// entrypoint reference.
pub fn generate_workflow(name: &str, namespace: &str, parallelism: Option<u32>) -> Workflow {
    let mut metadata = ObjectMeta::new(name, namespace);
    metadata
        .labels
        .insert(HERITAGE_LABEL.to_string(), PROJECT.to_string());
    Workflow {
        metadata,
        spec: WorkflowSpec {
            entrypoint: ENTRYPOINT_TEMPLATE_NAME.to_string(),
            templates: Vec::new(),
            parallelism,
            suspend: None,
        },
        ..Workflow::default()
    }
}

pub fn update_workflow_templates(
    workflow: &mut Workflow,
    templates: impl IntoIterator<Item = Template>,
) {
    workflow.spec.templates.extend(templates);
}

/// Compile a graph into the entrypoint template plus the application, chain
/// and executor templates.
///
/// Task identifiers are DNS-1123 normalized here and must be normalized the
/// same way wherever status is looked up later, because the engine rejects
/// anything else.
pub fn generate_templates(
    graph: &Graph,
    namespace: &str,
    parallelism: Option<u32>,
) -> Result<(Template, Vec<Template>), TemplateError> {
    if graph.nodes.is_empty() {
        return Err(TemplateError::EmptyGraph);
    }

    let mut templates = Vec::new();
    let mut entry_tasks = Vec::new();

    for (name, node) in &graph.nodes {
        let mut app_dag = DagTemplate::default();
        let mut chain_templates = Vec::new();

        for task in node.tasks.values() {
            let mut release = HelmRelease::from_release(
                &task.release,
                namespace,
                &task.chart_name,
                &task.chart_version,
            );
            release
                .metadata
                .labels
                .insert(CHART_LABEL.to_string(), task.chart_name.clone());
            release
                .metadata
                .labels
                .insert(OWNERSHIP_LABEL.to_string(), graph.name.clone());
            release
                .metadata
                .labels
                .insert(HERITAGE_LABEL.to_string(), PROJECT.to_string());
            if let Some(parent) = &task.parent {
                // Lets child release status be attributed back to the parent.
                release
                    .metadata
                    .annotations
                    .insert(PARENT_CHART_ANNOTATION.to_string(), parent.clone());
                // Subchart releases keep the short subchart name so status
                // lookups key on the name declared in the group spec.
                if let Some(short) = task.name.strip_prefix(&format!("{parent}-")) {
                    release.spec.release_name = utils::to_dns1123(short);
                }
            }

            let manifest = BASE64.encode(release.to_yaml()?);
            let timeout = release.timeout_or_default();

            if task.executors.len() == 1 {
                let Some(executor) = task.executors.values().next() else {
                    return Err(TemplateError::NoExecutors(task.name.clone()));
                };
                let dag_task = executor.strategy.task(
                    &task.name,
                    utils::slice_to_dns1123(&task.dependencies),
                    &timeout,
                    &manifest,
                    executor.params.as_ref(),
                )?;
                app_dag.tasks.push(dag_task);
            } else if task.executors.is_empty() {
                return Err(TemplateError::NoExecutors(task.name.clone()));
            } else {
                // An executor chain becomes its own DAG template so the
                // chain's internal ordering stays local to the task.
                let chain_name = utils::to_dns1123(&task.name);
                let mut chain_dag = DagTemplate::default();
                for executor in task.executors.values() {
                    let chain_task = executor.strategy.task(
                        &executor.name,
                        utils::slice_to_dns1123(&executor.dependencies),
                        &timeout,
                        &manifest,
                        executor.params.as_ref(),
                    )?;
                    chain_dag.tasks.push(chain_task);
                }
                chain_templates.push(Template {
                    name: chain_name.clone(),
                    parallelism,
                    dag: Some(chain_dag),
                    ..Template::default()
                });
                app_dag.tasks.push(DagTask {
                    name: chain_name.clone(),
                    template: chain_name,
                    arguments: Vec::new(),
                    dependencies: utils::slice_to_dns1123(&task.dependencies),
                });
            }
        }

        let template_name = utils::to_dns1123(&node.name);
        entry_tasks.push(DagTask {
            name: template_name.clone(),
            template: template_name.clone(),
            arguments: Vec::new(),
            dependencies: utils::slice_to_dns1123(&node.dependencies),
        });
        templates.push(Template {
            name: utils::to_dns1123(name),
            parallelism,
            dag: Some(app_dag),
            ..Template::default()
        });
        templates.extend(chain_templates);
    }

    // One reusable template per distinct executor strategy in the graph.
    for strategy in graph.all_executors.values() {
        templates.push(strategy.template());
    }

    let entry_template = Template {
        name: ENTRYPOINT_TEMPLATE_NAME.to_string(),
        parallelism,
        dag: Some(DagTemplate { tasks: entry_tasks }),
        ..Template::default()
    };

    Ok((entry_template, templates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::sample_application;
    use crate::models::application_group::{
        ApplicationGroup, ChartStatus, DagEntry, ExecutorSpec, ExecutorType,
    };
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

    fn compiled(group: &ApplicationGroup) -> (Template, Vec<Template>) {
        let graph = Graph::forward(group);
        generate_templates(&graph, "workflows", None).unwrap()
    }

    #[test]
    fn test_entry_template_shape() {
        let (entry, _) = compiled(&ordered_group());
        assert_eq!(entry.name, ENTRYPOINT_TEMPLATE_NAME);
        let dag = entry.dag.unwrap();
        assert_eq!(dag.tasks.len(), 2);
        let second = dag.task("second").unwrap();
        assert_eq!(second.template, "second");
        assert_eq!(second.dependencies, vec!["first".to_string()]);
        assert!(dag.task("first").unwrap().dependencies.is_empty());
    }

    #[test]
    fn test_app_template_carries_manifest_arguments() {
        let (_, templates) = compiled(&ordered_group());
        let app = templates.iter().find(|t| t.name == "first").unwrap();
        let dag = app.dag.as_ref().unwrap();
        let task = dag.task("first-first").unwrap();
        assert_eq!(task.template, "helmrelease-forward-executor");

        let manifest_arg = task.arguments.iter().find(|p| p.name == "helmrelease").unwrap();
        let decoded = BASE64.decode(manifest_arg.value.as_deref().unwrap()).unwrap();
        let release: HelmRelease = serde_yaml::from_slice(&decoded).unwrap();
        assert_eq!(release.spec.chart.chart, "first");
        assert_eq!(release.metadata.labels[OWNERSHIP_LABEL], "group");
        assert_eq!(release.metadata.labels[HERITAGE_LABEL], PROJECT);

        let timeout_arg = task.arguments.iter().find(|p| p.name == "timeout").unwrap();
        assert_eq!(timeout_arg.value.as_deref(), Some("5m"));
    }

    #[test]
    fn test_executor_template_emitted_once() {
        let (_, templates) = compiled(&ordered_group());
        let executors: Vec<_> = templates
            .iter()
            .filter(|t| t.name == "helmrelease-forward-executor")
            .collect();
        assert_eq!(executors.len(), 1);
        assert!(executors[0].container.is_some());
    }

    #[test]
    fn test_subchart_manifest_gets_parent_annotation() {
        let mut group = ApplicationGroup::new("group");
        let mut app = sample_application("app");
        app.spec.subcharts = vec![DagEntry {
            name: "backend".to_string(),
            dependencies: vec![],
        }];
        group.spec.applications = vec![app];
        group.init_status();
        group.status.applications[0].subcharts.insert(
            "backend".to_string(),
            ChartStatus {
                version: "0.1.0".to_string(),
                staged: true,
                ..ChartStatus::default()
            },
        );

        let (_, templates) = compiled(&group);
        let app_template = templates.iter().find(|t| t.name == "app").unwrap();
        let dag = app_template.dag.as_ref().unwrap();
        let sub_task = dag.task("app-backend").unwrap();
        let manifest_arg = sub_task.arguments.iter().find(|p| p.name == "helmrelease").unwrap();
        let decoded = BASE64.decode(manifest_arg.value.as_deref().unwrap()).unwrap();
        let release: HelmRelease = serde_yaml::from_slice(&decoded).unwrap();
        assert_eq!(
            release.metadata.annotations[PARENT_CHART_ANNOTATION],
            "app"
        );
        // The parent task waits for the subchart task.
        let parent_task = dag.task("app-app").unwrap();
        assert_eq!(parent_task.dependencies, vec!["app-backend".to_string()]);
    }

    #[test]
    fn test_executor_chain_becomes_sub_template() {
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
                params: Some(json!({ "configMapRef": { "name": "eval", "namespace": "p" } })),
                dependencies: vec!["install".to_string()],
            },
        ];

        let (_, templates) = compiled(&group);

        // The app DAG references the chain as a single node.
        let app = templates.iter().find(|t| t.name == "first").unwrap();
        let app_task = app.dag.as_ref().unwrap().task("first-first").unwrap();
        assert_eq!(app_task.template, "first-first");
        assert!(app_task.arguments.is_empty());

        // The chain sub-template wires the executors to each other.
        let chain = templates.iter().find(|t| t.name == "first-first").unwrap();
        let chain_dag = chain.dag.as_ref().unwrap();
        assert_eq!(chain_dag.tasks.len(), 2);
        let evaluate = chain_dag.task("evaluate").unwrap();
        assert_eq!(evaluate.template, "pipeline-forward-executor");
        assert_eq!(evaluate.dependencies, vec!["install".to_string()]);

        // Both executor strategies emit their reusable template.
        assert!(templates.iter().any(|t| t.name == "pipeline-forward-executor"));
        assert!(templates.iter().any(|t| t.name == "helmrelease-forward-executor"));
    }

    #[test]
    fn test_empty_graph_is_rejected() {
        let graph = Graph::forward(&ApplicationGroup::new("empty"));
        assert!(matches!(
            generate_templates(&graph, "workflows", None),
            Err(TemplateError::EmptyGraph)
        ));
    }

    #[test]
    fn test_generate_workflow_scaffold() {
        let workflow = generate_workflow("group", "workflows", Some(4));
        assert_eq!(workflow.metadata.name, "group");
        assert_eq!(workflow.metadata.namespace, "workflows");
        assert_eq!(workflow.metadata.labels[HERITAGE_LABEL], PROJECT);
        assert_eq!(workflow.spec.entrypoint, ENTRYPOINT_TEMPLATE_NAME);
        assert_eq!(workflow.spec.parallelism, Some(4));
    }
}
