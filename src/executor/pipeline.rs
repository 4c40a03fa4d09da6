use super::{workflow_service_account_name, ExecutorAction, ExecutorError, ExecutorStrategy};
use crate::constants::{
    CONFIG_MAP_NAMESPACE_ARG, CONFIG_MAP_NAME_ARG, DEFAULT_TIMEOUT, RELEASE_ARG, TIMEOUT_ARG,
};
use crate::models::workflow::{ContainerSpec, DagTask, Inputs, Parameter};
use crate::models::Template;
use crate::utils;
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_IMAGE: &str = "chartgroup/pipeline-executor";
const DEFAULT_IMAGE_TAG: &str = "v0.1.0";

/// Per-task parameters the pipeline executor requires: a reference to the
/// config map holding the evaluation pipeline definition.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipelineParameters {
    config_map_ref: ConfigMapRef,
}

#[derive(Debug, Deserialize)]
struct ConfigMapRef {
    name: String,
    #[serde(default)]
    namespace: String,
}

fn pipeline_image() -> String {
    let image = std::env::var("PIPELINE_EXECUTOR_IMAGE")
        .unwrap_or_else(|_| DEFAULT_IMAGE.to_string());
    let tag = std::env::var("PIPELINE_EXECUTOR_IMAGE_TAG")
        .unwrap_or_else(|_| DEFAULT_IMAGE_TAG.to_string());
    format!("{image}:{tag}")
}

/// Pipeline-stage executor, typically chained after the default install
/// executor to run a post-deployment evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineForward;

impl ExecutorStrategy for PipelineForward {
    fn name(&self) -> &'static str {
        "pipeline-forward-executor"
    }

    fn template(&self) -> Template {
        base_template(self.name(), ExecutorAction::Install)
    }

    fn task(
        &self,
        name: &str,
        dependencies: Vec<String>,
        timeout: &str,
        manifest: &str,
        params: Option<&serde_json::Value>,
    ) -> Result<DagTask, ExecutorError> {
        base_task(self.name(), name, dependencies, timeout, manifest, params)
    }

    fn reverse(&self) -> Arc<dyn ExecutorStrategy> {
        Arc::new(PipelineReverse)
    }
}

/// Inverse of [`PipelineForward`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineReverse;

impl ExecutorStrategy for PipelineReverse {
    fn name(&self) -> &'static str {
        "pipeline-reverse-executor"
    }

    fn template(&self) -> Template {
        base_template(self.name(), ExecutorAction::Delete)
    }

    fn task(
        &self,
        name: &str,
        dependencies: Vec<String>,
        timeout: &str,
        manifest: &str,
        params: Option<&serde_json::Value>,
    ) -> Result<DagTask, ExecutorError> {
        base_task(self.name(), name, dependencies, timeout, manifest, params)
    }

    fn reverse(&self) -> Arc<dyn ExecutorStrategy> {
        Arc::new(PipelineForward)
    }
}

fn base_template(executor_name: &str, action: ExecutorAction) -> Template {
    let args = vec![
        "--spec".to_string(),
        format!("{{{{inputs.parameters.{RELEASE_ARG}}}}}"),
        "--action".to_string(),
        action.to_string(),
        "--configmap-name".to_string(),
        format!("{{{{inputs.parameters.{CONFIG_MAP_NAME_ARG}}}}}"),
        "--configmap-namespace".to_string(),
        format!("{{{{inputs.parameters.{CONFIG_MAP_NAMESPACE_ARG}}}}}"),
        "--timeout".to_string(),
        format!("{{{{inputs.parameters.{TIMEOUT_ARG}}}}}"),
        "--interval".to_string(),
        "1s".to_string(),
    ];
    Template {
        name: executor_name.to_string(),
        service_account_name: Some(workflow_service_account_name()),
        inputs: Some(Inputs {
            parameters: vec![
                Parameter::declared(RELEASE_ARG),
                Parameter::with_default(TIMEOUT_ARG, DEFAULT_TIMEOUT),
                Parameter::declared(CONFIG_MAP_NAME_ARG),
                Parameter::declared(CONFIG_MAP_NAMESPACE_ARG),
            ],
        }),
        container: Some(ContainerSpec {
            name: executor_name.to_string(),
            image: pipeline_image(),
            args,
        }),
        ..Template::default()
    }
}

fn base_task(
    executor_name: &str,
    name: &str,
    dependencies: Vec<String>,
    timeout: &str,
    manifest: &str,
    params: Option<&serde_json::Value>,
) -> Result<DagTask, ExecutorError> {
    let Some(params) = params else {
        return Err(ExecutorError::MissingParams("pipeline"));
    };
    let expected: PipelineParameters =
        serde_json::from_value(params.clone()).map_err(|source| ExecutorError::InvalidParams {
            executor: "pipeline",
            source,
        })?;

    Ok(DagTask {
        name: utils::to_dns1123(name),
        template: executor_name.to_string(),
        arguments: vec![
            Parameter::with_value(RELEASE_ARG, manifest),
            Parameter::with_value(TIMEOUT_ARG, timeout),
            Parameter::with_value(CONFIG_MAP_NAME_ARG, expected.config_map_ref.name),
            Parameter::with_value(CONFIG_MAP_NAMESPACE_ARG, expected.config_map_ref.namespace),
        ],
        dependencies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_requires_config_map_ref() {
        let err = PipelineForward
            .task("task", vec![], "5m", "manifest", None)
            .unwrap_err();
        assert!(matches!(err, ExecutorError::MissingParams("pipeline")));

        let params = json!({ "bogus": true });
        assert!(PipelineForward
            .task("task", vec![], "5m", "manifest", Some(&params))
            .is_err());
    }

    #[test]
    fn test_task_binds_config_map_arguments() {
        let params = json!({ "configMapRef": { "name": "eval", "namespace": "pipelines" } });
        let task = PipelineForward
            .task("task", vec!["install".to_string()], "5m", "manifest", Some(&params))
            .unwrap();
        let by_name = |n: &str| {
            task.arguments
                .iter()
                .find(|p| p.name == n)
                .and_then(|p| p.value.clone())
                .unwrap()
        };
        assert_eq!(by_name(CONFIG_MAP_NAME_ARG), "eval");
        assert_eq!(by_name(CONFIG_MAP_NAMESPACE_ARG), "pipelines");
        assert_eq!(task.dependencies, vec!["install".to_string()]);
    }
}
