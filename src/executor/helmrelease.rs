use super::{workflow_service_account_name, ExecutorAction, ExecutorError, ExecutorStrategy};
use crate::constants::{DEFAULT_TIMEOUT, RELEASE_ARG, TIMEOUT_ARG};
use crate::models::workflow::{ContainerSpec, DagTask, Inputs, Parameter};
use crate::models::Template;
use crate::utils;
use std::sync::Arc;

const EXECUTOR_NAME: &str = "executor";
const DEFAULT_IMAGE: &str = "chartgroup/release-executor";
const DEFAULT_IMAGE_TAG: &str = "v0.4.2";

fn executor_image() -> String {
    let image =
        std::env::var("EXECUTOR_IMAGE").unwrap_or_else(|_| DEFAULT_IMAGE.to_string());
    let tag =
        std::env::var("EXECUTOR_IMAGE_TAG").unwrap_or_else(|_| DEFAULT_IMAGE_TAG.to_string());
    format!("{image}:{tag}")
}

/// Default executor: applies the release manifest and waits for it to become
/// ready.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelmReleaseForward;

impl ExecutorStrategy for HelmReleaseForward {
    fn name(&self) -> &'static str {
        "helmrelease-forward-executor"
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
        _params: Option<&serde_json::Value>,
    ) -> Result<DagTask, ExecutorError> {
        Ok(base_task(self.name(), name, dependencies, timeout, manifest))
    }

    fn reverse(&self) -> Arc<dyn ExecutorStrategy> {
        Arc::new(HelmReleaseReverse)
    }
}

/// Inverse of [`HelmReleaseForward`]: deletes the release.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelmReleaseReverse;

impl ExecutorStrategy for HelmReleaseReverse {
    fn name(&self) -> &'static str {
        "helmrelease-reverse-executor"
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
        _params: Option<&serde_json::Value>,
    ) -> Result<DagTask, ExecutorError> {
        Ok(base_task(self.name(), name, dependencies, timeout, manifest))
    }

    fn reverse(&self) -> Arc<dyn ExecutorStrategy> {
        Arc::new(HelmReleaseForward)
    }
}

fn base_template(executor_name: &str, action: ExecutorAction) -> Template {
    let args = vec![
        "--spec".to_string(),
        format!("{{{{inputs.parameters.{RELEASE_ARG}}}}}"),
        "--action".to_string(),
        action.to_string(),
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
            ],
        }),
        container: Some(ContainerSpec {
            name: EXECUTOR_NAME.to_string(),
            image: executor_image(),
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
) -> DagTask {
    DagTask {
        name: utils::to_dns1123(name),
        template: executor_name.to_string(),
        arguments: vec![
            Parameter::with_value(RELEASE_ARG, manifest),
            Parameter::with_value(TIMEOUT_ARG, timeout),
        ],
        dependencies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_declares_manifest_and_timeout_inputs() {
        let template = HelmReleaseForward.template();
        let inputs = template.inputs.unwrap();
        assert_eq!(inputs.parameters[0].name, RELEASE_ARG);
        assert_eq!(inputs.parameters[1].name, TIMEOUT_ARG);
        assert_eq!(inputs.parameters[1].default.as_deref(), Some(DEFAULT_TIMEOUT));
        assert!(template.container.unwrap().args.contains(&"install".to_string()));
    }

    #[test]
    fn test_reverse_template_deletes() {
        let template = HelmReleaseReverse.template();
        assert!(template.container.unwrap().args.contains(&"delete".to_string()));
    }

    #[test]
    fn test_task_binds_arguments() {
        let task = HelmReleaseForward
            .task("My_Task", vec!["dep".to_string()], "5m", "bWFuaWZlc3Q=", None)
            .unwrap();
        assert_eq!(task.name, "my-task");
        assert_eq!(task.template, "helmrelease-forward-executor");
        assert_eq!(task.dependencies, vec!["dep".to_string()]);
        assert_eq!(task.arguments[0].value.as_deref(), Some("bWFuaWZlc3Q="));
        assert_eq!(task.arguments[1].value.as_deref(), Some("5m"));
    }
}
