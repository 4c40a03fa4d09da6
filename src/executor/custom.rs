use super::{workflow_service_account_name, ExecutorAction, ExecutorError, ExecutorStrategy};
use crate::constants::{DEFAULT_TIMEOUT, OPAQUE_DATA_ARG, RELEASE_ARG, TIMEOUT_ARG};
use crate::models::workflow::{ContainerSpec, DagTask, Inputs, Parameter};
use crate::models::Template;
use crate::utils;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_IMAGE: &str = "chartgroup/custom-executor";
const DEFAULT_IMAGE_TAG: &str = "v0.1.0";

/// Per-task parameters the custom executor requires.
#[derive(Debug, Deserialize)]
struct CustomParameters {
    data: serde_json::Value,
}

fn custom_image() -> String {
    let image = std::env::var("CUSTOM_EXECUTOR_IMAGE")
        .unwrap_or_else(|_| DEFAULT_IMAGE.to_string());
    let tag = std::env::var("CUSTOM_EXECUTOR_IMAGE_TAG")
        .unwrap_or_else(|_| DEFAULT_IMAGE_TAG.to_string());
    format!("{image}:{tag}")
}

/// User-supplied container executor, handed the release manifest plus an
/// opaque base64-encoded data payload from the task parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomForward;

impl ExecutorStrategy for CustomForward {
    fn name(&self) -> &'static str {
        "custom-forward-executor"
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
        Arc::new(CustomReverse)
    }
}

/// Inverse of [`CustomForward`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomReverse;

impl ExecutorStrategy for CustomReverse {
    fn name(&self) -> &'static str {
        "custom-reverse-executor"
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
        Arc::new(CustomForward)
    }
}

fn base_template(executor_name: &str, action: ExecutorAction) -> Template {
    let args = vec![
        "--spec".to_string(),
        format!("{{{{inputs.parameters.{RELEASE_ARG}}}}}"),
        "--action".to_string(),
        action.to_string(),
        "--data".to_string(),
        format!("{{{{inputs.parameters.{OPAQUE_DATA_ARG}}}}}"),
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
                Parameter::declared(OPAQUE_DATA_ARG),
            ],
        }),
        container: Some(ContainerSpec {
            name: executor_name.to_string(),
            image: custom_image(),
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
        return Err(ExecutorError::MissingParams("custom"));
    };
    let expected: CustomParameters = serde_json::from_value(params.clone()).map_err(|source| {
        ExecutorError::InvalidParams {
            executor: "custom",
            source,
        }
    })?;

    // The data payload must always be base64 encoded for the custom executor.
    let data = BASE64.encode(expected.data.to_string());

    Ok(DagTask {
        name: utils::to_dns1123(name),
        template: executor_name.to_string(),
        arguments: vec![
            Parameter::with_value(RELEASE_ARG, manifest),
            Parameter::with_value(TIMEOUT_ARG, timeout),
            Parameter::with_value(OPAQUE_DATA_ARG, data),
        ],
        dependencies,
    })
}
