use crate::error::{CoreError, Result};
use std::time::Duration;

/// Controller configuration resolved from the environment with sane defaults.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace the generated workflow objects are created in.
    pub workflow_namespace: String,
    /// Service account the executor containers run under.
    pub workflow_service_account: String,
    /// Parallelism limit passed to the DAG engine, if any.
    pub workflow_parallelism: Option<u32>,
    /// Requeue delay while a workflow is progressing.
    pub progressing_requeue: Duration,
    /// Requeue delay after the group has succeeded.
    pub succeeded_requeue: Duration,
    /// Image run by the default release executor.
    pub executor_image: String,
    pub executor_image_tag: String,
    /// Image run by the pipeline executor.
    pub pipeline_executor_image: String,
    pub pipeline_executor_image_tag: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workflow_namespace: "chartgroup".to_string(),
            workflow_service_account: "chartgroup".to_string(),
            workflow_parallelism: None,
            progressing_requeue: Duration::from_secs(5),
            succeeded_requeue: Duration::from_secs(300),
            executor_image: "chartgroup/release-executor".to_string(),
            executor_image_tag: "v0.4.2".to_string(),
            pipeline_executor_image: "chartgroup/pipeline-executor".to_string(),
            pipeline_executor_image_tag: "v0.1.0".to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(ns) = std::env::var("WORKFLOW_NAMESPACE") {
            config.workflow_namespace = ns;
        }

        if let Ok(sa) = std::env::var("WORKFLOW_SERVICEACCOUNT_NAME") {
            config.workflow_service_account = sa;
        }

        if let Ok(parallelism) = std::env::var("WORKFLOW_PARALLELISM") {
            config.workflow_parallelism = Some(parallelism.parse().map_err(|e| {
                CoreError::ConfigurationError(format!("Invalid workflow_parallelism: {e}"))
            })?);
        }

        if let Ok(secs) = std::env::var("PROGRESSING_REQUEUE_SECONDS") {
            let secs: u64 = secs.parse().map_err(|e| {
                CoreError::ConfigurationError(format!("Invalid progressing_requeue: {e}"))
            })?;
            config.progressing_requeue = Duration::from_secs(secs);
        }

        if let Ok(secs) = std::env::var("SUCCEEDED_REQUEUE_SECONDS") {
            let secs: u64 = secs.parse().map_err(|e| {
                CoreError::ConfigurationError(format!("Invalid succeeded_requeue: {e}"))
            })?;
            config.succeeded_requeue = Duration::from_secs(secs);
        }

        if let Ok(image) = std::env::var("EXECUTOR_IMAGE") {
            config.executor_image = image;
        }

        if let Ok(tag) = std::env::var("EXECUTOR_IMAGE_TAG") {
            config.executor_image_tag = tag;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert_eq!(config.workflow_namespace, "chartgroup");
        assert_eq!(config.progressing_requeue, Duration::from_secs(5));
        assert_eq!(config.succeeded_requeue, Duration::from_secs(300));
        assert!(config.workflow_parallelism.is_none());
    }
}
