use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    ValidationError(String),
    GraphError(String),
    TemplateError(String),
    WorkflowError(String),
    ClusterError(String),
    ConfigurationError(String),
    EventError(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            CoreError::GraphError(msg) => write!(f, "Graph error: {msg}"),
            CoreError::TemplateError(msg) => write!(f, "Template error: {msg}"),
            CoreError::WorkflowError(msg) => write!(f, "Workflow error: {msg}"),
            CoreError::ClusterError(msg) => write!(f, "Cluster error: {msg}"),
            CoreError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            CoreError::EventError(msg) => write!(f, "Event error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

pub type Result<T> = std::result::Result<T, CoreError>;
