#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # ChartGroup Core
//!
//! Reconciling orchestration core for deploying groups of interdependent
//! Helm-chart-based applications in dependency order, tearing them down in
//! reverse order, and rolling back to the last known-good configuration on
//! failure.
//!
//! ## Architecture
//!
//! The core compiles a declarative `ApplicationGroup` into an executable
//! plan for an external DAG engine:
//!
//! - The **graph builder** derives a two-level dependency graph (application
//!   nodes containing task nodes) from the spec and the observed subchart
//!   staging status, with value-overlay propagation and subchart disabling.
//! - The **template compiler** turns a graph into nested DAG templates with
//!   a release manifest and an executor chain per task.
//! - **Executor strategies** define how a task runs (install, delete,
//!   custom container, pipeline evaluation) and know their logical inverse.
//! - The **workflow lifecycle manager** owns submission and suspension of
//!   the four workflow variants (forward, reverse, rollback,
//!   new-application rollback) and keeps them mutually exclusive.
//! - The **reconciler** maps observed execution phase onto the group's
//!   condition state and decides between success, progress, rollback and
//!   teardown.
//!
//! Cluster access is abstracted behind the [`workflow::ClusterClient`]
//! trait; the embedding controller supplies the implementation.
//!
//! ## Module Organization
//!
//! - [`models`] - Serde data model for the group, workflow and release objects
//! - [`graph`] - Dependency graph construction, reversal, diff and union
//! - [`templates`] - Graph to workflow-template compilation
//! - [`executor`] - Pluggable per-task executor strategies
//! - [`workflow`] - Workflow lifecycle clients and the cluster boundary
//! - [`reconciler`] - The reconciliation state machine
//! - [`events`] - Lifecycle event publishing
//! - [`config`] - Controller configuration
//! - [`error`] - Structured error handling

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod logging;
pub mod models;
pub mod reconciler;
pub mod templates;
pub mod test_helpers;
pub mod utils;
pub mod workflow;

pub use config::ControllerConfig;
pub use error::{CoreError, Result};
pub use events::EventPublisher;
pub use graph::{Graph, GraphError};
pub use models::{ApplicationGroup, HelmRelease, Values, Workflow, WorkflowPhase};
pub use reconciler::{ReconcileAction, ReconcileError, ReconcileOutcome, Reconciler};
pub use workflow::{Builder, ClientOptions, ClusterClient, ClusterError, WorkflowError, WorkflowType};
