//! Reconciliation lifecycle event publishing.

pub mod publisher;

pub use publisher::{EventPublisher, PublishError, PublishedEvent};

/// Event names emitted by the reconciler.
pub mod names {
    pub const RECONCILE_SUCCESS: &str = "reconcile.success";
    pub const RECONCILE_ERROR: &str = "reconcile.error";
    pub const REMEDIATION_STARTED: &str = "remediation.started";
    pub const TEARDOWN_STARTED: &str = "teardown.started";
    pub const FINALIZER_RELEASED: &str = "finalizer.released";
}
