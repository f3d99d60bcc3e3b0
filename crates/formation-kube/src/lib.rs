//! Formation Kube - Kubernetes integration for Formation
//!
//! This crate provides:
//! - **Custom Resources**: `LocationDescriptor` (intent) and `State` (derived)
//! - **Controller**: Reconciles descriptors into state objects and reports
//!   conditions back onto the descriptor
//! - **Object Updater**: Create-or-update with ownership checks and
//!   optimistic concurrency
//! - **Condition Merging**: Transition times that only move on status changes
//! - **Store Seams**: Read caches and clients, backed by kube-runtime or memory
//! - **Metrics**: Prometheus counter of condition transitions, served on `/metrics`

pub mod conditions;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod owner;
pub mod resources;
pub mod runtime;
pub mod store;
pub mod updater;

pub use conditions::{
    Clock, FixedClock, MergeResult, SystemClock, calculate_condition_all, calculate_condition_any,
    fill_condition, fill_new_conditions, merge_condition, merge_resource_statuses,
};
pub use controller::{
    ControllerError, ControllerStores, FormationController, ProcessError, RELEASE_PREFIX,
};
pub use error::{KubeError, Result};
pub use metrics::{
    CapturingRecorder, NoopRecorder, PrometheusTransitionRecorder, Transition, TransitionRecorder,
    export_metrics, metrics_router,
};
pub use owner::{controller_owner_reference, is_controlled_by};
pub use resources::{
    DescriptorResource, LocationDescriptor, LocationDescriptorSpec, LocationDescriptorStatus,
    ResourceDependency, StateDependency, StateObject, StateResource, StateSpec, StateStatus,
};
pub use store::{
    KubeObjectClient, MockObjectStore, MockOperation, ObjectClient, ObjectIndex, ObjectKey,
    OperationCounts, SimulatedFailure,
};
pub use updater::{ObjectUpdater, UpdateError, UpdateOutcome};
