//! Reconciliation of location descriptors into state objects
//!
//! One call to [`FormationController::process`] handles one descriptor:
//!
//! 1. Skip descriptors that are gone or being deleted
//! 2. Read release data from the release config map, if there is one
//! 3. Expand every resource spec and attach its defaults
//! 4. Create or update the owned state object
//! 5. Fold the outcome and the state's reported conditions into the
//!    descriptor's status, written at most once
//!
//! Conflicts at either write are not errors: the competing writer's change
//! triggers another pass.

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use formation_core::{
    Condition, ConditionStatus, ConditionType, CoreError, DefaultsTable, DeploymentLocation,
    ReleaseData, ResourceStatus, find_condition,
};
use formation_engine::{ErrorList, ExpandError, SpecExpander, find_in_map};

use crate::conditions::{Clock, SystemClock, merge_condition, merge_resource_statuses};
use crate::error::KubeError;
use crate::metrics::{NoopRecorder, TransitionRecorder};
use crate::owner::{controller_owner_reference, is_controlled_by};
use crate::resources::{
    LocationDescriptor, StateDependency, StateObject, StateResource, StateSpec,
};
use crate::store::{MockObjectStore, ObjectClient, ObjectIndex, ObjectKey};
use crate::updater::{ObjectUpdater, UpdateError, UpdateOutcome};

/// Prefix of variables resolved against release data
pub const RELEASE_PREFIX: &str = "release:";

pub const REASON_RETRIABLE_ERROR: &str = "RetriableError";
pub const REASON_TERMINAL_ERROR: &str = "TerminalError";
pub const REASON_WAITING: &str = "WaitingOnOrchestrationConditions";
pub const REASON_INTEROP_ERROR: &str = "OrchestrationInteropError";

const WAITING_MESSAGE: &str = "Waiting for Orchestration to report Conditions (initial creation?)";
const NOT_REPORTING_MESSAGE: &str = "Orchestration not reporting state for this condition";
const ORCHESTRATION_MESSAGE_PREFIX: &str = "Orchestration: ";

/// Causes of a failed reconcile
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    /// One or more resource specs failed to expand
    #[error("{0}")]
    Expansion(ErrorList),

    #[error("missing config reference")]
    MissingConfigReference,

    #[error(transparent)]
    ReleaseData(#[from] CoreError),

    /// The state object exists but is controlled by someone else
    #[error("{0}")]
    NotOwned(String),

    #[error(transparent)]
    Store(#[from] KubeError),

    #[error("failed to set LocationDescriptor status: {0}")]
    StatusWrite(#[source] KubeError),

    #[error("request is invalid: {0}")]
    InvalidStatus(#[source] KubeError),
}

impl From<UpdateError> for ControllerError {
    fn from(e: UpdateError) -> Self {
        match e {
            UpdateError::NotOwned(message) => Self::NotOwned(message),
            UpdateError::Store(e) => Self::Store(e),
        }
    }
}

/// A failed reconcile, and whether trying again may help
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ProcessError {
    pub retriable: bool,
    pub error: ControllerError,
}

impl ProcessError {
    pub fn retriable(error: impl Into<ControllerError>) -> Self {
        Self {
            retriable: true,
            error: error.into(),
        }
    }

    pub fn terminal(error: impl Into<ControllerError>) -> Self {
        Self {
            retriable: false,
            error: error.into(),
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.retriable
    }
}

/// Read caches and clients the controller works against
pub struct ControllerStores {
    pub descriptors: Arc<dyn ObjectIndex<LocationDescriptor>>,
    pub descriptor_client: Arc<dyn ObjectClient<LocationDescriptor>>,
    pub config_maps: Arc<dyn ObjectIndex<ConfigMap>>,
    pub states: Arc<dyn ObjectIndex<StateObject>>,
    pub state_client: Arc<dyn ObjectClient<StateObject>>,
}

impl ControllerStores {
    /// Empty in-memory stores, for expanding descriptors without a cluster
    pub fn in_memory() -> Self {
        let descriptors = MockObjectStore::<LocationDescriptor>::new();
        let states = MockObjectStore::<StateObject>::new();
        Self {
            descriptors: Arc::new(descriptors.clone()),
            descriptor_client: Arc::new(descriptors),
            config_maps: Arc::new(MockObjectStore::<ConfigMap>::new()),
            states: Arc::new(states.clone()),
            state_client: Arc::new(states),
        }
    }
}

/// Reconciles location descriptors
pub struct FormationController {
    descriptors: Arc<dyn ObjectIndex<LocationDescriptor>>,
    descriptor_client: Arc<dyn ObjectClient<LocationDescriptor>>,
    config_maps: Arc<dyn ObjectIndex<ConfigMap>>,
    states: ObjectUpdater<StateObject>,
    location: DeploymentLocation,
    defaults: DefaultsTable,
    clock: Arc<dyn Clock>,
    recorder: Arc<dyn TransitionRecorder>,
}

impl FormationController {
    pub fn new(stores: ControllerStores, location: DeploymentLocation) -> Self {
        Self {
            descriptors: stores.descriptors,
            descriptor_client: stores.descriptor_client,
            config_maps: stores.config_maps,
            states: ObjectUpdater::new(stores.states, stores.state_client),
            location,
            defaults: DefaultsTable::builtin(),
            clock: Arc::new(SystemClock),
            recorder: Arc::new(NoopRecorder),
        }
    }

    pub fn with_defaults(mut self, defaults: DefaultsTable) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn TransitionRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn location(&self) -> &DeploymentLocation {
        &self.location
    }

    /// Reconcile the descriptor stored under `key`
    #[instrument(skip_all, fields(ns = %key.namespace, name = %key.name))]
    pub async fn process(&self, key: &ObjectKey) -> Result<(), ProcessError> {
        let Some(cached) = self.descriptors.get(&key.namespace, &key.name) else {
            debug!("descriptor no longer exists");
            return Ok(());
        };
        if cached.metadata.deletion_timestamp.is_some() {
            debug!("descriptor is being deleted");
            return Ok(());
        }

        let mut ld = LocationDescriptor::clone(&cached);
        let (state, failure) = match self.ensure_state(&ld).await {
            Ok(Some(state)) => (Some(state), None),
            Ok(None) => {
                debug!("conflict while applying state object");
                return Ok(());
            }
            Err(e) => (None, Some(e)),
        };

        self.reconcile_status(&mut ld, state.as_ref(), failure).await
    }

    /// Apply the desired state object; `Ok(None)` means a conflict
    async fn ensure_state(&self, ld: &LocationDescriptor) -> Result<Option<StateObject>, ProcessError> {
        info!("ensuring state object is present");

        let release = self.release_data(ld).map_err(ProcessError::terminal)?;
        let spec = self
            .desired_spec(ld, release.as_ref())
            .map_err(ProcessError::terminal)?;

        let mut desired = StateObject::new(&ld.name_any(), spec);
        desired.metadata.namespace = ld.namespace();
        desired.metadata.owner_references = Some(vec![controller_owner_reference(ld)]);

        let owner_check = |existing: &StateObject| {
            if is_controlled_by(&existing.metadata, &ld.metadata) {
                Ok(())
            } else {
                Err(format!(
                    "state {:?} not owned by ld {:?}",
                    existing.name_any(),
                    ld.name_any()
                ))
            }
        };

        match self.states.create_or_update(owner_check, desired).await {
            UpdateOutcome::Applied(state) => Ok(Some(state)),
            UpdateOutcome::Conflict => Ok(None),
            UpdateOutcome::Failed { retriable, error } => Err(ProcessError {
                retriable,
                error: error.into(),
            }),
        }
    }

    /// Release data from the descriptor's release config map
    fn release_data(&self, ld: &LocationDescriptor) -> Result<Option<ReleaseData>, ControllerError> {
        let namespace = ld.namespace().unwrap_or_default();
        let Some(config_map) = self
            .config_maps
            .get(&namespace, &ld.spec.config_map_names.release)
        else {
            return Ok(None);
        };
        Ok(ReleaseData::from_config_map_data(config_map.data.as_ref())?)
    }

    /// Spec of the state object for `ld`
    ///
    /// Every resource is expanded even after a failure so that all errors are
    /// reported together.
    pub fn desired_spec(
        &self,
        ld: &LocationDescriptor,
        release: Option<&ReleaseData>,
    ) -> Result<StateSpec, ControllerError> {
        let resolver = |path: &str| -> Result<JsonValue, ExpandError> {
            match release {
                Some(data) => find_in_map(data.as_map(), path).cloned(),
                None => Err(ExpandError::unresolvable(format!(
                    "no release data was available, but variable {path} was templated"
                ))),
            }
        };
        let expander = SpecExpander::new(&resolver, RELEASE_PREFIX);

        let mut errors = ErrorList::new();
        let mut resources = Vec::with_capacity(ld.spec.resources.len());
        for resource in &ld.spec.resources {
            let spec = match &resource.spec {
                Some(raw) => match expander.expand(raw) {
                    Ok(expanded) => Some(expanded),
                    Err(errs) => {
                        errors.extend(errs);
                        None
                    }
                },
                None => None,
            };

            resources.push(StateResource {
                name: resource.name.clone(),
                type_: resource.type_.clone(),
                spec,
                depends_on: resource.depends_on.iter().map(StateDependency::from).collect(),
                defaults: Some(self.defaults.lookup(&resource.type_, &self.location)),
            });
        }

        if errors.has_errors() {
            return Err(ControllerError::Expansion(errors));
        }
        if ld.spec.config_map_name.is_empty() {
            return Err(ControllerError::MissingConfigReference);
        }

        Ok(StateSpec {
            config_map_name: ld.spec.config_map_name.clone(),
            resources,
        })
    }

    /// Merge the outcome into the descriptor status and write it if changed
    async fn reconcile_status(
        &self,
        ld: &mut LocationDescriptor,
        state: Option<&StateObject>,
        failure: Option<ProcessError>,
    ) -> Result<(), ProcessError> {
        let (conditions, resource_statuses) = status_update(state, failure.as_ref());

        if !self.merge_status(ld, conditions, resource_statuses) {
            return failure.map_or(Ok(()), Err);
        }

        info!("writing status");
        let status_failure = match self.descriptor_client.update_status(ld).await {
            Ok(_) => return failure.map_or(Ok(()), Err),
            Err(e) if e.is_conflict() => {
                debug!(error = %e, "conflict while writing status");
                return Ok(());
            }
            Err(e) if e.is_invalid() => ProcessError::terminal(ControllerError::InvalidStatus(e)),
            Err(e) => ProcessError::retriable(ControllerError::StatusWrite(e)),
        };

        match failure {
            Some(mut failure) => {
                warn!(error = %status_failure, "failed to set LocationDescriptor status");
                failure.retriable |= status_failure.retriable;
                Err(failure)
            }
            None => Err(status_failure),
        }
    }

    /// Merge new conditions into `ld`'s status, reporting whether it changed
    fn merge_status(
        &self,
        ld: &mut LocationDescriptor,
        conditions: [Condition; 3],
        resource_statuses: Option<Vec<ResourceStatus>>,
    ) -> bool {
        let namespace = ld.namespace().unwrap_or_default();
        let name = ld.name_any();
        let now = self.clock.now();
        let status = ld.status.get_or_insert_with(Default::default);

        let mut changed = false;
        for condition in conditions {
            let type_ = condition.type_.clone();
            let reason = condition.reason.clone();
            let result = merge_condition(&mut status.conditions, condition, now);
            changed |= result.changed;
            if result.transitioned_to_true {
                self.recorder.record(&namespace, &name, type_.as_str(), &reason);
            }
        }

        if let Some(resource_statuses) = resource_statuses {
            changed |= merge_resource_statuses(&mut status.resource_statuses, resource_statuses, now);
        }
        changed
    }
}

/// Conditions and resource statuses the descriptor should carry
///
/// Resource statuses are only returned when they are taken from the state.
fn status_update(
    state: Option<&StateObject>,
    failure: Option<&ProcessError>,
) -> ([Condition; 3], Option<Vec<ResourceStatus>>) {
    let mut in_progress = Condition::new(ConditionType::InProgress, ConditionStatus::False);
    let mut ready = Condition::new(ConditionType::Ready, ConditionStatus::False);
    let mut error = Condition::new(ConditionType::Error, ConditionStatus::False);

    let reported = state
        .and_then(|s| s.status.as_ref())
        .filter(|s| !s.conditions.is_empty());

    let resource_statuses = match (failure, reported) {
        (Some(failure), _) => {
            error.status = ConditionStatus::True;
            error.message = failure.to_string();
            if failure.is_retriable() {
                error.reason = REASON_RETRIABLE_ERROR.to_string();
                in_progress.status = ConditionStatus::True;
            } else {
                error.reason = REASON_TERMINAL_ERROR.to_string();
            }
            None
        }
        (None, None) => {
            in_progress.status = ConditionStatus::True;
            in_progress.reason = REASON_WAITING.to_string();
            in_progress.message = WAITING_MESSAGE.to_string();
            None
        }
        (None, Some(reported)) => {
            copy_condition(&reported.conditions, &mut in_progress);
            copy_condition(&reported.conditions, &mut ready);
            copy_condition(&reported.conditions, &mut error);
            Some(
                reported
                    .resource_statuses
                    .iter()
                    .map(|rs| ResourceStatus {
                        name: rs.name.clone(),
                        conditions: rs.conditions.clone(),
                    })
                    .collect(),
            )
        }
    };

    ([in_progress, ready, error], resource_statuses)
}

/// Take `condition`'s status from the matching condition reported by the state
fn copy_condition(reported: &[Condition], condition: &mut Condition) {
    let Some((_, source)) = find_condition(reported, &condition.type_) else {
        condition.status = ConditionStatus::Unknown;
        condition.reason = REASON_INTEROP_ERROR.to_string();
        condition.message = NOT_REPORTING_MESSAGE.to_string();
        return;
    };

    if !source.reason.is_empty() {
        condition.reason = source.reason.clone();
    }
    if !source.message.is_empty() {
        condition.message = format!("{ORCHESTRATION_MESSAGE_PREFIX}{}", source.message);
    }
    match &source.status {
        ConditionStatus::Other(unexpected) => {
            condition.status = ConditionStatus::Unknown;
            condition.reason = REASON_INTEROP_ERROR.to_string();
            condition.message = format!("Unexpected ConditionStatus {unexpected:?}");
        }
        known => condition.status = known.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::StateStatus;

    fn state_with(conditions: Vec<Condition>) -> StateObject {
        let mut state = StateObject::new("svc", StateSpec::default());
        state.status = Some(StateStatus {
            conditions,
            resource_statuses: vec![ResourceStatus {
                name: "table".to_string(),
                conditions: vec![Condition::new(ConditionType::Ready, ConditionStatus::True)],
            }],
        });
        state
    }

    #[test]
    fn test_copy_condition_missing() {
        let mut cond = Condition::new(ConditionType::Ready, ConditionStatus::False);
        copy_condition(&[], &mut cond);

        assert_eq!(cond.status, ConditionStatus::Unknown);
        assert_eq!(cond.reason, REASON_INTEROP_ERROR);
        assert_eq!(cond.message, NOT_REPORTING_MESSAGE);
    }

    #[test]
    fn test_copy_condition_prefixes_message() {
        let reported = vec![
            Condition::new(ConditionType::Ready, ConditionStatus::True)
                .with_reason("Deployed")
                .with_message("all good"),
        ];
        let mut cond = Condition::new(ConditionType::Ready, ConditionStatus::False);
        copy_condition(&reported, &mut cond);

        assert_eq!(cond.status, ConditionStatus::True);
        assert_eq!(cond.reason, "Deployed");
        assert_eq!(cond.message, "Orchestration: all good");
    }

    #[test]
    fn test_copy_condition_unexpected_status() {
        let reported = vec![
            Condition::new(ConditionType::Ready, ConditionStatus::from("Maybe".to_string()))
                .with_reason("Deployed")
                .with_message("half way"),
        ];
        let mut cond = Condition::new(ConditionType::Ready, ConditionStatus::False);
        copy_condition(&reported, &mut cond);

        assert_eq!(cond.status, ConditionStatus::Unknown);
        assert_eq!(cond.reason, REASON_INTEROP_ERROR);
        assert_eq!(cond.message, "Unexpected ConditionStatus \"Maybe\"");
    }

    #[test]
    fn test_status_update_waiting() {
        let state = StateObject::new("svc", StateSpec::default());
        let ([in_progress, ready, error], resources) = status_update(Some(&state), None);

        assert_eq!(in_progress.status, ConditionStatus::True);
        assert_eq!(in_progress.reason, REASON_WAITING);
        assert_eq!(in_progress.message, WAITING_MESSAGE);
        assert_eq!(ready.status, ConditionStatus::False);
        assert_eq!(error.status, ConditionStatus::False);
        assert!(resources.is_none());
    }

    #[test]
    fn test_status_update_retriable_failure() {
        let failure = ProcessError::retriable(ControllerError::MissingConfigReference);
        let ([in_progress, _, error], resources) = status_update(None, Some(&failure));

        assert_eq!(in_progress.status, ConditionStatus::True);
        assert_eq!(error.status, ConditionStatus::True);
        assert_eq!(error.reason, REASON_RETRIABLE_ERROR);
        assert_eq!(error.message, "missing config reference");
        assert!(resources.is_none());
    }

    #[test]
    fn test_status_update_terminal_failure_ignores_state() {
        let state = state_with(vec![Condition::new(ConditionType::Ready, ConditionStatus::True)]);
        let failure = ProcessError::terminal(ControllerError::MissingConfigReference);
        let ([in_progress, ready, error], resources) = status_update(Some(&state), Some(&failure));

        assert_eq!(in_progress.status, ConditionStatus::False);
        assert_eq!(ready.status, ConditionStatus::False);
        assert_eq!(error.reason, REASON_TERMINAL_ERROR);
        assert!(resources.is_none());
    }

    #[test]
    fn test_status_update_copies_state() {
        let state = state_with(vec![
            Condition::new(ConditionType::Ready, ConditionStatus::True),
            Condition::new(ConditionType::InProgress, ConditionStatus::False),
        ]);
        let ([in_progress, ready, error], resources) = status_update(Some(&state), None);

        assert_eq!(in_progress.status, ConditionStatus::False);
        assert_eq!(ready.status, ConditionStatus::True);
        assert_eq!(error.status, ConditionStatus::Unknown);
        assert_eq!(resources.unwrap()[0].name, "table");
    }

    #[test]
    fn test_process_error_display() {
        let err = ProcessError::terminal(ControllerError::NotOwned(
            "state \"svc\" not owned by ld \"svc\"".to_string(),
        ));
        assert_eq!(err.to_string(), "state \"svc\" not owned by ld \"svc\"");
        assert!(!err.is_retriable());
    }
}
