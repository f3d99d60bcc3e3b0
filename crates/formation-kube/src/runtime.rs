//! Drives [`FormationController`] from cluster watches
//!
//! The kube-runtime `Controller` owns the work queue: descriptor changes,
//! changes to owned state objects, and changes to a release config map all
//! enqueue the descriptor key. Separate reflectors keep the state and config
//! map caches that `process` reads from.

use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::{WatchStreamExt, reflector, watcher};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use formation_core::ControllerSettings;

use crate::controller::{ControllerStores, FormationController, ProcessError};
use crate::error::{KubeError, Result};
use crate::metrics::TransitionRecorder;
use crate::resources::{LocationDescriptor, StateObject};
use crate::store::{KubeObjectClient, ObjectKey};

struct Context {
    controller: FormationController,
    requeue_after: Duration,
}

/// Api over the configured namespace, or all namespaces
fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Keep a read cache of `api` in sync in the background
fn spawn_reflector<K>(api: Api<K>) -> reflector::Store<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
{
    let (reader, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, watcher::Config::default()).default_backoff());
    tokio::spawn(stream.for_each(|event| async move {
        if let Err(e) = event {
            warn!(error = %e, kind = %K::kind(&()), "watch error");
        }
    }));
    reader
}

/// Descriptors in the config map's namespace that read release data from it
///
/// The controller's own descriptor store has no secondary indexes, so this is
/// a linear scan of the cache per config map event. Only release config maps
/// pay for it.
fn descriptors_for_release(
    descriptors: &reflector::Store<LocationDescriptor>,
    config_map: &ConfigMap,
) -> Vec<ObjectRef<LocationDescriptor>> {
    let namespace = config_map.namespace();
    let name = config_map.name_any();
    descriptors
        .state()
        .into_iter()
        .filter(|ld| ld.namespace() == namespace && ld.spec.config_map_names.release == name)
        .map(|ld| ObjectRef::from_obj(ld.as_ref()))
        .collect()
}

async fn reconcile(
    ld: Arc<LocationDescriptor>,
    ctx: Arc<Context>,
) -> std::result::Result<Action, ProcessError> {
    let key = ObjectKey::new(ld.namespace().unwrap_or_default(), ld.name_any());
    ctx.controller.process(&key).await?;
    Ok(Action::await_change())
}

fn error_policy(_ld: Arc<LocationDescriptor>, error: &ProcessError, ctx: Arc<Context>) -> Action {
    if error.is_retriable() {
        Action::requeue(ctx.requeue_after)
    } else {
        Action::await_change()
    }
}

/// Run the controller until a shutdown signal arrives
pub async fn run(
    client: Client,
    settings: &ControllerSettings,
    recorder: Arc<dyn TransitionRecorder>,
) -> Result<()> {
    let namespace = settings.namespace.as_deref();
    let descriptors: Api<LocationDescriptor> = scoped_api(&client, namespace);
    let states: Api<StateObject> = scoped_api(&client, namespace);
    let config_maps: Api<ConfigMap> = scoped_api(&client, namespace);

    let state_cache = spawn_reflector(states.clone());
    let config_map_cache = spawn_reflector(config_maps.clone());
    state_cache
        .wait_until_ready()
        .await
        .map_err(|e| KubeError::Cache(e.to_string()))?;
    config_map_cache
        .wait_until_ready()
        .await
        .map_err(|e| KubeError::Cache(e.to_string()))?;

    let watched = Controller::new(descriptors, watcher::Config::default());
    let descriptor_cache = watched.store();

    let stores = ControllerStores {
        descriptors: Arc::new(descriptor_cache.clone()),
        descriptor_client: Arc::new(KubeObjectClient::<LocationDescriptor>::new(client.clone())),
        config_maps: Arc::new(config_map_cache),
        states: Arc::new(state_cache),
        state_client: Arc::new(KubeObjectClient::<StateObject>::new(client.clone())),
    };
    let ctx = Arc::new(Context {
        controller: FormationController::new(stores, settings.location.clone())
            .with_recorder(recorder),
        requeue_after: Duration::from_secs(settings.requeue_seconds),
    });

    info!(
        location = %settings.location,
        concurrency = settings.concurrency,
        "starting formation controller"
    );

    watched
        .owns(states, watcher::Config::default())
        .watches(config_maps, watcher::Config::default(), move |cm| {
            descriptors_for_release(&descriptor_cache, &cm)
        })
        .with_config(controller::Config::default().concurrency(settings.concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _)) => debug!(ns = ?obj.namespace, name = %obj.name, "reconciled"),
                Err(e) => debug!(error = %e, "reconcile failed"),
            }
        })
        .await;

    info!("formation controller stopped");
    Ok(())
}
