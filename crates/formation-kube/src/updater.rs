//! Create-or-update of derived objects with optimistic concurrency

use kube::Resource;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::error::{KubeError, Result};
use crate::store::{ObjectClient, ObjectIndex};

/// Why a create-or-update failed
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpdateError {
    /// The existing object belongs to someone else
    #[error("{0}")]
    NotOwned(String),

    #[error(transparent)]
    Store(#[from] KubeError),
}

/// Result of [`ObjectUpdater::create_or_update`]
#[derive(Debug)]
pub enum UpdateOutcome<K> {
    /// Lost a race against another writer; the next change event retries
    Conflict,
    /// The object now matches the desired state
    Applied(K),
    Failed { retriable: bool, error: UpdateError },
}

impl<K> UpdateOutcome<K> {
    fn failed(error: KubeError) -> Self {
        Self::Failed {
            retriable: !error.is_invalid(),
            error: UpdateError::Store(error),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

/// Applies desired objects of one kind
pub struct ObjectUpdater<K> {
    index: Arc<dyn ObjectIndex<K>>,
    client: Arc<dyn ObjectClient<K>>,
}

impl<K> Clone for ObjectUpdater<K> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            client: Arc::clone(&self.client),
        }
    }
}

impl<K> ObjectUpdater<K>
where
    K: Resource + Clone + Serialize + Send + Sync + 'static,
{
    pub fn new(index: Arc<dyn ObjectIndex<K>>, client: Arc<dyn ObjectClient<K>>) -> Self {
        Self { index, client }
    }

    /// Create `desired`, or update the existing object to match it
    ///
    /// The existing object is read from the cache. `owner_check` runs against
    /// it before any write; an error there is terminal.
    pub async fn create_or_update<F>(&self, owner_check: F, mut desired: K) -> UpdateOutcome<K>
    where
        F: Fn(&K) -> std::result::Result<(), String>,
    {
        let namespace = desired.meta().namespace.clone().unwrap_or_default();
        let name = desired.meta().name.clone().unwrap_or_default();

        let Some(existing) = self.index.get(&namespace, &name) else {
            debug!(ns = %namespace, name = %name, "creating");
            return match self.client.create(&desired).await {
                Ok(created) => UpdateOutcome::Applied(created),
                Err(e) if e.is_already_exists() => UpdateOutcome::Conflict,
                Err(e) => UpdateOutcome::failed(e),
            };
        };

        if let Err(message) = owner_check(&existing) {
            return UpdateOutcome::Failed {
                retriable: false,
                error: UpdateError::NotOwned(message),
            };
        }

        match same_content(&*existing, &desired) {
            Ok(true) => {
                debug!(ns = %namespace, name = %name, "up to date");
                return UpdateOutcome::Applied(K::clone(&existing));
            }
            Ok(false) => {}
            Err(e) => {
                return UpdateOutcome::Failed {
                    retriable: false,
                    error: e.into(),
                };
            }
        }

        let meta = desired.meta_mut();
        meta.resource_version = existing.meta().resource_version.clone();
        meta.uid = existing.meta().uid.clone();

        debug!(ns = %namespace, name = %name, "updating");
        match self.client.update(&desired).await {
            Ok(updated) => UpdateOutcome::Applied(updated),
            Err(e) if e.is_conflict() => UpdateOutcome::Conflict,
            Err(e) => UpdateOutcome::failed(e),
        }
    }

    /// Cached copy of an object
    pub fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>> {
        self.index.get(namespace, name)
    }

    /// Delete an object; a missing object counts as deleted
    pub async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        match self.client.delete(namespace, name).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}

/// Whether two objects agree on everything except server-populated fields
///
/// Compares the owner references, labels and annotations plus every
/// top-level field other than `metadata` and `status`.
fn same_content<K>(existing: &K, desired: &K) -> Result<bool>
where
    K: Resource + Serialize,
{
    let (a, b) = (existing.meta(), desired.meta());
    if a.owner_references != b.owner_references
        || a.labels != b.labels
        || a.annotations != b.annotations
    {
        return Ok(false);
    }
    Ok(content(existing)? == content(desired)?)
}

fn content<K: Serialize>(object: &K) -> Result<JsonValue> {
    let mut value = serde_json::to_value(object)?;
    if let Some(map) = value.as_object_mut() {
        map.remove("metadata");
        map.remove("status");
    }
    Ok(value)
}
