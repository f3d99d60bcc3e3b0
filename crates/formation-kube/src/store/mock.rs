//! In-memory object store for testing
//!
//! Serves both as read cache and live store, so writes are visible to the
//! next lookup. Resource versions are assigned from a counter and checked on
//! update the way the API server does.

use async_trait::async_trait;
use kube::Resource;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::{ObjectClient, ObjectIndex};
use crate::error::{KubeError, Result, api_error};

type Key = (String, String);

/// Write operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Create,
    Update,
    UpdateStatus,
    Delete,
}

/// Failure returned by an operation made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFailure {
    /// 409 with reason `Conflict`
    Conflict,
    /// 409 with reason `AlreadyExists`
    AlreadyExists,
    /// 422 with reason `Invalid`
    Invalid,
    /// 503
    Unavailable,
}

impl SimulatedFailure {
    fn to_error(self, kind: &str, name: &str) -> KubeError {
        match self {
            Self::Conflict => conflict(kind, name),
            Self::AlreadyExists => already_exists(kind, name),
            Self::Invalid => api_error(
                422,
                "Invalid",
                format!("{kind} \"{name}\" is invalid"),
            ),
            Self::Unavailable => api_error(
                503,
                "ServiceUnavailable",
                "the server is currently unable to handle the request",
            ),
        }
    }
}

fn conflict(kind: &str, name: &str) -> KubeError {
    api_error(
        409,
        "Conflict",
        format!(
            "Operation cannot be fulfilled on {kind} \"{name}\": the object has been modified; please apply your changes to the latest version and try again"
        ),
    )
}

fn already_exists(kind: &str, name: &str) -> KubeError {
    api_error(409, "AlreadyExists", format!("{kind} \"{name}\" already exists"))
}

fn not_found(kind: &str, name: &str) -> KubeError {
    api_error(404, "NotFound", format!("{kind} \"{name}\" not found"))
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub gets: usize,
    pub creates: usize,
    pub updates: usize,
    pub status_updates: usize,
    pub deletes: usize,
}

impl OperationCounts {
    /// Creates, updates, status updates and deletes
    pub fn writes(&self) -> usize {
        self.creates + self.updates + self.status_updates + self.deletes
    }
}

/// In-memory store for one kind of object
pub struct MockObjectStore<K> {
    objects: Arc<RwLock<HashMap<Key, K>>>,
    operations: Arc<RwLock<OperationCounts>>,
    failures: Arc<RwLock<HashMap<MockOperation, SimulatedFailure>>>,
    next_version: Arc<RwLock<u64>>,
}

impl<K> Clone for MockObjectStore<K> {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
            operations: Arc::clone(&self.operations),
            failures: Arc::clone(&self.failures),
            next_version: Arc::clone(&self.next_version),
        }
    }
}

impl<K> Default for MockObjectStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> MockObjectStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            operations: Arc::new(RwLock::new(OperationCounts::default())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            next_version: Arc::new(RwLock::new(0)),
        }
    }

    /// Create with pre-populated objects
    pub fn with_objects(objects: impl IntoIterator<Item = K>) -> Self {
        let store = Self::new();
        for object in objects {
            store.insert(object);
        }
        store
    }

    /// Put an object in place without counting an operation
    ///
    /// A missing resource version or uid is filled in.
    pub fn insert(&self, mut object: K) {
        let version = self.bump_version();
        let meta = object.meta_mut();
        if meta.resource_version.is_none() {
            meta.resource_version = Some(version.to_string());
        }
        if meta.uid.is_none() {
            meta.uid = Some(format!("uid-{version}"));
        }
        let key = key_of(&object);
        self.objects_mut().insert(key, object);
    }

    /// Current copy of an object
    pub fn object(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects_ref()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Get all objects (for testing)
    pub fn all_objects(&self) -> Vec<K> {
        self.objects_ref().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every following `operation` fail until cleared
    pub fn fail(&self, operation: MockOperation, failure: SimulatedFailure) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation, failure);
    }

    pub fn clear_failures(&self) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reset operation counts
    pub fn reset_counts(&self) {
        *self
            .operations
            .write()
            .unwrap_or_else(PoisonError::into_inner) = OperationCounts::default();
    }

    fn objects_ref(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Key, K>> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn objects_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Key, K>> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn count(&self, f: impl FnOnce(&mut OperationCounts)) {
        let mut ops = self
            .operations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut *ops);
    }

    fn bump_version(&self) -> u64 {
        let mut next = self
            .next_version
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *next += 1;
        *next
    }

    fn check_failure(&self, operation: MockOperation, name: &str) -> Result<()> {
        let failure = self
            .failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&operation)
            .copied();
        match failure {
            Some(failure) => Err(failure.to_error(&K::plural(&()), name)),
            None => Ok(()),
        }
    }

    /// Check the stored object exists and its version matches
    fn check_version(&self, object: &K) -> Result<K> {
        let key = key_of(object);
        let kind = K::plural(&());
        let stored = self
            .objects_ref()
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found(&kind, &key.1))?;

        let expected = stored.meta().resource_version.as_deref();
        match object.meta().resource_version.as_deref() {
            Some(version) if Some(version) != expected => Err(conflict(&kind, &key.1)),
            _ => Ok(stored),
        }
    }

    fn store_new_version(&self, mut object: K) -> K {
        let version = self.bump_version();
        object.meta_mut().resource_version = Some(version.to_string());
        self.objects_mut().insert(key_of(&object), object.clone());
        object
    }
}

fn key_of<K: Resource>(object: &K) -> Key {
    let meta = object.meta();
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

/// Copy the `status` field of `from` onto `onto`, keeping everything else
fn with_status_of<K>(onto: &K, from: &K) -> Result<K>
where
    K: Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(onto)?;
    let status = serde_json::to_value(from)?
        .get("status")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    if let Some(map) = merged.as_object_mut() {
        map.insert("status".to_string(), status);
    }
    Ok(serde_json::from_value(merged)?)
}

impl<K> ObjectIndex<K> for MockObjectStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>> {
        self.count(|ops| ops.gets += 1);
        self.object(namespace, name).map(Arc::new)
    }
}

#[async_trait]
impl<K> ObjectClient<K> for MockObjectStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn create(&self, object: &K) -> Result<K> {
        self.count(|ops| ops.creates += 1);
        let key = key_of(object);
        self.check_failure(MockOperation::Create, &key.1)?;

        if self.objects_ref().contains_key(&key) {
            return Err(already_exists(&K::plural(&()), &key.1));
        }

        let mut created = object.clone();
        created.meta_mut().uid = Some(format!("uid-{}", key.1));
        created.meta_mut().creation_timestamp = None;
        Ok(self.store_new_version(created))
    }

    async fn update(&self, object: &K) -> Result<K> {
        self.count(|ops| ops.updates += 1);
        self.check_failure(MockOperation::Update, &key_of(object).1)?;

        let stored = self.check_version(object)?;
        let mut updated = object.clone();
        updated.meta_mut().uid = stored.meta().uid.clone();
        Ok(self.store_new_version(updated))
    }

    async fn update_status(&self, object: &K) -> Result<K> {
        self.count(|ops| ops.status_updates += 1);
        self.check_failure(MockOperation::UpdateStatus, &key_of(object).1)?;

        let stored = self.check_version(object)?;
        let updated = with_status_of(&stored, object)?;
        Ok(self.store_new_version(updated))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.count(|ops| ops.deletes += 1);
        self.check_failure(MockOperation::Delete, name)?;

        self.objects_mut()
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(&K::plural(&()), name))
    }
}
