//! Object store seams
//!
//! The controller reads through [`ObjectIndex`] (a read cache kept in sync by
//! watches) and writes through [`ObjectClient`] (the live store). Two
//! implementations exist:
//! - **Kube**: reflector stores and `kube::Api` (see [`KubeObjectClient`])
//! - **Mock**: in-memory, for tests (see [`MockObjectStore`])

mod api;
mod mock;

pub use api::KubeObjectClient;
pub use mock::{MockObjectStore, MockOperation, OperationCounts, SimulatedFailure};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Namespace and name of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Read cache lookup by namespace and name
pub trait ObjectIndex<K>: Send + Sync {
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>>;
}

/// Writes against the live store
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ObjectClient<K>: Send + Sync {
    /// Create a new object; fails with `AlreadyExists` if the name is taken
    async fn create(&self, object: &K) -> Result<K>;

    /// Replace an existing object; `resourceVersion` must match the stored one
    async fn update(&self, object: &K) -> Result<K>;

    /// Replace only the status subresource
    async fn update_status(&self, object: &K) -> Result<K>;

    /// Delete an object by name
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
}
