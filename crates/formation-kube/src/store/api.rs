//! Store adapters backed by the Kubernetes API

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, PostParams};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{ObjectClient, ObjectIndex};
use crate::error::{KubeError, Result};

impl<K> ObjectIndex<K> for Store<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>> {
        Store::get(self, &ObjectRef::new(name).within(namespace))
    }
}

/// Writes objects of one kind through `kube::Api`
pub struct KubeObjectClient<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for KubeObjectClient<K> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K> KubeObjectClient<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn api_for(&self, object: &K) -> Result<(Api<K>, String)> {
        let namespace = object
            .meta()
            .namespace
            .as_deref()
            .ok_or(KubeError::MissingMetadata("namespace"))?;
        let name = object
            .meta()
            .name
            .clone()
            .ok_or(KubeError::MissingMetadata("name"))?;
        Ok((self.api(namespace), name))
    }
}

#[async_trait]
impl<K> ObjectClient<K> for KubeObjectClient<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn create(&self, object: &K) -> Result<K> {
        let (api, _) = self.api_for(object)?;
        Ok(api.create(&PostParams::default(), object).await?)
    }

    async fn update(&self, object: &K) -> Result<K> {
        let (api, name) = self.api_for(object)?;
        Ok(api.replace(&name, &PostParams::default(), object).await?)
    }

    async fn update_status(&self, object: &K) -> Result<K> {
        let (api, name) = self.api_for(object)?;
        let body = serde_json::to_vec(object)?;
        Ok(api
            .replace_status(&name, &PostParams::default(), body)
            .await?)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}
