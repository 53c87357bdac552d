//! Cluster access
//!
//! [`ClusterClient`] is everything the orchestrators need from the control
//! plane. [`KubeClusterClient`] implements it with kube-rs dynamic objects so
//! OpenShift kinds go through the same client as core ones.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use kompose_common::kube_utils::poll_until;
use kompose_common::{Error, Result, REAP_TIMEOUT};
use kompose_transform::{KubeObject, ObjectKind};
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::Client;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// Interval between existence checks while reaping
const REAP_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Name and labels of an object that exists in the cluster
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LiveObject {
    /// Object name
    pub name: String,
    /// Object labels
    pub labels: BTreeMap<String, String>,
}

/// How an object is removed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteMode {
    /// Delete and return
    Immediate,
    /// Delete with foreground propagation and wait until the object is gone
    Reap,
}

impl DeleteMode {
    /// Deletion mode used for a kind.
    ///
    /// Objects that own pods are reaped so their pods are gone before the
    /// command returns.
    pub fn for_kind(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Deployment
            | ObjectKind::DaemonSet
            | ObjectKind::ReplicationController
            | ObjectKind::Service
            | ObjectKind::Pod
            | ObjectKind::BuildConfig
            | ObjectKind::DeploymentConfig => DeleteMode::Reap,
            ObjectKind::PersistentVolumeClaim
            | ObjectKind::Ingress
            | ObjectKind::ImageStream
            | ObjectKind::Route => DeleteMode::Immediate,
        }
    }
}

/// Trait abstracting control-plane access for deploy and undeploy.
///
/// This trait allows mocking the cluster in tests while using the real
/// client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Namespace used when the run does not override it
    fn default_namespace(&self) -> String;

    /// Create an object
    async fn create(&self, object: &KubeObject, namespace: &str) -> Result<()>;

    /// List objects of a kind matching an equality label selector
    async fn list(&self, kind: ObjectKind, namespace: &str, selector: &str) -> Result<Vec<LiveObject>>;

    /// Delete an object by name
    async fn delete(
        &self,
        kind: ObjectKind,
        name: &str,
        namespace: &str,
        mode: DeleteMode,
    ) -> Result<()>;
}

/// Cluster client backed by kube-rs
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, kind: ObjectKind, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &kind.api_resource())
    }

    async fn reap(&self, api: &Api<DynamicObject>, kind: ObjectKind, name: &str) -> Result<()> {
        api.delete(name, &DeleteParams::foreground()).await?;
        poll_until(
            REAP_TIMEOUT,
            REAP_POLL_INTERVAL,
            format!("timed out waiting for {kind} {name} to be deleted"),
            || async move {
                let gone = api.get_opt(name).await?.is_none();
                if !gone {
                    debug!(kind = %kind, name = %name, "Waiting for deletion");
                }
                Ok(gone)
            },
        )
        .await
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    fn default_namespace(&self) -> String {
        self.client.default_namespace().to_string()
    }

    async fn create(&self, object: &KubeObject, namespace: &str) -> Result<()> {
        let kind = object.kind();
        let mut obj: DynamicObject = serde_json::from_value(object.to_value()?)
            .map_err(|e| Error::serialization_for_kind(kind.as_str(), e.to_string()))?;
        obj.metadata.namespace = Some(namespace.to_string());

        self.api(kind, namespace)
            .create(&PostParams::default(), &obj)
            .await?;
        Ok(())
    }

    async fn list(&self, kind: ObjectKind, namespace: &str, selector: &str) -> Result<Vec<LiveObject>> {
        let list = self
            .api(kind, namespace)
            .list(&ListParams::default().labels(selector))
            .await?;
        Ok(list
            .items
            .into_iter()
            .map(|obj| LiveObject {
                name: obj.metadata.name.unwrap_or_default(),
                labels: obj.metadata.labels.unwrap_or_default(),
            })
            .collect())
    }

    async fn delete(
        &self,
        kind: ObjectKind,
        name: &str,
        namespace: &str,
        mode: DeleteMode,
    ) -> Result<()> {
        let api = self.api(kind, namespace);
        match mode {
            DeleteMode::Immediate => {
                api.delete(name, &DeleteParams::default()).await?;
                Ok(())
            }
            DeleteMode::Reap => self.reap(&api, kind, name).await,
        }
    }
}
