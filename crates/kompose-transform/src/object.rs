//! The object graph element: a closed sum type over every kind kompose emits

use std::collections::BTreeMap;
use std::fmt;

use kompose_common::kube_utils::{HasApiResource, ObjectMeta};
use kompose_common::Error;
use kube::discovery::ApiResource;
use serde::Serialize;

use crate::k8s::{
    DaemonSet, Deployment, DeploymentStrategy, Ingress, PersistentVolumeClaim, Pod, PodSpec,
    ReplicationController, Service,
};
use crate::openshift::resources::{BuildConfig, DeploymentConfig, ImageStream, Route};

/// Kind of a generated object
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    /// Bare pod
    Pod,
    /// apps/v1 Deployment
    Deployment,
    /// apps/v1 DaemonSet
    DaemonSet,
    /// v1 ReplicationController
    ReplicationController,
    /// v1 Service
    Service,
    /// v1 PersistentVolumeClaim
    PersistentVolumeClaim,
    /// networking.k8s.io/v1 Ingress
    Ingress,
    /// OpenShift DeploymentConfig
    DeploymentConfig,
    /// OpenShift ImageStream
    ImageStream,
    /// OpenShift BuildConfig
    BuildConfig,
    /// OpenShift Route
    Route,
}

impl ObjectKind {
    /// Kind name as the API spells it
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Pod => Pod::KIND,
            ObjectKind::Deployment => Deployment::KIND,
            ObjectKind::DaemonSet => DaemonSet::KIND,
            ObjectKind::ReplicationController => ReplicationController::KIND,
            ObjectKind::Service => Service::KIND,
            ObjectKind::PersistentVolumeClaim => PersistentVolumeClaim::KIND,
            ObjectKind::Ingress => Ingress::KIND,
            ObjectKind::DeploymentConfig => DeploymentConfig::KIND,
            ObjectKind::ImageStream => ImageStream::KIND,
            ObjectKind::BuildConfig => BuildConfig::KIND,
            ObjectKind::Route => Route::KIND,
        }
    }

    /// API resource used to address this kind
    pub fn api_resource(self) -> ApiResource {
        match self {
            ObjectKind::Pod => Pod::api_resource(),
            ObjectKind::Deployment => Deployment::api_resource(),
            ObjectKind::DaemonSet => DaemonSet::api_resource(),
            ObjectKind::ReplicationController => ReplicationController::api_resource(),
            ObjectKind::Service => Service::api_resource(),
            ObjectKind::PersistentVolumeClaim => PersistentVolumeClaim::api_resource(),
            ObjectKind::Ingress => Ingress::api_resource(),
            ObjectKind::DeploymentConfig => DeploymentConfig::api_resource(),
            ObjectKind::ImageStream => ImageStream::api_resource(),
            ObjectKind::BuildConfig => BuildConfig::api_resource(),
            ObjectKind::Route => Route::api_resource(),
        }
    }

    /// Whether this kind exposes a service on the network
    pub fn is_exposure(self) -> bool {
        matches!(
            self,
            ObjectKind::Service | ObjectKind::Ingress | ObjectKind::Route
        )
    }

}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated object
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KubeObject {
    /// Bare pod
    Pod(Pod),
    /// Deployment
    Deployment(Deployment),
    /// DaemonSet
    DaemonSet(DaemonSet),
    /// ReplicationController
    ReplicationController(ReplicationController),
    /// Service
    Service(Service),
    /// PersistentVolumeClaim
    PersistentVolumeClaim(PersistentVolumeClaim),
    /// Ingress
    Ingress(Ingress),
    /// DeploymentConfig
    DeploymentConfig(DeploymentConfig),
    /// ImageStream
    ImageStream(ImageStream),
    /// BuildConfig
    BuildConfig(BuildConfig),
    /// Route
    Route(Route),
}

impl KubeObject {
    /// Kind of this object
    pub fn kind(&self) -> ObjectKind {
        match self {
            KubeObject::Pod(_) => ObjectKind::Pod,
            KubeObject::Deployment(_) => ObjectKind::Deployment,
            KubeObject::DaemonSet(_) => ObjectKind::DaemonSet,
            KubeObject::ReplicationController(_) => ObjectKind::ReplicationController,
            KubeObject::Service(_) => ObjectKind::Service,
            KubeObject::PersistentVolumeClaim(_) => ObjectKind::PersistentVolumeClaim,
            KubeObject::Ingress(_) => ObjectKind::Ingress,
            KubeObject::DeploymentConfig(_) => ObjectKind::DeploymentConfig,
            KubeObject::ImageStream(_) => ObjectKind::ImageStream,
            KubeObject::BuildConfig(_) => ObjectKind::BuildConfig,
            KubeObject::Route(_) => ObjectKind::Route,
        }
    }

    /// Object metadata
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            KubeObject::Pod(o) => &o.metadata,
            KubeObject::Deployment(o) => &o.metadata,
            KubeObject::DaemonSet(o) => &o.metadata,
            KubeObject::ReplicationController(o) => &o.metadata,
            KubeObject::Service(o) => &o.metadata,
            KubeObject::PersistentVolumeClaim(o) => &o.metadata,
            KubeObject::Ingress(o) => &o.metadata,
            KubeObject::DeploymentConfig(o) => &o.metadata,
            KubeObject::ImageStream(o) => &o.metadata,
            KubeObject::BuildConfig(o) => &o.metadata,
            KubeObject::Route(o) => &o.metadata,
        }
    }

    /// Mutable object metadata
    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            KubeObject::Pod(o) => &mut o.metadata,
            KubeObject::Deployment(o) => &mut o.metadata,
            KubeObject::DaemonSet(o) => &mut o.metadata,
            KubeObject::ReplicationController(o) => &mut o.metadata,
            KubeObject::Service(o) => &mut o.metadata,
            KubeObject::PersistentVolumeClaim(o) => &mut o.metadata,
            KubeObject::Ingress(o) => &mut o.metadata,
            KubeObject::DeploymentConfig(o) => &mut o.metadata,
            KubeObject::ImageStream(o) => &mut o.metadata,
            KubeObject::BuildConfig(o) => &mut o.metadata,
            KubeObject::Route(o) => &mut o.metadata,
        }
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Object labels
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.metadata().labels
    }

    /// Whether this object exposes a service on the network
    pub fn is_exposure(&self) -> bool {
        self.kind().is_exposure()
    }

    /// Pod spec of workload objects; `None` for everything else
    pub fn pod_spec_mut(&mut self) -> Option<&mut PodSpec> {
        match self {
            KubeObject::Pod(o) => Some(&mut o.spec),
            KubeObject::Deployment(o) => Some(&mut o.spec.template.spec),
            KubeObject::DaemonSet(o) => Some(&mut o.spec.template.spec),
            KubeObject::ReplicationController(o) => Some(&mut o.spec.template.spec),
            KubeObject::DeploymentConfig(o) => Some(&mut o.spec.template.spec),
            _ => None,
        }
    }

    /// Whether service annotations are copied onto this object's metadata
    pub fn carries_annotations(&self) -> bool {
        matches!(
            self,
            KubeObject::Pod(_)
                | KubeObject::Deployment(_)
                | KubeObject::DaemonSet(_)
                | KubeObject::ReplicationController(_)
                | KubeObject::DeploymentConfig(_)
                | KubeObject::BuildConfig(_)
        )
    }

    /// Stop old pods before starting new ones. No-op for kinds without a
    /// configurable rollout strategy.
    pub fn set_recreate_strategy(&mut self) {
        match self {
            KubeObject::Deployment(o) => o.spec.strategy = Some(DeploymentStrategy::recreate()),
            KubeObject::DeploymentConfig(o) => {
                o.spec.strategy = Some(DeploymentStrategy::recreate())
            }
            _ => {}
        }
    }

    /// Set the namespace the object is created in
    pub fn set_namespace(&mut self, namespace: &str) {
        self.metadata_mut().namespace = Some(namespace.to_string());
    }

    /// Serialize into a JSON value suitable for a dynamic API call
    pub fn to_value(&self) -> Result<serde_json::Value, Error> {
        serde_json::to_value(self)
            .map_err(|e| Error::serialization_for_kind(self.kind().as_str(), e.to_string()))
    }
}
