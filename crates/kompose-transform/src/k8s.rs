//! Kubernetes resource types emitted by the transformers
//!
//! These mirror the subset of the upstream API that kompose fills in. Empty
//! collections and unset options are skipped on serialization so the
//! rendered manifests stay minimal and stable.

use std::collections::BTreeMap;

use kompose_common::kube_utils::{config_labels, HasApiResource, ObjectMeta};
use kompose_common::PVC_REQUEST_SIZE;
use serde::{Deserialize, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

// =============================================================================
// Container
// =============================================================================

/// Container spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name
    pub name: String,
    /// Image
    pub image: String,
    /// Entrypoint
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// Ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    /// Resource limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Volume mounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    /// Security context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,
    /// Keep stdin open
    #[serde(default, skip_serializing_if = "is_false")]
    pub stdin: bool,
    /// Allocate a TTY
    #[serde(default, skip_serializing_if = "is_false")]
    pub tty: bool,
}

/// Environment variable with a literal value
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EnvVar {
    /// Variable name
    pub name: String,
    /// Value; omitted when empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
}

/// Container port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    /// Port number
    pub container_port: i32,
    /// Protocol, omitted for TCP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Host interface
    #[serde(default, rename = "hostIP", skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
}

/// Resource limits
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceRequirements {
    /// Limits by resource name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, String>,
}

/// Container security context
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    /// Run privileged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    /// UID to run as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<i64>,
    /// POSIX capabilities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
}

impl SecurityContext {
    /// Whether nothing is set
    pub fn is_empty(&self) -> bool {
        self.privileged.is_none() && self.run_as_user.is_none() && self.capabilities.is_none()
    }
}

/// Capabilities added to or dropped from a container
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Capabilities {
    /// Added capabilities
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add: Vec<String>,
    /// Dropped capabilities
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop: Vec<String>,
}

// =============================================================================
// Volumes
// =============================================================================

/// Volume mount
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    /// Volume name
    pub name: String,
    /// Mount path
    pub mount_path: String,
    /// Mount read-only
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,
}

/// Pod volume
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume name
    pub name: String,
    /// Ephemeral directory source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_dir: Option<EmptyDirVolumeSource>,
    /// Persistent claim source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimVolumeSource>,
}

impl Volume {
    /// Volume backed by an emptyDir, optionally in memory
    pub fn from_empty_dir(name: impl Into<String>, medium: Option<String>) -> Self {
        Self {
            name: name.into(),
            empty_dir: Some(EmptyDirVolumeSource { medium }),
            persistent_volume_claim: None,
        }
    }

    /// Volume backed by a PersistentVolumeClaim
    pub fn from_claim(name: impl Into<String>, read_only: bool) -> Self {
        let name = name.into();
        Self {
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: name.clone(),
                read_only,
            }),
            name,
            empty_dir: None,
        }
    }
}

/// emptyDir source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EmptyDirVolumeSource {
    /// Storage medium ("Memory" for tmpfs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
}

/// PersistentVolumeClaim source
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimVolumeSource {
    /// Claim name
    pub claim_name: String,
    /// Mount read-only
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,
}

// =============================================================================
// Pods and pod templates
// =============================================================================

/// Pod spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Containers; kompose always emits exactly one
    pub containers: Vec<Container>,
    /// Volumes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    /// Restart policy (Always, OnFailure, Never)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,
}

impl PodSpec {
    /// Pod spec with a single container
    pub fn single(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            containers: vec![Container {
                name: name.into(),
                image: image.into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }
}

/// Pod template metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PodMeta {
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Pod template
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PodTemplateSpec {
    /// Template metadata
    pub metadata: PodMeta,
    /// Pod spec
    pub spec: PodSpec,
}

impl PodTemplateSpec {
    /// Template labelled for `name` with a single container
    pub fn for_service(name: &str, image: &str) -> Self {
        Self {
            metadata: PodMeta {
                labels: config_labels(name),
            },
            spec: PodSpec::single(name, image),
        }
    }
}

/// Kubernetes Pod
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: PodSpec,
}

impl HasApiResource for Pod {
    const API_VERSION: &'static str = "v1";
    const KIND: &'static str = "Pod";
}

impl Pod {
    /// Create a new Pod
    pub fn new(name: &str, spec: PodSpec) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec,
        }
    }
}

// =============================================================================
// Controllers
// =============================================================================

/// Label selector
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Exact-match labels
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Selector matching the pods of `name`
    pub fn for_service(name: &str) -> Self {
        Self {
            match_labels: config_labels(name),
        }
    }
}

/// Rollout strategy
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeploymentStrategy {
    /// Strategy type: RollingUpdate or Recreate
    #[serde(rename = "type")]
    pub type_: String,
}

impl DeploymentStrategy {
    /// Stop old pods before starting new ones
    pub fn recreate() -> Self {
        Self {
            type_: "Recreate".to_string(),
        }
    }
}

/// Kubernetes Deployment
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: DeploymentSpec,
}

/// Deployment spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Number of replicas
    pub replicas: i32,
    /// Label selector
    pub selector: LabelSelector,
    /// Pod template
    pub template: PodTemplateSpec,
    /// Rollout strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<DeploymentStrategy>,
}

impl HasApiResource for Deployment {
    const API_VERSION: &'static str = "apps/v1";
    const KIND: &'static str = "Deployment";
}

impl Deployment {
    /// Create a new Deployment
    pub fn new(name: &str, replicas: i32, template: PodTemplateSpec) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec: DeploymentSpec {
                replicas,
                selector: LabelSelector::for_service(name),
                template,
                strategy: None,
            },
        }
    }
}

/// Kubernetes DaemonSet
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSet {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: DaemonSetSpec,
}

/// DaemonSet spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DaemonSetSpec {
    /// Label selector
    pub selector: LabelSelector,
    /// Pod template
    pub template: PodTemplateSpec,
}

impl HasApiResource for DaemonSet {
    const API_VERSION: &'static str = "apps/v1";
    const KIND: &'static str = "DaemonSet";
}

impl DaemonSet {
    /// Create a new DaemonSet
    pub fn new(name: &str, template: PodTemplateSpec) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec: DaemonSetSpec {
                selector: LabelSelector::for_service(name),
                template,
            },
        }
    }
}

/// Kubernetes ReplicationController
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationController {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: ReplicationControllerSpec,
}

/// ReplicationController spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReplicationControllerSpec {
    /// Number of replicas
    pub replicas: i32,
    /// Label selector
    pub selector: BTreeMap<String, String>,
    /// Pod template
    pub template: PodTemplateSpec,
}

impl HasApiResource for ReplicationController {
    const API_VERSION: &'static str = "v1";
    const KIND: &'static str = "ReplicationController";
}

impl ReplicationController {
    /// Create a new ReplicationController
    pub fn new(name: &str, replicas: i32, template: PodTemplateSpec) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec: ReplicationControllerSpec {
                replicas,
                selector: config_labels(name),
                template,
            },
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// Kubernetes Service
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: ServiceSpec,
}

/// Service spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Pod selector
    pub selector: BTreeMap<String, String>,
    /// Ports; empty for headless services
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ServicePort>,
    /// "None" for headless services
    #[serde(default, rename = "clusterIP", skip_serializing_if = "Option::is_none")]
    pub cluster_ip: Option<String>,
}

/// Service port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    /// Port name: the published port as a string
    pub name: String,
    /// Protocol, omitted for TCP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Published port
    pub port: i32,
    /// Container port
    pub target_port: i32,
}

impl HasApiResource for Service {
    const API_VERSION: &'static str = "v1";
    const KIND: &'static str = "Service";
}

impl Service {
    /// Create a Service selecting the pods of `name`, without ports
    pub fn new(name: &str) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec: ServiceSpec {
                selector: config_labels(name),
                ..Default::default()
            },
        }
    }

    /// Whether the service has no cluster address
    pub fn is_headless(&self) -> bool {
        self.spec.cluster_ip.as_deref() == Some("None")
    }

    /// Published port of the first port entry
    pub fn first_port(&self) -> Option<i32> {
        self.spec.ports.first().map(|p| p.port)
    }
}

// =============================================================================
// PersistentVolumeClaim
// =============================================================================

/// Kubernetes PersistentVolumeClaim
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaim {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: PersistentVolumeClaimSpec,
}

/// PersistentVolumeClaim spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimSpec {
    /// Access modes
    pub access_modes: Vec<String>,
    /// Requested storage
    pub resources: VolumeResourceRequirements,
}

/// Storage requests of a claim
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct VolumeResourceRequirements {
    /// Requests by resource name
    pub requests: BTreeMap<String, String>,
}

impl HasApiResource for PersistentVolumeClaim {
    const API_VERSION: &'static str = "v1";
    const KIND: &'static str = "PersistentVolumeClaim";
}

impl PersistentVolumeClaim {
    /// Claim for the default size with the given access mode
    pub fn new(name: &str, read_only: bool) -> Self {
        let access_mode = if read_only {
            "ReadOnlyMany"
        } else {
            "ReadWriteOnce"
        };
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec: PersistentVolumeClaimSpec {
                access_modes: vec![access_mode.to_string()],
                resources: VolumeResourceRequirements {
                    requests: BTreeMap::from([(
                        "storage".to_string(),
                        PVC_REQUEST_SIZE.to_string(),
                    )]),
                },
            },
        }
    }
}

// =============================================================================
// Ingress
// =============================================================================

/// Kubernetes Ingress
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ingress {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: IngressSpec,
}

/// Ingress spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IngressSpec {
    /// Routing rules
    pub rules: Vec<IngressRule>,
}

/// One host rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IngressRule {
    /// Host to match; any host when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// HTTP paths
    pub http: HttpIngressRuleValue,
}

/// HTTP paths of a rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HttpIngressRuleValue {
    /// Paths
    pub paths: Vec<HttpIngressPath>,
}

/// One HTTP path routed to a backend
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressPath {
    /// Path prefix
    pub path: String,
    /// Path matching mode
    pub path_type: String,
    /// Backend
    pub backend: IngressBackend,
}

/// Ingress backend
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IngressBackend {
    /// Service backend
    pub service: IngressServiceBackend,
}

/// Service referenced by an ingress backend
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IngressServiceBackend {
    /// Service name
    pub name: String,
    /// Service port
    pub port: ServiceBackendPort,
}

/// Port of an ingress service backend
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServiceBackendPort {
    /// Port number
    pub number: i32,
}

impl HasApiResource for Ingress {
    const API_VERSION: &'static str = "networking.k8s.io/v1";
    const KIND: &'static str = "Ingress";
}

impl Ingress {
    /// Ingress routing every path on `host` to port `port` of service `name`
    pub fn new(name: &str, host: Option<String>, port: i32) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec: IngressSpec {
                rules: vec![IngressRule {
                    host,
                    http: HttpIngressRuleValue {
                        paths: vec![HttpIngressPath {
                            path: "/".to_string(),
                            path_type: "Prefix".to_string(),
                            backend: IngressBackend {
                                service: IngressServiceBackend {
                                    name: name.to_string(),
                                    port: ServiceBackendPort { number: port },
                                },
                            },
                        }],
                    },
                }],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_service_serializes_without_ports() {
        let mut svc = Service::new("worker");
        svc.spec.cluster_ip = Some("None".to_string());
        let json = serde_json::to_value(&svc).unwrap();
        assert_eq!(json["spec"]["clusterIP"], "None");
        assert!(json["spec"].get("ports").is_none());
        assert_eq!(json["spec"]["selector"]["io.kompose.service"], "worker");
        assert!(svc.is_headless());
    }

    #[test]
    fn test_pvc_access_modes() {
        let pvc = PersistentVolumeClaim::new("db-claim0", true);
        assert_eq!(pvc.spec.access_modes, vec!["ReadOnlyMany"]);
        assert_eq!(pvc.spec.resources.requests["storage"], "100Mi");

        let pvc = PersistentVolumeClaim::new("db-claim0", false);
        assert_eq!(pvc.spec.access_modes, vec!["ReadWriteOnce"]);
    }

    #[test]
    fn test_ingress_without_host() {
        let ingress = Ingress::new("web", None, 80);
        let json = serde_json::to_value(&ingress).unwrap();
        let rule = &json["spec"]["rules"][0];
        assert!(rule.get("host").is_none());
        assert_eq!(rule["http"]["paths"][0]["backend"]["service"]["name"], "web");
        assert_eq!(
            rule["http"]["paths"][0]["backend"]["service"]["port"]["number"],
            80
        );
    }

    #[test]
    fn test_container_skips_unset_fields() {
        let spec = PodSpec::single("web", "nginx");
        let json = serde_json::to_value(&spec).unwrap();
        let container = &json["containers"][0];
        assert_eq!(container["name"], "web");
        assert!(container.get("stdin").is_none());
        assert!(container.get("env").is_none());
        assert!(json.get("restartPolicy").is_none());
    }
}
