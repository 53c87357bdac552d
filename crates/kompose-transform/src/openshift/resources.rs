//! OpenShift resource types: DeploymentConfig, ImageStream, BuildConfig, Route

use std::collections::BTreeMap;

use kompose_common::kube_utils::{config_labels, HasApiResource, ObjectMeta};
use serde::{Deserialize, Serialize};

use crate::k8s::{DeploymentStrategy, EnvVar, PodTemplateSpec};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Reference to another object by kind and name
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ObjectReference {
    /// Referenced kind (e.g., "ImageStreamTag", "DockerImage")
    pub kind: String,
    /// Referenced name
    pub name: String,
}

impl ObjectReference {
    /// Reference to `name:tag` in an image stream
    pub fn image_stream_tag(name: &str, tag: &str) -> Self {
        Self {
            kind: "ImageStreamTag".to_string(),
            name: format!("{name}:{tag}"),
        }
    }
}

// =============================================================================
// DeploymentConfig
// =============================================================================

/// OpenShift DeploymentConfig
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: DeploymentConfigSpec,
}

/// DeploymentConfig spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeploymentConfigSpec {
    /// Number of replicas
    pub replicas: i32,
    /// Pod selector
    pub selector: BTreeMap<String, String>,
    /// Pod template
    pub template: PodTemplateSpec,
    /// Redeploy triggers
    pub triggers: Vec<DeploymentTriggerPolicy>,
    /// Rollout strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<DeploymentStrategy>,
}

/// Redeploy trigger
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTriggerPolicy {
    /// Trigger type: ConfigChange or ImageChange
    #[serde(rename = "type")]
    pub type_: String,
    /// Parameters of an ImageChange trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_change_params: Option<ImageChangeParams>,
}

impl DeploymentTriggerPolicy {
    /// Redeploy when the config changes
    pub fn config_change() -> Self {
        Self {
            type_: "ConfigChange".to_string(),
            image_change_params: None,
        }
    }

    /// Redeploy `container` when the image stream tag moves
    pub fn image_change(container: &str, from: ObjectReference) -> Self {
        Self {
            type_: "ImageChange".to_string(),
            image_change_params: Some(ImageChangeParams {
                automatic: true,
                container_names: vec![container.to_string()],
                from,
            }),
        }
    }
}

/// ImageChange trigger parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageChangeParams {
    /// Roll out automatically
    pub automatic: bool,
    /// Containers whose image is replaced
    pub container_names: Vec<String>,
    /// Watched tag
    pub from: ObjectReference,
}

impl HasApiResource for DeploymentConfig {
    const API_VERSION: &'static str = "apps.openshift.io/v1";
    const KIND: &'static str = "DeploymentConfig";
}

impl DeploymentConfig {
    /// Create a new DeploymentConfig
    pub fn new(
        name: &str,
        replicas: i32,
        template: PodTemplateSpec,
        triggers: Vec<DeploymentTriggerPolicy>,
    ) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec: DeploymentConfigSpec {
                replicas,
                selector: config_labels(name),
                template,
                triggers,
                strategy: None,
            },
        }
    }
}

// =============================================================================
// ImageStream
// =============================================================================

/// OpenShift ImageStream
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageStream {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: ImageStreamSpec,
}

/// ImageStream spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageStreamSpec {
    /// Tags; empty when the stream is fed by an in-cluster build
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagReference>,
}

/// One image stream tag
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TagReference {
    /// Tag name
    pub name: String,
    /// Image the tag tracks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ObjectReference>,
    /// Import policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_policy: Option<TagImportPolicy>,
}

/// Import policy of a tag
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TagImportPolicy {
    /// Allow importing from registries without verified TLS
    #[serde(default, skip_serializing_if = "is_false")]
    pub insecure: bool,
}

impl HasApiResource for ImageStream {
    const API_VERSION: &'static str = "image.openshift.io/v1";
    const KIND: &'static str = "ImageStream";
}

impl ImageStream {
    /// Create a new ImageStream with the given tags
    pub fn new(name: &str, tags: Vec<TagReference>) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec: ImageStreamSpec { tags },
        }
    }
}

// =============================================================================
// BuildConfig
// =============================================================================

/// OpenShift BuildConfig
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: BuildConfigSpec,
}

/// BuildConfig spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfigSpec {
    /// Build triggers
    pub triggers: Vec<BuildTriggerPolicy>,
    /// Serial or Parallel
    pub run_policy: String,
    /// Source to build from
    pub source: BuildSource,
    /// Build strategy
    pub strategy: BuildStrategy,
    /// Build output
    pub output: BuildOutput,
}

/// Build trigger
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BuildTriggerPolicy {
    /// Trigger type
    #[serde(rename = "type")]
    pub type_: String,
}

/// Git source of a build
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildSource {
    /// Source type ("Git")
    #[serde(rename = "type")]
    pub type_: String,
    /// Repository and ref
    pub git: GitBuildSource,
    /// Subdirectory of the repository holding the build context
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context_dir: String,
}

/// Repository and ref of a git source
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GitBuildSource {
    /// Repository URL
    pub uri: String,
    /// Branch
    #[serde(rename = "ref")]
    pub ref_: String,
}

/// Build strategy
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildStrategy {
    /// Strategy type ("Docker")
    #[serde(rename = "type")]
    pub type_: String,
    /// Docker strategy options
    pub docker_strategy: DockerBuildStrategy,
}

/// Docker strategy options
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerBuildStrategy {
    /// Dockerfile path relative to the context dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile_path: Option<String>,
    /// Build arguments passed as environment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

/// Build output
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BuildOutput {
    /// Where the built image is pushed
    pub to: ObjectReference,
}

impl HasApiResource for BuildConfig {
    const API_VERSION: &'static str = "build.openshift.io/v1";
    const KIND: &'static str = "BuildConfig";
}

impl BuildConfig {
    /// Docker build of `repo`@`branch` in `context_dir`, pushed to `name:tag`
    pub fn new(
        name: &str,
        repo: &str,
        branch: &str,
        context_dir: String,
        strategy: DockerBuildStrategy,
        tag: &str,
    ) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec: BuildConfigSpec {
                triggers: vec![BuildTriggerPolicy {
                    type_: "ConfigChange".to_string(),
                }],
                run_policy: "Serial".to_string(),
                source: BuildSource {
                    type_: "Git".to_string(),
                    git: GitBuildSource {
                        uri: repo.to_string(),
                        ref_: branch.to_string(),
                    },
                    context_dir,
                },
                strategy: BuildStrategy {
                    type_: "Docker".to_string(),
                    docker_strategy: strategy,
                },
                output: BuildOutput {
                    to: ObjectReference::image_stream_tag(name, tag),
                },
            },
        }
    }
}

// =============================================================================
// Route
// =============================================================================

/// OpenShift Route
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: RouteSpec,
}

/// Route spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RouteSpec {
    /// Public host; generated by the router when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Target service
    pub to: ObjectReference,
    /// Target port
    pub port: RoutePort,
}

/// Route target port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    /// Service port
    pub target_port: i32,
}

impl HasApiResource for Route {
    const API_VERSION: &'static str = "route.openshift.io/v1";
    const KIND: &'static str = "Route";
}

impl Route {
    /// Route to port `port` of service `name`
    pub fn new(name: &str, host: Option<String>, port: i32) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec: RouteSpec {
                host,
                to: ObjectReference {
                    kind: "Service".to_string(),
                    name: name.to_string(),
                },
                port: RoutePort { target_port: port },
            },
        }
    }
}
