//! In-memory application model
//!
//! A [`KomposeObject`] is what a manifest loader produces: services keyed by
//! name plus the loader that produced them. Services are stored in a
//! `BTreeMap` so iteration is lexicographic by name, which keeps conversion
//! output reproducible regardless of manifest order.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// =============================================================================
// Restart policy
// =============================================================================

/// Compose restart policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Always restart (the compose default)
    #[default]
    Always,
    /// Restart only when the container exits non-zero
    OnFailure,
    /// Never restart
    No,
}

impl RestartPolicy {
    /// Services with these policies are emitted as a bare pod without a controller
    pub fn is_pod_only(self) -> bool {
        matches!(self, RestartPolicy::OnFailure | RestartPolicy::No)
    }

    /// Pod `restartPolicy` value
    pub fn pod_restart_policy(self) -> &'static str {
        match self {
            RestartPolicy::Always => "Always",
            RestartPolicy::OnFailure => "OnFailure",
            RestartPolicy::No => "Never",
        }
    }

    /// Parse a compose restart value. `unless-stopped` behaves like `always`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" | "always" | "unless-stopped" => Some(RestartPolicy::Always),
            "on-failure" => Some(RestartPolicy::OnFailure),
            "no" => Some(RestartPolicy::No),
            _ => None,
        }
    }
}

// =============================================================================
// Ports
// =============================================================================

/// Transport protocol of a port mapping
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// TCP, the implicit default
    #[default]
    Tcp,
    /// UDP
    Udp,
    /// SCTP
    Sctp,
}

impl Protocol {
    /// Protocol name as the Kubernetes API spells it
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Sctp => "SCTP",
        }
    }

    /// The protocol field to emit; `None` for the implicit TCP default
    pub fn explicit(self) -> Option<String> {
        match self {
            Protocol::Tcp => None,
            other => Some(other.as_str().to_string()),
        }
    }

    /// Parse a compose protocol suffix (`tcp`, `udp`, `sctp`, any case)
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            "sctp" => Some(Protocol::Sctp),
            _ => None,
        }
    }
}

/// One published or exposed port of a service
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    /// Port the container listens on
    pub container_port: i32,
    /// Published port; 0 means "same as the container port"
    #[serde(default)]
    pub host_port: i32,
    /// Transport protocol
    #[serde(default)]
    pub protocol: Protocol,
    /// Host interface to bind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
}

impl PortMapping {
    /// Port mapping for a container port published on the same port
    pub fn new(container_port: i32) -> Self {
        Self {
            container_port,
            ..Default::default()
        }
    }

    /// Published port with the container-port default applied
    pub fn resolved_host_port(&self) -> i32 {
        if self.host_port == 0 {
            self.container_port
        } else {
            self.host_port
        }
    }
}

// =============================================================================
// Volumes
// =============================================================================

/// Access mode of a volume mount
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeMode {
    /// Read-write (default when no mode token is given)
    #[default]
    #[serde(rename = "rw")]
    ReadWrite,
    /// Read-only, set by an explicit `ro` token
    #[serde(rename = "ro")]
    ReadOnly,
}

impl VolumeMode {
    /// Parse a mode token such as `ro` or `ro,z`. The access mode is the
    /// first comma-separated part; SELinux labels after it are ignored.
    pub fn parse(token: &str) -> Self {
        if token.split(',').next() == Some("ro") {
            VolumeMode::ReadOnly
        } else {
            VolumeMode::ReadWrite
        }
    }

    /// Whether the mount is read-only
    pub fn is_read_only(self) -> bool {
        self == VolumeMode::ReadOnly
    }
}

/// One volume mounted into a service's container
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    /// Mount path inside the container
    pub container: String,
    /// Named volume; when unset a name is generated per mount index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
    /// Existing claim owned by another service (from `volumes_from`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<String>,
    /// Access mode
    #[serde(default)]
    pub mode: VolumeMode,
    /// Host path of a bind mount. Never translated, only warned about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Name generated for the `index`-th unnamed volume of a service
pub fn generated_volume_name(service: &str, index: usize, empty_volumes: bool) -> String {
    if empty_volumes {
        format!("{service}-empty{index}")
    } else {
        format!("{service}-claim{index}")
    }
}

// =============================================================================
// Environment and build arguments
// =============================================================================

/// Environment variable passed to the container
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    /// Variable name
    pub name: String,
    /// Variable value
    pub value: String,
}

impl EnvVar {
    /// Create an environment variable
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Build argument handed to the image build
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArg {
    /// Argument name
    pub name: String,
    /// Literal value; `None` inherits the variable of the same name from
    /// the environment running the conversion
    #[serde(default)]
    pub value: Option<String>,
}

impl BuildArg {
    /// Build argument with a literal value
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Build argument inherited from the environment
    pub fn inherited(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

// =============================================================================
// Expose
// =============================================================================

/// Public exposure requested for a service
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Expose {
    /// Not exposed
    #[default]
    No,
    /// Exposed without a fixed host (`"true"`)
    AnyHost,
    /// Exposed on this literal host
    Host(String),
}

impl Expose {
    /// Whether a route/ingress should be generated
    pub fn is_exposed(&self) -> bool {
        !matches!(self, Expose::No)
    }

    /// Host to set on the route/ingress, if fixed
    pub fn host(&self) -> Option<&str> {
        match self {
            Expose::Host(host) => Some(host),
            _ => None,
        }
    }
}

impl From<String> for Expose {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" => Expose::No,
            "true" => Expose::AnyHost,
            _ => Expose::Host(value),
        }
    }
}

impl From<&str> for Expose {
    fn from(value: &str) -> Self {
        Expose::from(value.to_string())
    }
}

impl From<Expose> for String {
    fn from(value: Expose) -> Self {
        match value {
            Expose::No => String::new(),
            Expose::AnyHost => "true".to_string(),
            Expose::Host(host) => host,
        }
    }
}

// =============================================================================
// ServiceConfig
// =============================================================================

/// One deployable service of a compose application
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    /// Container image reference
    pub image: Option<String>,
    /// Explicit container name
    pub container_name: Option<String>,
    /// Restart policy
    pub restart: RestartPolicy,
    /// Replica count; 0 means "use the run-wide default"
    pub replicas: u32,
    /// Port mappings, in declaration order
    pub ports: Vec<PortMapping>,
    /// Volume mounts, in declaration order
    pub volumes: Vec<VolumeMount>,
    /// Environment variables, in declaration order
    pub environment: Vec<EnvVar>,
    /// Capabilities to add
    pub cap_add: Vec<String>,
    /// Capabilities to drop
    pub cap_drop: Vec<String>,
    /// tmpfs mount paths
    pub tmpfs: Vec<String>,
    /// Build context directory; `None` means the image is not built
    pub build: Option<PathBuf>,
    /// Build arguments, in declaration order
    pub build_args: Vec<BuildArg>,
    /// Dockerfile path override, relative to the build context
    pub dockerfile: Option<String>,
    /// Public exposure
    pub expose: Expose,

    /// Entrypoint override
    pub command: Vec<String>,
    /// Arguments to the entrypoint
    pub args: Vec<String>,
    /// Working directory
    pub working_dir: Option<String>,
    /// Run privileged
    pub privileged: bool,
    /// User to run as; only numeric UIDs translate
    pub user: Option<String>,
    /// Keep stdin open
    pub stdin_open: bool,
    /// Allocate a TTY
    pub tty: bool,
    /// Memory limit in bytes
    pub mem_limit: Option<u64>,
    /// Annotations for generated objects (compose labels)
    pub annotations: BTreeMap<String, String>,

    /// cgroup parent (no platform equivalent)
    pub cgroup_parent: Option<String>,
    /// CPU set (no platform equivalent)
    pub cpu_set: Option<String>,
    /// CPU shares (no platform equivalent)
    pub cpu_shares: Option<i64>,
    /// Device mappings (no platform equivalent)
    pub devices: Vec<String>,
    /// DNS servers (no platform equivalent)
    pub dns: Vec<String>,
    /// DNS search domains (no platform equivalent)
    pub dns_search: Vec<String>,
    /// Networks (no platform equivalent)
    pub networks: Vec<String>,
    /// Security options (no platform equivalent)
    pub security_opt: Vec<String>,
    /// Domain name (no platform equivalent)
    pub domain_name: Option<String>,
    /// MAC address (no platform equivalent)
    pub mac_address: Option<String>,
}

impl ServiceConfig {
    /// Service running the given image with compose defaults
    pub fn with_image(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            ..Default::default()
        }
    }

    /// Image reference, falling back to the service name
    pub fn image_or<'a>(&'a self, name: &'a str) -> &'a str {
        match self.image.as_deref() {
            Some(image) if !image.is_empty() => image,
            _ => name,
        }
    }

    /// Whether the service declares at least one port
    pub fn has_ports(&self) -> bool {
        !self.ports.is_empty()
    }

    /// Whether the service declares a build context
    pub fn has_build(&self) -> bool {
        self.build
            .as_ref()
            .is_some_and(|b| !b.as_os_str().is_empty())
    }
}

// =============================================================================
// KomposeObject
// =============================================================================

/// Which loader produced a model; selects key names in diagnostics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadedFrom {
    /// docker-compose file
    #[default]
    Compose,
    /// Distributed application bundle
    Bundle,
}

impl fmt::Display for LoadedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadedFrom::Compose => write!(f, "compose"),
            LoadedFrom::Bundle => write!(f, "bundle"),
        }
    }
}

/// A whole application: services keyed by unique name
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KomposeObject {
    /// Services by name
    pub services: BTreeMap<String, ServiceConfig>,
    /// Loader provenance
    #[serde(default)]
    pub loaded_from: LoadedFrom,
}

impl KomposeObject {
    /// Empty model produced by the given loader
    pub fn new(loaded_from: LoadedFrom) -> Self {
        Self {
            services: BTreeMap::new(),
            loaded_from,
        }
    }

    /// Add or replace a service
    pub fn with_service(mut self, name: impl Into<String>, service: ServiceConfig) -> Self {
        self.services.insert(name.into(), service);
        self
    }
}
