//! Run-wide conversion options

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Target platform
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Plain Kubernetes
    #[default]
    Kubernetes,
    /// OpenShift, which layers builds, image streams and routes on Kubernetes
    OpenShift,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Kubernetes => write!(f, "Kubernetes"),
            Provider::OpenShift => write!(f, "OpenShift"),
        }
    }
}

/// How images with a build context are produced
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
    /// Do not build
    #[default]
    None,
    /// Build and push locally with docker before converting
    Local,
    /// Emit BuildConfig objects and let OpenShift build
    BuildConfig,
}

/// Workload controller kinds a service can be emitted as
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ControllerKind {
    /// apps/v1 Deployment
    Deployment,
    /// apps/v1 DaemonSet
    DaemonSet,
    /// v1 ReplicationController
    ReplicationController,
    /// OpenShift DeploymentConfig
    DeploymentConfig,
}

impl ControllerKind {
    /// Whether the provider can run this controller kind
    pub fn supported_by(self, provider: Provider) -> bool {
        match self {
            ControllerKind::DeploymentConfig => provider == Provider::OpenShift,
            _ => true,
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerKind::Deployment => "Deployment",
            ControllerKind::DaemonSet => "DaemonSet",
            ControllerKind::ReplicationController => "ReplicationController",
            ControllerKind::DeploymentConfig => "DeploymentConfig",
        };
        f.write_str(name)
    }
}

/// Which controller objects to emit for services with restart `always`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerToggles {
    /// Emit a Deployment
    pub deployment: bool,
    /// Emit a DaemonSet
    pub daemon_set: bool,
    /// Emit a ReplicationController
    pub replication_controller: bool,
    /// Emit a DeploymentConfig
    pub deployment_config: bool,
}

impl ControllerToggles {
    /// Toggles with exactly one kind enabled
    pub fn only(kind: ControllerKind) -> Self {
        let mut toggles = Self::default();
        toggles.enable(kind);
        toggles
    }

    /// Enable a kind
    pub fn enable(&mut self, kind: ControllerKind) {
        match kind {
            ControllerKind::Deployment => self.deployment = true,
            ControllerKind::DaemonSet => self.daemon_set = true,
            ControllerKind::ReplicationController => self.replication_controller = true,
            ControllerKind::DeploymentConfig => self.deployment_config = true,
        }
    }

    /// Whether a kind is enabled
    pub fn is_enabled(&self, kind: ControllerKind) -> bool {
        match kind {
            ControllerKind::Deployment => self.deployment,
            ControllerKind::DaemonSet => self.daemon_set,
            ControllerKind::ReplicationController => self.replication_controller,
            ControllerKind::DeploymentConfig => self.deployment_config,
        }
    }

    /// Whether any kind is enabled
    pub fn any(&self) -> bool {
        self.deployment || self.daemon_set || self.replication_controller || self.deployment_config
    }
}

/// Global configuration of one conversion run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConvertOptions {
    /// Target platform
    pub provider: Provider,
    /// Run-wide replica default
    pub replicas: u32,
    /// Use `replicas` for every service even when it declares its own count
    pub force_replicas: bool,
    /// Controller objects to emit
    pub controllers: ControllerToggles,
    /// Controller kinds the user explicitly asked for
    pub forced_controllers: Vec<ControllerKind>,
    /// Use emptyDir volumes instead of PersistentVolumeClaims
    pub empty_volumes: bool,
    /// Namespace override; the client's ambient namespace otherwise
    pub namespace: Option<String>,
    /// Build mode
    pub build: BuildMode,
    /// Mark image stream imports as insecure
    pub insecure_repository: bool,
    /// Source repository for BuildConfigs; detected from git when unset
    pub build_repo: Option<String>,
    /// Source branch for BuildConfigs; detected from git when unset
    pub build_branch: Option<String>,
    /// Manifest files the model was loaded from
    pub input_files: Vec<PathBuf>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            provider: Provider::Kubernetes,
            replicas: 1,
            force_replicas: false,
            controllers: ControllerToggles::default(),
            forced_controllers: Vec::new(),
            empty_volumes: false,
            namespace: None,
            build: BuildMode::None,
            insecure_repository: false,
            build_repo: None,
            build_branch: None,
            input_files: Vec::new(),
        }
    }
}

impl ConvertOptions {
    /// Options for the given provider with everything else defaulted
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            ..Default::default()
        }
        .resolve_controllers()
    }

    /// Whether the user explicitly forced any controller kind
    pub fn controller_forced(&self) -> bool {
        !self.forced_controllers.is_empty()
    }

    /// Fill the controller toggles.
    ///
    /// Explicitly forced kinds win; otherwise, when nothing is enabled yet,
    /// the provider default is used (Deployment on Kubernetes,
    /// DeploymentConfig on OpenShift).
    pub fn resolve_controllers(mut self) -> Self {
        if self.controller_forced() {
            let mut toggles = ControllerToggles::default();
            for kind in &self.forced_controllers {
                toggles.enable(*kind);
            }
            self.controllers = toggles;
        } else if !self.controllers.any() {
            self.controllers = match self.provider {
                Provider::Kubernetes => ControllerToggles::only(ControllerKind::Deployment),
                Provider::OpenShift => ControllerToggles::only(ControllerKind::DeploymentConfig),
            };
        }
        self
    }

    /// Reject option combinations that cannot produce a coherent object graph
    pub fn validate(&self) -> Result<()> {
        if self.replicas == 0 {
            return Err(Error::validation("replicas must be at least 1"));
        }
        if self.forced_controllers.len() > 1 {
            let kinds: Vec<String> = self.forced_controllers.iter().map(|k| k.to_string()).collect();
            return Err(Error::validation(format!(
                "only one controller kind may be requested, got {}",
                kinds.join(", ")
            )));
        }
        if let Some(kind) = self
            .forced_controllers
            .iter()
            .find(|k| !k.supported_by(self.provider))
        {
            return Err(Error::validation(format!(
                "{kind} objects are not supported by the {} provider",
                self.provider
            )));
        }
        if self.build == BuildMode::BuildConfig && self.provider != Provider::OpenShift {
            return Err(Error::validation(
                "build-config builds are only supported by the OpenShift provider",
            ));
        }
        Ok(())
    }

    /// Namespace to deploy into: the override, else the ambient namespace
    pub fn resolved_namespace(&self, ambient: &str) -> String {
        self.namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| ambient.to_string())
    }

    /// Absolute directory of the first input manifest.
    ///
    /// Reading from stdin (`-`) or having no input resolves to the current
    /// working directory.
    pub fn compose_file_dir(&self) -> Result<PathBuf> {
        let cwd = std::env::current_dir().map_err(|e| {
            Error::internal_with_context("compose_file_dir", format!("no working directory: {e}"))
        })?;
        let first = match self.input_files.first() {
            Some(file) if file != Path::new("-") => file,
            _ => return Ok(cwd),
        };
        let absolute = if first.is_absolute() {
            first.clone()
        } else {
            cwd.join(first)
        };
        Ok(absolute
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(cwd))
    }
}
