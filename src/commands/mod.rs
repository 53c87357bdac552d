//! CLI commands

use std::fmt::Display;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use kompose_common::{BuildMode, ControllerKind, ConvertOptions, KomposeObject, Provider};
use kompose_transform::{Collaborators, KubeObject, WarnedKeys};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, warn};

use crate::docker::DockerImageBuilder;
use crate::git::Git2Info;
use crate::loader;
use crate::{Error, Result};

pub mod convert;
pub mod down;
pub mod up;

/// Extension trait to convert errors with Display to CLI Error::CommandFailed.
pub trait CommandErrorExt<T> {
    /// Convert an error to `Error::CommandFailed` using its Display implementation.
    fn cmd_err(self) -> Result<T>;
}

impl<T, E: Display> CommandErrorExt<T> for std::result::Result<T, E> {
    fn cmd_err(self) -> Result<T> {
        self.map_err(|e| Error::command_failed(e.to_string()))
    }
}

/// Where the application comes from and which platform it targets
#[derive(Clone, Debug)]
pub struct Input {
    pub files: Vec<PathBuf>,
    pub bundle: Option<PathBuf>,
    pub provider: Provider,
}

/// `--build` flag values
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum BuildModeArg {
    /// Use images as they are
    #[default]
    None,
    /// Build and push images with the local docker
    Local,
    /// Let OpenShift build images from the git repository
    BuildConfig,
}

impl From<BuildModeArg> for BuildMode {
    fn from(value: BuildModeArg) -> Self {
        match value {
            BuildModeArg::None => BuildMode::None,
            BuildModeArg::Local => BuildMode::Local,
            BuildModeArg::BuildConfig => BuildMode::BuildConfig,
        }
    }
}

/// Conversion flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct TransformArgs {
    /// Replica count for every controller; overrides per-service counts
    #[arg(long)]
    pub replicas: Option<u32>,

    /// Emit Deployments
    #[arg(long)]
    pub deployment: bool,

    /// Emit DaemonSets
    #[arg(long)]
    pub daemon_set: bool,

    /// Emit ReplicationControllers
    #[arg(long)]
    pub replication_controller: bool,

    /// Emit DeploymentConfigs (OpenShift only)
    #[arg(long)]
    pub deployment_config: bool,

    /// Use emptyDir volumes instead of PersistentVolumeClaims
    #[arg(long = "emptyvols")]
    pub empty_volumes: bool,

    /// Namespace to deploy into instead of the current context's
    #[arg(long)]
    pub namespace: Option<String>,

    /// How services with a build context get their image
    #[arg(long, value_enum, default_value_t = BuildModeArg::None)]
    pub build: BuildModeArg,

    /// Allow image streams to import from insecure registries
    #[arg(long)]
    pub insecure_repository: bool,

    /// Git repository for BuildConfigs; detected from the checkout when unset
    #[arg(long)]
    pub build_repo: Option<String>,

    /// Git branch for BuildConfigs; detected from the checkout when unset
    #[arg(long)]
    pub build_branch: Option<String>,
}

impl TransformArgs {
    fn forced_controllers(&self) -> Vec<ControllerKind> {
        [
            (self.deployment, ControllerKind::Deployment),
            (self.daemon_set, ControllerKind::DaemonSet),
            (self.replication_controller, ControllerKind::ReplicationController),
            (self.deployment_config, ControllerKind::DeploymentConfig),
        ]
        .into_iter()
        .filter_map(|(set, kind)| set.then_some(kind))
        .collect()
    }

    /// Validated run options for `provider` reading `input_files`
    pub fn options(&self, provider: Provider, input_files: Vec<PathBuf>) -> Result<ConvertOptions> {
        let opt = ConvertOptions {
            provider,
            replicas: self.replicas.unwrap_or(1),
            force_replicas: self.replicas.is_some(),
            forced_controllers: self.forced_controllers(),
            empty_volumes: self.empty_volumes,
            namespace: self.namespace.clone(),
            build: self.build.into(),
            insecure_repository: self.insecure_repository,
            build_repo: self.build_repo.clone(),
            build_branch: self.build_branch.clone(),
            input_files,
            ..Default::default()
        }
        .resolve_controllers();
        opt.validate()?;
        Ok(opt)
    }
}

/// Load the application and resolve the run options
pub fn load(input: &Input, args: &TransformArgs) -> Result<(KomposeObject, ConvertOptions)> {
    let files = match input.bundle.as_ref() {
        Some(bundle) => vec![bundle.clone()],
        None => loader::resolve_input_files(&input.files)?,
    };
    let opt = args.options(input.provider, files.clone())?;
    let model = loader::load(&files, input.bundle.as_deref())?;
    debug!(
        services = model.services.len(),
        provider = %opt.provider,
        "Application loaded"
    );
    Ok((model, opt))
}

/// Convert a loaded application with the real docker and git collaborators
pub async fn transform(model: &KomposeObject, opt: &ConvertOptions) -> Result<Vec<KubeObject>> {
    let docker = DockerImageBuilder::new();
    let git = Git2Info::new();
    let collaborators = Collaborators {
        image_builder: Some(&docker),
        git: Some(&git),
    };
    let mut warned = WarnedKeys::new();
    let objects = kompose_transform::transform(model, opt, collaborators, &mut warned).await?;
    if !warned.is_empty() {
        let keys: Vec<&str> = warned.iter().collect();
        warn!(
            keys = %keys.join(", "),
            "Some compose keys have no {} equivalent and were ignored", opt.provider
        );
    }
    Ok(objects)
}

/// Cluster access flags for `up` and `down`
#[derive(Args, Debug, Clone, Default)]
pub struct ClusterArgs {
    /// Kubeconfig to use instead of the default resolution
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one
    #[arg(long)]
    pub context: Option<String>,
}

/// Build a kube [`Client`] from the cluster flags, falling back to kube
/// defaults.
pub async fn kube_client(args: &ClusterArgs) -> Result<Client> {
    if args.kubeconfig.is_none() && args.context.is_none() {
        return Client::try_default().await.cmd_err();
    }

    let kubeconfig = match args.kubeconfig.as_deref() {
        Some(path) => read_kubeconfig(path)?,
        None => Kubeconfig::read()
            .map_err(|e| Error::command_failed(format!("failed to read kubeconfig: {}", e)))?,
    };
    let options = KubeConfigOptions {
        context: args.context.clone(),
        ..Default::default()
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .cmd_err()?;
    Client::try_from(config).cmd_err()
}

fn read_kubeconfig(path: &Path) -> Result<Kubeconfig> {
    Kubeconfig::read_from(path).map_err(|e| {
        Error::command_failed(format!(
            "failed to read kubeconfig {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replicas_flag_forces_count() {
        let args = TransformArgs {
            replicas: Some(3),
            ..Default::default()
        };
        let opt = args.options(Provider::Kubernetes, Vec::new()).unwrap();
        assert_eq!(opt.replicas, 3);
        assert!(opt.force_replicas);
        assert!(opt.controllers.deployment);

        let opt = TransformArgs::default()
            .options(Provider::Kubernetes, Vec::new())
            .unwrap();
        assert_eq!(opt.replicas, 1);
        assert!(!opt.force_replicas);
    }

    #[test]
    fn test_controller_flags() {
        let args = TransformArgs {
            daemon_set: true,
            ..Default::default()
        };
        let opt = args.options(Provider::OpenShift, Vec::new()).unwrap();
        assert!(opt.controllers.daemon_set);
        assert!(!opt.controllers.deployment_config);

        let args = TransformArgs {
            deployment: true,
            daemon_set: true,
            ..Default::default()
        };
        assert!(args.options(Provider::Kubernetes, Vec::new()).is_err());

        let args = TransformArgs {
            deployment_config: true,
            ..Default::default()
        };
        assert!(args.options(Provider::Kubernetes, Vec::new()).is_err());
    }

    #[test]
    fn test_build_config_needs_openshift() {
        let args = TransformArgs {
            build: BuildModeArg::BuildConfig,
            ..Default::default()
        };
        assert!(args.options(Provider::Kubernetes, Vec::new()).is_err());
        assert!(args.options(Provider::OpenShift, Vec::new()).is_ok());
    }

    #[test]
    fn test_zero_replicas_rejected() {
        let args = TransformArgs {
            replicas: Some(0),
            ..Default::default()
        };
        assert!(args.options(Provider::Kubernetes, Vec::new()).is_err());
    }
}
