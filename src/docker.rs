//! Local image builds with the docker CLI

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use kompose_common::{Error, Result, ServiceConfig};
use kompose_transform::{build_args_env, ImageBuilder};
use tokio::process::Command;
use tracing::debug;

/// [`ImageBuilder`] shelling out to `docker build` and `docker push`
#[derive(Clone, Debug, Default)]
pub struct DockerImageBuilder {
    binary: Option<PathBuf>,
}

impl DockerImageBuilder {
    /// Builder using `docker` from `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder using a specific docker-compatible binary
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }

    fn command(&self) -> Command {
        match &self.binary {
            Some(binary) => Command::new(binary),
            None => Command::new("docker"),
        }
    }

    async fn run(&self, name: &str, args: Vec<String>, what: &str) -> Result<()> {
        debug!(service = %name, args = ?args, "Running docker {}", what);
        let output = self
            .command()
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::build_for(name, format!("unable to run docker: {e}")))?;

        if !output.status.success() {
            return Err(Error::build_for(
                name,
                format!(
                    "docker {what} failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(())
    }
}

/// Arguments of `docker build` for a service.
///
/// The context is resolved against `compose_dir`; the dockerfile override is
/// relative to the context, as compose defines it. Inherited build arguments
/// are resolved through `lookup` and passed sorted by name.
pub fn build_args(
    name: &str,
    service: &ServiceConfig,
    compose_dir: &Path,
    lookup: &(dyn Fn(&str) -> Option<String> + Send + Sync),
) -> Result<Vec<String>> {
    let context = service
        .build
        .as_ref()
        .ok_or_else(|| Error::build_for(name, "service has no build context"))?;
    let context = if context.is_absolute() {
        context.clone()
    } else {
        compose_dir.join(context)
    };

    let mut args = vec![
        "build".to_string(),
        "-t".to_string(),
        service.image_or(name).to_string(),
    ];
    if let Some(dockerfile) = service.dockerfile.as_deref().filter(|d| !d.is_empty()) {
        args.push("-f".to_string());
        args.push(context.join(dockerfile).display().to_string());
    }
    for env in build_args_env(service, lookup) {
        args.push("--build-arg".to_string());
        args.push(format!("{}={}", env.name, env.value));
    }
    args.push(context.display().to_string());
    Ok(args)
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[async_trait]
impl ImageBuilder for DockerImageBuilder {
    async fn build(&self, name: &str, service: &ServiceConfig, compose_dir: &Path) -> Result<()> {
        let args = build_args(name, service, compose_dir, &process_env)?;
        self.run(name, args, "build").await
    }

    async fn push(&self, name: &str, service: &ServiceConfig) -> Result<()> {
        let args = vec!["push".to_string(), service.image_or(name).to_string()];
        self.run(name, args, "push").await
    }
}
