//! OpenShift transformer
//!
//! Reuses the Kubernetes per-service steps and adds DeploymentConfigs,
//! ImageStreams, in-cluster BuildConfigs and Routes.

pub mod resources;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use kompose_common::{
    BuildMode, ConvertOptions, Error, KomposeObject, LoadedFrom, Result, ResultExt, ServiceConfig,
};
use tracing::{debug, info, warn};

use crate::builders::{container_name, pod_template, replica_count};
use crate::collaborators::{GitInfo, ImageBuilder};
use crate::k8s::EnvVar;
use crate::kubernetes::KubernetesTransformer;
use crate::object::KubeObject;
use crate::ordering::{dedupe_claims, sort_exposure_first};
use crate::unsupported::WarnedKeys;
use crate::Transformer;

pub use resources::{
    BuildConfig, DeploymentConfig, DeploymentTriggerPolicy, DockerBuildStrategy, ImageStream,
    ObjectReference, Route, TagImportPolicy, TagReference,
};

/// Tag of an image reference, `latest` when none is given.
///
/// A registry port (`host:5000/repo/app`) is not a tag.
pub fn get_image_tag(image: &str) -> &str {
    let image_and_tag = image.rsplit('/').next().unwrap_or(image);
    let mut parts = image_and_tag.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(tag), None) => tag,
        _ => "latest",
    }
}

/// Build arguments as BuildConfig environment.
///
/// Inherited arguments take the value of the same-named variable from
/// `lookup` (empty when unset). The result is sorted by name, equal names
/// keeping declaration order.
pub fn build_args_env(
    service: &ServiceConfig,
    lookup: &(dyn Fn(&str) -> Option<String> + Send + Sync),
) -> Vec<EnvVar> {
    let mut env: Vec<EnvVar> = service
        .build_args
        .iter()
        .map(|arg| EnvVar {
            name: arg.name.clone(),
            value: match &arg.value {
                Some(value) => value.clone(),
                None => lookup(&arg.name).unwrap_or_default(),
            },
        })
        .collect();
    env.sort_by(|a, b| a.name.cmp(&b.name));
    env
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Repository and branch BuildConfigs build from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitSource {
    /// Repository URL
    pub repo: String,
    /// Branch
    pub branch: String,
}

/// Converts a service model into OpenShift objects
pub struct OpenShiftTransformer<'a> {
    kubernetes: KubernetesTransformer<'a>,
    git: Option<&'a dyn GitInfo>,
    env: &'a (dyn Fn(&str) -> Option<String> + Send + Sync),
}

impl<'a> OpenShiftTransformer<'a> {
    /// Create a transformer for one run
    pub fn new(opt: &'a ConvertOptions) -> Self {
        Self {
            kubernetes: KubernetesTransformer::new(opt),
            git: None,
            env: &process_env,
        }
    }

    /// Set the builder used when the run builds images locally
    pub fn with_image_builder(mut self, builder: &'a dyn ImageBuilder) -> Self {
        self.kubernetes = self.kubernetes.with_image_builder(builder);
        self
    }

    /// Set the git metadata source for BuildConfigs
    pub fn with_git(mut self, git: &'a dyn GitInfo) -> Self {
        self.git = Some(git);
        self
    }

    /// Replace the process environment used to resolve inherited build args
    pub fn with_env(mut self, env: &'a (dyn Fn(&str) -> Option<String> + Send + Sync)) -> Self {
        self.env = env;
        self
    }

    fn opt(&self) -> &'a ConvertOptions {
        self.kubernetes.options()
    }

    /// DeploymentConfig redeploying on config change and when the image
    /// stream tag `name:tag` moves. The container image is left blank for
    /// the image trigger to fill.
    pub fn init_deployment_config(&self, name: &str, service: &ServiceConfig) -> DeploymentConfig {
        let tag = get_image_tag(service.image_or(name));
        let mut template = pod_template(name, service);
        if let Some(container) = template.spec.containers.first_mut() {
            container.image = " ".to_string();
        }
        let triggers = vec![
            DeploymentTriggerPolicy::config_change(),
            DeploymentTriggerPolicy::image_change(
                &container_name(name, service),
                ObjectReference::image_stream_tag(name, tag),
            ),
        ];
        DeploymentConfig::new(name, replica_count(service, self.opt()), template, triggers)
    }

    /// ImageStream tracking the service image.
    ///
    /// When the image is built in-cluster the stream starts without tags and
    /// the BuildConfig pushes into it.
    pub fn init_image_stream(&self, name: &str, service: &ServiceConfig) -> ImageStream {
        let opt = self.opt();
        if opt.build == BuildMode::BuildConfig && service.has_build() {
            return ImageStream::new(name, Vec::new());
        }
        let image = service.image_or(name);
        let tag = TagReference {
            name: get_image_tag(image).to_string(),
            from: Some(ObjectReference {
                kind: "DockerImage".to_string(),
                name: image.to_string(),
            }),
            import_policy: opt
                .insecure_repository
                .then(|| TagImportPolicy { insecure: true }),
        };
        ImageStream::new(name, vec![tag])
    }

    /// Docker BuildConfig for a service with a build context
    pub fn init_build_config(
        &self,
        name: &str,
        service: &ServiceConfig,
        source: &GitSource,
        context_dir: String,
    ) -> BuildConfig {
        let strategy = DockerBuildStrategy {
            dockerfile_path: service.dockerfile.clone().filter(|d| !d.is_empty()),
            env: build_args_env(service, self.env),
        };
        BuildConfig::new(
            name,
            &source.repo,
            &source.branch,
            context_dir,
            strategy,
            get_image_tag(service.image_or(name)),
        )
    }

    /// Route to `port` of the service
    pub fn init_route(&self, name: &str, service: &ServiceConfig, port: i32) -> Route {
        Route::new(name, service.expose.host().map(str::to_string), port)
    }

    fn git(&self) -> Result<&'a dyn GitInfo> {
        self.git.ok_or_else(|| {
            Error::internal_with_context("buildconfig", "build-config builds requested but no git source is configured")
        })
    }

    /// Resolve repository and branch once per run; explicit options win over
    /// what the checkout around `compose_dir` reports.
    fn git_source(&self, name: &str, compose_dir: &Path) -> Result<GitSource> {
        let opt = self.opt();
        let repo = opt.build_repo.clone().filter(|r| !r.is_empty());
        let branch = opt.build_branch.clone().filter(|b| !b.is_empty());
        if let (Some(repo), Some(branch)) = (&repo, &branch) {
            return Ok(GitSource {
                repo: repo.clone(),
                branch: branch.clone(),
            });
        }

        let git = self.git()?;
        if !git.is_available() {
            return Err(Error::validation_for(
                name,
                "Git is not installed! Please install Git to create buildconfig, else supply \
                 source repository and branch to use for build using '--build-repo', \
                 '--build-branch' options respectively",
            ));
        }

        let branch = match branch {
            Some(branch) => branch,
            None => git
                .branch(compose_dir)
                .context("buildconfig cannot be created because current git branch couldn't be detected")?,
        };
        let repo = match repo {
            Some(repo) => repo,
            None => git
                .remote_url(compose_dir)
                .context("buildconfig cannot be created because git remote origin repo couldn't be detected")?,
        };
        Ok(GitSource { repo, branch })
    }

    /// BuildConfig for a service, or `None` when the compose directory cannot
    /// be found. The git source is detected on first use and reused after.
    fn build_config(
        &self,
        name: &str,
        service: &ServiceConfig,
        source: &mut Option<GitSource>,
    ) -> Result<Option<BuildConfig>> {
        let compose_dir = match self.opt().compose_file_dir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(service = %name, error = %e, "Error in detecting compose file's directory, skipping buildconfig");
                return Ok(None);
            }
        };

        let git_source = match source {
            Some(s) => s.clone(),
            None => {
                let detected = self.git_source(name, &compose_dir)?;
                *source = Some(detected.clone());
                detected
            }
        };

        let context = service.build.clone().unwrap_or_default();
        let context: PathBuf = if context.is_absolute() {
            context
        } else {
            compose_dir.join(context)
        };
        let context_dir = self
            .git()?
            .prefix(&context)
            .context("buildconfig cannot be created due to error in creating build context")?;

        info!(
            service = %name,
            "Buildconfig using {}::{} as source.", git_source.repo, git_source.branch
        );
        Ok(Some(self.init_build_config(name, service, &git_source, context_dir)))
    }

    fn controller_objects(
        &self,
        name: &str,
        service: &ServiceConfig,
        source: &mut Option<GitSource>,
    ) -> Result<Vec<KubeObject>> {
        let opt = self.opt();
        let mut objects = self.kubernetes.controller_objects(name, service);

        if opt.controllers.deployment_config {
            objects.push(KubeObject::DeploymentConfig(self.init_deployment_config(name, service)));
            // Creating the stream after the DeploymentConfig triggers the first rollout
            objects.push(KubeObject::ImageStream(self.init_image_stream(name, service)));
        }

        // BuildConfig goes after the ImageStream, builds into a missing stream fail
        if opt.build == BuildMode::BuildConfig && service.has_build() {
            if let Some(bc) = self.build_config(name, service, source)? {
                objects.push(KubeObject::BuildConfig(bc));
            }
        }

        let (svc, route_port) = self.kubernetes.exposure(name, service);
        objects.push(KubeObject::Service(svc));
        if let Some(port) = route_port {
            objects.push(KubeObject::Route(self.init_route(name, service, port)));
        }
        Ok(objects)
    }

    async fn transform_service(
        &self,
        name: &str,
        service: &ServiceConfig,
        loaded_from: LoadedFrom,
        warned: &mut WarnedKeys,
        source: &mut Option<GitSource>,
    ) -> Result<Vec<KubeObject>> {
        let service = self.kubernetes.prepare_service(name, service).await?;

        let mut objects = match self.kubernetes.pod_only(name, &service)? {
            Some(pod) => vec![pod],
            None => self.controller_objects(name, &service, source)?,
        };

        self.kubernetes.check_unsupported(name, &service, loaded_from, warned);
        self.kubernetes.finish(name, &service, &mut objects);
        debug!(service = %name, count = objects.len(), "Converted service");
        Ok(objects)
    }
}

#[async_trait]
impl Transformer for OpenShiftTransformer<'_> {
    async fn transform(
        &self,
        model: &KomposeObject,
        warned: &mut WarnedKeys,
    ) -> Result<Vec<KubeObject>> {
        let mut all = Vec::new();
        let mut source = None;
        for (name, service) in &model.services {
            let objects = self
                .transform_service(name, service, model.loaded_from, warned, &mut source)
                .await
                .context("transform")?;
            all.extend(objects);
        }
        Ok(sort_exposure_first(dedupe_claims(all)))
    }
}
