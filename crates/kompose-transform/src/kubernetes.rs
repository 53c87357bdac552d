//! Kubernetes transformer
//!
//! Maps each service to its controller, exposure and storage objects. The
//! OpenShift transformer holds one of these and calls the per-service steps
//! directly, replacing only the controller, build and route handling.

use async_trait::async_trait;
use kompose_common::{
    BuildMode, ConvertOptions, Error, KomposeObject, LoadedFrom, RestartPolicy, Result, ResultExt,
    ServiceConfig,
};
use tracing::{debug, info, warn};

use crate::builders::{
    create_service, finish_service_objects, init_daemon_set, init_deployment, init_ingress,
    init_pod, init_replication_controller,
};
use crate::collaborators::ImageBuilder;
use crate::k8s::Service;
use crate::object::KubeObject;
use crate::ordering::{dedupe_claims, sort_exposure_first};
use crate::unsupported::{check_unsupported_keys, WarnedKeys};
use crate::Transformer;

/// Converts a service model into Kubernetes objects
pub struct KubernetesTransformer<'a> {
    opt: &'a ConvertOptions,
    image_builder: Option<&'a dyn ImageBuilder>,
}

impl<'a> KubernetesTransformer<'a> {
    /// Create a transformer for one run
    pub fn new(opt: &'a ConvertOptions) -> Self {
        Self {
            opt,
            image_builder: None,
        }
    }

    /// Set the builder used when the run builds images locally
    pub fn with_image_builder(mut self, builder: &'a dyn ImageBuilder) -> Self {
        self.image_builder = Some(builder);
        self
    }

    /// Run options
    pub fn options(&self) -> &'a ConvertOptions {
        self.opt
    }

    /// Build and push the image when the run builds locally, then default the
    /// image to the service name.
    pub async fn prepare_service(&self, name: &str, service: &ServiceConfig) -> Result<ServiceConfig> {
        let mut service = service.clone();
        let has_image = service.image.as_deref().is_some_and(|i| !i.is_empty());

        if self.opt.build == BuildMode::Local && service.has_build() {
            if !has_image {
                return Err(Error::build_for(
                    name,
                    "image key required within build parameters in order to build and push",
                ));
            }
            self.build_and_push(name, &service).await?;
        }

        if !has_image {
            service.image = Some(name.to_string());
        }
        Ok(service)
    }

    async fn build_and_push(&self, name: &str, service: &ServiceConfig) -> Result<()> {
        let builder = self.image_builder.ok_or_else(|| {
            Error::internal_with_context("build", "local builds requested but no image builder is configured")
        })?;
        let compose_dir = self.opt.compose_file_dir()?;

        info!(service = %name, image = %service.image_or(name), "Building image");
        builder
            .build(name, service, &compose_dir)
            .await
            .context("build")?;
        info!(service = %name, image = %service.image_or(name), "Pushing image");
        builder.push(name, service).await.context("push")
    }

    /// Bare pod for run-to-completion services, `None` for long-running ones.
    ///
    /// Errors when a controller kind was explicitly requested, since a pod
    /// cannot honour it.
    pub fn pod_only(&self, name: &str, service: &ServiceConfig) -> Result<Option<KubeObject>> {
        if !service.restart.is_pod_only() {
            return Ok(None);
        }
        if self.opt.controller_forced() {
            let restart = match service.restart {
                RestartPolicy::No => "no",
                _ => "on-failure",
            };
            return Err(Error::validation_for(
                name,
                format!("controller object cannot be specified with restart: '{restart}'"),
            ));
        }
        Ok(Some(KubeObject::Pod(init_pod(name, service))))
    }

    /// Deployment, DaemonSet and ReplicationController objects the run enables
    pub fn controller_objects(&self, name: &str, service: &ServiceConfig) -> Vec<KubeObject> {
        let toggles = &self.opt.controllers;
        let mut objects = Vec::new();
        if toggles.deployment {
            objects.push(KubeObject::Deployment(init_deployment(name, service, self.opt)));
        }
        if toggles.daemon_set {
            objects.push(KubeObject::DaemonSet(init_daemon_set(name, service)));
        }
        if toggles.replication_controller {
            objects.push(KubeObject::ReplicationController(
                init_replication_controller(name, service, self.opt),
            ));
        }
        objects
    }

    /// The service's exposure object and, when it is exposed, the port a
    /// route or ingress should target
    pub fn exposure(&self, name: &str, service: &ServiceConfig) -> (Service, Option<i32>) {
        let svc = create_service(name, service);
        if !service.expose.is_exposed() {
            return (svc, None);
        }
        let port = svc.first_port();
        if port.is_none() {
            warn!(service = %name, "Service is exposed but declares no ports, not creating a public route");
        }
        (svc, port)
    }

    /// Report fields the platform cannot express
    pub fn check_unsupported(
        &self,
        name: &str,
        service: &ServiceConfig,
        loaded_from: LoadedFrom,
        warned: &mut WarnedKeys,
    ) {
        check_unsupported_keys(name, service, self.opt.provider, loaded_from, warned);
    }

    /// Fill pod templates and append storage claims
    pub fn finish(&self, name: &str, service: &ServiceConfig, objects: &mut Vec<KubeObject>) {
        finish_service_objects(name, service, self.opt, objects);
    }

    async fn transform_service(
        &self,
        name: &str,
        service: &ServiceConfig,
        loaded_from: LoadedFrom,
        warned: &mut WarnedKeys,
    ) -> Result<Vec<KubeObject>> {
        let service = self.prepare_service(name, service).await?;

        let mut objects = match self.pod_only(name, &service)? {
            Some(pod) => vec![pod],
            None => {
                let mut objects = self.controller_objects(name, &service);
                let (svc, route_port) = self.exposure(name, &service);
                objects.push(KubeObject::Service(svc));
                if let Some(port) = route_port {
                    objects.push(KubeObject::Ingress(init_ingress(name, &service, port)));
                }
                objects
            }
        };

        self.check_unsupported(name, &service, loaded_from, warned);
        self.finish(name, &service, &mut objects);
        debug!(service = %name, count = objects.len(), "Converted service");
        Ok(objects)
    }
}

#[async_trait]
impl Transformer for KubernetesTransformer<'_> {
    async fn transform(
        &self,
        model: &KomposeObject,
        warned: &mut WarnedKeys,
    ) -> Result<Vec<KubeObject>> {
        let mut all = Vec::new();
        for (name, service) in &model.services {
            let objects = self
                .transform_service(name, service, model.loaded_from, warned)
                .await
                .context("transform")?;
            all.extend(objects);
        }
        Ok(sort_exposure_first(dedupe_claims(all)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MockImageBuilder;
    use crate::object::ObjectKind;
    use kompose_common::{
        ControllerKind, Expose, PortMapping, RestartPolicy, VolumeMount as ModelMount,
    };
    use std::path::PathBuf;

    fn kinds(objects: &[KubeObject]) -> Vec<(ObjectKind, &str)> {
        objects.iter().map(|o| (o.kind(), o.name())).collect()
    }

    fn web() -> ServiceConfig {
        ServiceConfig {
            ports: vec![PortMapping::new(80)],
            ..ServiceConfig::with_image("nginx")
        }
    }

    async fn convert(model: &KomposeObject, opt: &ConvertOptions) -> Result<Vec<KubeObject>> {
        let mut warned = WarnedKeys::new();
        KubernetesTransformer::new(opt)
            .transform(model, &mut warned)
            .await
    }

    /// Story: a single nginx service with one port becomes a Deployment and
    /// an addressed Service, with the Service listed first.
    #[tokio::test]
    async fn story_web_service_with_one_port() {
        let model = KomposeObject::default().with_service("web", web());
        let opt = ConvertOptions::default().resolve_controllers();
        let objects = convert(&model, &opt).await.unwrap();

        assert_eq!(
            kinds(&objects),
            vec![(ObjectKind::Service, "web"), (ObjectKind::Deployment, "web")]
        );
        match (&objects[0], &objects[1]) {
            (KubeObject::Service(svc), KubeObject::Deployment(d)) => {
                assert_eq!(svc.spec.ports.len(), 1);
                assert_eq!(svc.spec.ports[0].name, "80");
                assert_eq!(svc.spec.ports[0].target_port, 80);
                assert_eq!(d.spec.replicas, 1);
                assert_eq!(d.spec.template.spec.containers[0].image, "nginx");
            }
            other => panic!("unexpected objects: {other:?}"),
        }
    }

    /// Story: a run-to-completion worker without ports is a bare pod and
    /// nothing else.
    #[tokio::test]
    async fn story_on_failure_worker_is_a_bare_pod() {
        let worker = ServiceConfig {
            restart: RestartPolicy::OnFailure,
            ..ServiceConfig::with_image("busybox")
        };
        let model = KomposeObject::default().with_service("worker", worker);
        let opt = ConvertOptions::default().resolve_controllers();
        let objects = convert(&model, &opt).await.unwrap();

        assert_eq!(kinds(&objects), vec![(ObjectKind::Pod, "worker")]);
    }

    #[tokio::test]
    async fn test_forced_controller_with_pod_only_restart_fails() {
        let worker = ServiceConfig {
            restart: RestartPolicy::No,
            ..ServiceConfig::with_image("busybox")
        };
        let model = KomposeObject::default().with_service("worker", worker);
        let opt = ConvertOptions {
            forced_controllers: vec![ControllerKind::Deployment],
            ..Default::default()
        }
        .resolve_controllers();

        let err = convert(&model, &opt).await.unwrap_err();
        assert!(err.to_string().starts_with("transform: "));
        assert_eq!(err.service(), Some("worker"));
    }

    #[tokio::test]
    async fn test_service_without_ports_is_headless() {
        let model = KomposeObject::default().with_service("cache", ServiceConfig::with_image("redis"));
        let opt = ConvertOptions::default().resolve_controllers();
        let objects = convert(&model, &opt).await.unwrap();

        match &objects[0] {
            KubeObject::Service(svc) => {
                assert!(svc.is_headless());
                assert!(svc.spec.ports.is_empty());
            }
            other => panic!("Expected Service, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exposed_service_gets_ingress() {
        let svc = ServiceConfig {
            expose: Expose::from("app.example.com"),
            ports: vec![PortMapping {
                host_port: 8080,
                ..PortMapping::new(80)
            }],
            ..ServiceConfig::with_image("nginx")
        };
        let model = KomposeObject::default().with_service("web", svc);
        let opt = ConvertOptions::default().resolve_controllers();
        let objects = convert(&model, &opt).await.unwrap();

        let ingresses: Vec<_> = objects
            .iter()
            .filter_map(|o| match o {
                KubeObject::Ingress(i) => Some(i),
                _ => None,
            })
            .collect();
        assert_eq!(ingresses.len(), 1);
        let rule = &ingresses[0].spec.rules[0];
        assert_eq!(rule.host.as_deref(), Some("app.example.com"));
        assert_eq!(rule.http.paths[0].backend.service.port.number, 8080);
    }

    #[tokio::test]
    async fn test_expose_true_leaves_host_unset() {
        let svc = ServiceConfig {
            expose: Expose::AnyHost,
            ..web()
        };
        let model = KomposeObject::default().with_service("web", svc);
        let opt = ConvertOptions::default().resolve_controllers();
        let objects = convert(&model, &opt).await.unwrap();

        let ingress = objects.iter().find_map(|o| match o {
            KubeObject::Ingress(i) => Some(i),
            _ => None,
        });
        assert_eq!(ingress.unwrap().spec.rules[0].host, None);
    }

    #[tokio::test]
    async fn test_all_enabled_controllers_are_emitted() {
        let model = KomposeObject::default().with_service("web", web());
        let mut opt = ConvertOptions::default();
        opt.controllers.deployment = true;
        opt.controllers.daemon_set = true;
        opt.controllers.replication_controller = true;
        let objects = convert(&model, &opt).await.unwrap();

        assert_eq!(
            kinds(&objects),
            vec![
                (ObjectKind::Service, "web"),
                (ObjectKind::Deployment, "web"),
                (ObjectKind::DaemonSet, "web"),
                (ObjectKind::ReplicationController, "web"),
            ]
        );
    }

    #[tokio::test]
    async fn test_claims_follow_the_workload() {
        let db = ServiceConfig {
            volumes: vec![ModelMount {
                container: "/data".to_string(),
                ..Default::default()
            }],
            ..ServiceConfig::with_image("postgres")
        };
        let model = KomposeObject::default()
            .with_service("db", db)
            .with_service("web", web());
        let opt = ConvertOptions::default().resolve_controllers();
        let objects = convert(&model, &opt).await.unwrap();

        assert_eq!(
            kinds(&objects),
            vec![
                (ObjectKind::Service, "db"),
                (ObjectKind::Service, "web"),
                (ObjectKind::Deployment, "db"),
                (ObjectKind::PersistentVolumeClaim, "db-claim0"),
                (ObjectKind::Deployment, "web"),
            ]
        );
    }

    /// Story: a run-to-completion worker that writes to a volume is a bare
    /// pod plus the claim the pod mounts.
    #[tokio::test]
    async fn story_pod_only_worker_keeps_its_claim() {
        let worker = ServiceConfig {
            restart: RestartPolicy::No,
            volumes: vec![ModelMount {
                container: "/data".to_string(),
                ..Default::default()
            }],
            ..ServiceConfig::with_image("busybox")
        };
        let model = KomposeObject::default().with_service("worker", worker);
        let opt = ConvertOptions::default().resolve_controllers();
        let objects = convert(&model, &opt).await.unwrap();

        assert_eq!(
            kinds(&objects),
            vec![
                (ObjectKind::Pod, "worker"),
                (ObjectKind::PersistentVolumeClaim, "worker-claim0"),
            ]
        );
        match &objects[0] {
            KubeObject::Pod(pod) => {
                let claim = pod.spec.volumes[0].persistent_volume_claim.as_ref().unwrap();
                assert_eq!(claim.claim_name, "worker-claim0");
            }
            other => panic!("Expected Pod, got {other:?}"),
        }
    }

    /// Story: two services mount the same named volume. Both pods reference
    /// one claim, and the claim is emitted once.
    #[tokio::test]
    async fn story_named_volume_shared_by_two_services() {
        let with_cache = |image: &str| ServiceConfig {
            volumes: vec![ModelMount {
                container: "/cache".to_string(),
                volume_name: Some("cache".to_string()),
                ..Default::default()
            }],
            ..ServiceConfig::with_image(image)
        };
        let model = KomposeObject::default()
            .with_service("api", with_cache("api"))
            .with_service("worker", with_cache("worker"));
        let opt = ConvertOptions::default().resolve_controllers();
        let objects = convert(&model, &opt).await.unwrap();

        assert_eq!(
            kinds(&objects),
            vec![
                (ObjectKind::Service, "api"),
                (ObjectKind::Service, "worker"),
                (ObjectKind::Deployment, "api"),
                (ObjectKind::PersistentVolumeClaim, "cache"),
                (ObjectKind::Deployment, "worker"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_image_defaults_to_service_name() {
        let model = KomposeObject::default().with_service("api", ServiceConfig::default());
        let opt = ConvertOptions::default().resolve_controllers();
        let objects = convert(&model, &opt).await.unwrap();
        let deployment = objects.iter().find_map(|o| match o {
            KubeObject::Deployment(d) => Some(d),
            _ => None,
        });
        assert_eq!(deployment.unwrap().spec.template.spec.containers[0].image, "api");
    }

    #[tokio::test]
    async fn test_transform_is_deterministic() {
        let model = KomposeObject::default()
            .with_service("web", web())
            .with_service("db", ServiceConfig::with_image("postgres"));
        let opt = ConvertOptions::default().resolve_controllers();
        let first = serde_json::to_string(&convert(&model, &opt).await.unwrap()).unwrap();
        let second = serde_json::to_string(&convert(&model, &opt).await.unwrap()).unwrap();
        assert_eq!(first, second);
    }

    /// Story: local builds run build then push before conversion, and a push
    /// failure aborts the run without returning objects.
    #[tokio::test]
    async fn story_local_build_then_push() {
        let svc = ServiceConfig {
            build: Some(PathBuf::from("./api")),
            ..ServiceConfig::with_image("registry.example.com/api:1.0")
        };
        let model = KomposeObject::default().with_service("api", svc);
        let opt = ConvertOptions {
            build: BuildMode::Local,
            input_files: vec![PathBuf::from("/srv/app/docker-compose.yml")],
            ..Default::default()
        }
        .resolve_controllers();

        let mut builder = MockImageBuilder::new();
        builder
            .expect_build()
            .withf(|name, _, dir| name == "api" && dir == std::path::Path::new("/srv/app"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        builder.expect_push().times(1).returning(|_, _| Ok(()));

        let mut warned = WarnedKeys::new();
        let objects = KubernetesTransformer::new(&opt)
            .with_image_builder(&builder)
            .transform(&model, &mut warned)
            .await
            .unwrap();
        assert_eq!(objects.len(), 2);

        let mut failing = MockImageBuilder::new();
        failing.expect_build().returning(|_, _, _| Ok(()));
        failing
            .expect_push()
            .returning(|name, _| Err(Error::build_for(name, "denied: requested access to the resource is denied")));
        let err = KubernetesTransformer::new(&opt)
            .with_image_builder(&failing)
            .transform(&model, &mut warned)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("transform: push: build error for api"));
    }

    #[tokio::test]
    async fn test_local_build_requires_image_name() {
        let svc = ServiceConfig {
            build: Some(PathBuf::from(".")),
            ..Default::default()
        };
        let model = KomposeObject::default().with_service("api", svc);
        let opt = ConvertOptions {
            build: BuildMode::Local,
            ..Default::default()
        }
        .resolve_controllers();

        let builder = MockImageBuilder::new();
        let mut warned = WarnedKeys::new();
        let err = KubernetesTransformer::new(&opt)
            .with_image_builder(&builder)
            .transform(&model, &mut warned)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("image key required"));
    }
}
