//! Object builders shared by both platforms
//!
//! Every function here is pure: a service definition plus run options in,
//! one object (or one piece of a pod template) out.

use std::collections::BTreeSet;

use kompose_common::model::generated_volume_name;
use kompose_common::{ConvertOptions, ServiceConfig};
use tracing::warn;

use crate::k8s::{
    Capabilities, Container, ContainerPort, DaemonSet, Deployment, EnvVar, Ingress,
    PersistentVolumeClaim, Pod, PodSpec, PodTemplateSpec, ReplicationController,
    ResourceRequirements, SecurityContext, Service, ServicePort, Volume, VolumeMount,
};
use crate::object::KubeObject;

/// Replica count for a controller.
///
/// The service's own count wins unless it is unset or the run forces the
/// default.
pub fn replica_count(service: &ServiceConfig, opt: &ConvertOptions) -> i32 {
    let replicas = if opt.force_replicas || service.replicas == 0 {
        opt.replicas
    } else {
        service.replicas
    };
    i32::try_from(replicas).unwrap_or(i32::MAX)
}

/// Pod template running the service image
pub fn pod_template(name: &str, service: &ServiceConfig) -> PodTemplateSpec {
    PodTemplateSpec::for_service(name, service.image_or(name))
}

/// Bare pod for run-to-completion services
pub fn init_pod(name: &str, service: &ServiceConfig) -> Pod {
    Pod::new(name, PodSpec::single(name, service.image_or(name)))
}

/// Deployment with the resolved replica count
pub fn init_deployment(name: &str, service: &ServiceConfig, opt: &ConvertOptions) -> Deployment {
    Deployment::new(name, replica_count(service, opt), pod_template(name, service))
}

/// DaemonSet; replicas do not apply
pub fn init_daemon_set(name: &str, service: &ServiceConfig) -> DaemonSet {
    DaemonSet::new(name, pod_template(name, service))
}

/// ReplicationController with the resolved replica count
pub fn init_replication_controller(
    name: &str,
    service: &ServiceConfig,
    opt: &ConvertOptions,
) -> ReplicationController {
    ReplicationController::new(name, replica_count(service, opt), pod_template(name, service))
}

/// Service ports, one per declared mapping, named by the published port
pub fn service_ports(service: &ServiceConfig) -> Vec<ServicePort> {
    service
        .ports
        .iter()
        .map(|p| {
            let port = p.resolved_host_port();
            ServicePort {
                name: port.to_string(),
                protocol: p.protocol.explicit(),
                port,
                target_port: p.container_port,
            }
        })
        .collect()
}

/// Exposure object for a service: addressed when it declares ports,
/// headless otherwise
pub fn create_service(name: &str, service: &ServiceConfig) -> Service {
    let mut svc = Service::new(name);
    svc.metadata.annotations = service.annotations.clone();
    if service.has_ports() {
        svc.spec.ports = service_ports(service);
    } else {
        svc.spec.cluster_ip = Some("None".to_string());
    }
    svc
}

/// Ingress for an exposed service, routed to `port`
pub fn init_ingress(name: &str, service: &ServiceConfig, port: i32) -> Ingress {
    Ingress::new(name, service.expose.host().map(str::to_string), port)
}

/// Container ports; TCP is left implicit
pub fn container_ports(service: &ServiceConfig) -> Vec<ContainerPort> {
    service
        .ports
        .iter()
        .map(|p| ContainerPort {
            container_port: p.container_port,
            protocol: p.protocol.explicit(),
            host_ip: p.host_ip.clone().filter(|ip| !ip.is_empty()),
        })
        .collect()
}

/// Environment sorted by name; equal names keep declaration order
pub fn container_env(service: &ServiceConfig) -> Vec<EnvVar> {
    let mut env: Vec<EnvVar> = service
        .environment
        .iter()
        .map(|e| EnvVar {
            name: e.name.clone(),
            value: e.value.clone(),
        })
        .collect();
    env.sort_by(|a, b| a.name.cmp(&b.name));
    env
}

/// Security context, or `None` when the service asks for nothing
pub fn security_context(name: &str, service: &ServiceConfig) -> Option<SecurityContext> {
    let mut ctx = SecurityContext::default();
    if service.privileged {
        ctx.privileged = Some(true);
    }
    if let Some(user) = service.user.as_deref().filter(|u| !u.is_empty()) {
        match user.parse::<i64>() {
            Ok(uid) => ctx.run_as_user = Some(uid),
            Err(_) => warn!(service = %name, user = %user, "Ignoring user: only numeric UIDs are supported"),
        }
    }
    if !service.cap_add.is_empty() || !service.cap_drop.is_empty() {
        ctx.capabilities = Some(Capabilities {
            add: service.cap_add.clone(),
            drop: service.cap_drop.clone(),
        });
    }
    (!ctx.is_empty()).then_some(ctx)
}

/// Memory limit, when declared
pub fn resource_limits(service: &ServiceConfig) -> Option<ResourceRequirements> {
    let bytes = service.mem_limit.filter(|b| *b > 0)?;
    let mut resources = ResourceRequirements::default();
    resources
        .limits
        .insert("memory".to_string(), bytes.to_string());
    Some(resources)
}

/// Memory-backed volumes for tmpfs paths, named `<service>-tmpfs<i>`
pub fn tmpfs_volumes(name: &str, service: &ServiceConfig) -> (Vec<VolumeMount>, Vec<Volume>) {
    service
        .tmpfs
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let volume_name = format!("{name}-tmpfs{i}");
            // "/run:size=64m" mounts /run; tmpfs options have no equivalent
            let mount_path = path.split(':').next().unwrap_or(path.as_str());
            (
                VolumeMount {
                    name: volume_name.clone(),
                    mount_path: mount_path.to_string(),
                    read_only: false,
                },
                Volume::from_empty_dir(volume_name, Some("Memory".to_string())),
            )
        })
        .unzip()
}

/// Volumes, mounts and claims derived from a service's volume list
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfiguredVolumes {
    /// Container mounts
    pub mounts: Vec<VolumeMount>,
    /// Pod volumes
    pub volumes: Vec<Volume>,
    /// Claims to create alongside the service
    pub claims: Vec<PersistentVolumeClaim>,
}

/// Resolve the service's volume mounts.
///
/// Unnamed mounts get `<service>-claim<n>` (`<service>-empty<n>` with empty
/// volumes), `n` counting unnamed mounts from 0. In empty-volume mode every
/// mount is an emptyDir and no claim is created; otherwise each mount gets a
/// claim unless it reuses another service's claim.
pub fn configure_volumes(name: &str, service: &ServiceConfig, empty_volumes: bool) -> ConfiguredVolumes {
    let mut out = ConfiguredVolumes::default();
    let mut seen = BTreeSet::new();
    let mut generated = 0;

    for vol in &service.volumes {
        if let Some(host) = vol.host.as_deref() {
            warn!(
                service = %name,
                host = %host,
                "Volume mount on the host isn't supported - ignoring path on the host"
            );
        }

        let shared = vol.claim.is_some();
        let volume_name = match (vol.claim.as_deref(), vol.volume_name.as_deref()) {
            (Some(claim), _) => claim.to_string(),
            (None, Some(named)) if !named.is_empty() => named.replace('_', "-"),
            _ => {
                let generated_name = generated_volume_name(name, generated, empty_volumes);
                generated += 1;
                generated_name
            }
        };
        let read_only = vol.mode.is_read_only();

        out.mounts.push(VolumeMount {
            name: volume_name.clone(),
            mount_path: vol.container.clone(),
            read_only,
        });

        // Two mounts of one named volume share a single pod volume
        if !seen.insert(volume_name.clone()) {
            continue;
        }

        if empty_volumes {
            out.volumes.push(Volume::from_empty_dir(volume_name, None));
            continue;
        }
        out.volumes.push(Volume::from_claim(volume_name.clone(), read_only));
        if !shared {
            out.claims.push(PersistentVolumeClaim::new(&volume_name, read_only));
        }
    }
    out
}

/// Everything written into a workload's pod template for one service
#[derive(Clone, Debug, PartialEq)]
pub struct PodFill {
    container_name: String,
    env: Vec<EnvVar>,
    ports: Vec<ContainerPort>,
    mounts: Vec<VolumeMount>,
    volumes: Vec<Volume>,
    resources: Option<ResourceRequirements>,
    security_context: Option<SecurityContext>,
    restart_policy: &'static str,
}

impl PodFill {
    /// Compute the pod template contents for a service.
    ///
    /// `volumes` is the output of [`configure_volumes`]; its claims are left
    /// for the caller to emit.
    pub fn new(name: &str, service: &ServiceConfig, volumes: &ConfiguredVolumes) -> Self {
        let (tmpfs_mounts, tmpfs_vols) = tmpfs_volumes(name, service);
        let mut mounts = volumes.mounts.clone();
        mounts.extend(tmpfs_mounts);
        let mut pod_volumes = volumes.volumes.clone();
        pod_volumes.extend(tmpfs_vols);

        Self {
            container_name: container_name(name, service),
            env: container_env(service),
            ports: container_ports(service),
            mounts,
            volumes: pod_volumes,
            resources: resource_limits(service),
            security_context: security_context(name, service),
            restart_policy: service.restart.pod_restart_policy(),
        }
    }

    /// Write into a pod spec whose first container runs the service
    pub fn apply(&self, spec: &mut PodSpec, service: &ServiceConfig) {
        if let Some(container) = spec.containers.first_mut() {
            self.apply_container(container, service);
        }
        spec.volumes = self.volumes.clone();
        spec.restart_policy = Some(self.restart_policy.to_string());
    }

    fn apply_container(&self, container: &mut Container, service: &ServiceConfig) {
        container.name = self.container_name.clone();
        container.env = self.env.clone();
        container.ports = self.ports.clone();
        container.volume_mounts = self.mounts.clone();
        container.command = service.command.clone();
        container.args = service.args.clone();
        container.working_dir = service.working_dir.clone().filter(|d| !d.is_empty());
        container.stdin = service.stdin_open;
        container.tty = service.tty;
        container.resources = self.resources.clone();
        container.security_context = self.security_context.clone();
    }
}

/// Container name: the explicit override, else the service name
pub fn container_name(name: &str, service: &ServiceConfig) -> String {
    service
        .container_name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| name.to_string())
}

/// Fill pod templates, annotations and rollout strategy of a service's
/// objects, then append the storage claims its volumes need.
pub fn finish_service_objects(
    name: &str,
    service: &ServiceConfig,
    opt: &ConvertOptions,
    objects: &mut Vec<KubeObject>,
) {
    let volumes = configure_volumes(name, service, opt.empty_volumes);
    let fill = PodFill::new(name, service, &volumes);

    for obj in objects.iter_mut() {
        if let Some(spec) = obj.pod_spec_mut() {
            fill.apply(spec, service);
        }
        if obj.carries_annotations() {
            obj.metadata_mut().annotations = service.annotations.clone();
        }
        if !service.volumes.is_empty() {
            obj.set_recreate_strategy();
        }
    }

    objects.extend(volumes.claims.into_iter().map(KubeObject::PersistentVolumeClaim));
}

#[cfg(test)]
mod tests {
    use super::*;
    use kompose_common::{
        EnvVar as ModelEnv, PortMapping, Protocol, RestartPolicy, VolumeMode, VolumeMount as ModelMount,
    };

    fn mount(container: &str) -> ModelMount {
        ModelMount {
            container: container.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_replica_count_rules() {
        let opt = ConvertOptions {
            replicas: 3,
            ..Default::default()
        };
        let mut svc = ServiceConfig::default();
        assert_eq!(replica_count(&svc, &opt), 3);

        svc.replicas = 5;
        assert_eq!(replica_count(&svc, &opt), 5);

        let forced = ConvertOptions {
            force_replicas: true,
            ..opt
        };
        assert_eq!(replica_count(&svc, &forced), 3);
    }

    #[test]
    fn test_addressed_service_ports() {
        let svc = ServiceConfig {
            ports: vec![
                PortMapping::new(80),
                PortMapping {
                    host_port: 5353,
                    protocol: Protocol::Udp,
                    ..PortMapping::new(53)
                },
            ],
            ..ServiceConfig::with_image("nginx")
        };
        let service = create_service("web", &svc);
        assert!(!service.is_headless());
        assert_eq!(service.spec.ports.len(), 2);
        assert_eq!(service.spec.ports[0].name, "80");
        assert_eq!(service.spec.ports[0].target_port, 80);
        assert_eq!(service.spec.ports[0].protocol, None);
        assert_eq!(service.spec.ports[1].name, "5353");
        assert_eq!(service.spec.ports[1].port, 5353);
        assert_eq!(service.spec.ports[1].target_port, 53);
        assert_eq!(service.spec.ports[1].protocol.as_deref(), Some("UDP"));
    }

    #[test]
    fn test_service_without_ports_is_headless() {
        let service = create_service("worker", &ServiceConfig::default());
        assert!(service.is_headless());
        assert!(service.spec.ports.is_empty());
        assert_eq!(service.first_port(), None);
    }

    #[test]
    fn test_env_sort_is_stable() {
        let svc = ServiceConfig {
            environment: vec![
                ModelEnv::new("B", "1"),
                ModelEnv::new("A", "first"),
                ModelEnv::new("A", "second"),
            ],
            ..Default::default()
        };
        let env = container_env(&svc);
        let pairs: Vec<(&str, &str)> = env.iter().map(|e| (e.name.as_str(), e.value.as_str())).collect();
        assert_eq!(pairs, vec![("A", "first"), ("A", "second"), ("B", "1")]);
    }

    #[test]
    fn test_security_context_omitted_when_empty() {
        assert!(security_context("web", &ServiceConfig::default()).is_none());

        let svc = ServiceConfig {
            user: Some("www-data".to_string()),
            ..Default::default()
        };
        assert!(security_context("web", &svc).is_none());

        let svc = ServiceConfig {
            user: Some("1000".to_string()),
            cap_add: vec!["NET_ADMIN".to_string()],
            ..Default::default()
        };
        let ctx = security_context("web", &svc).unwrap();
        assert_eq!(ctx.run_as_user, Some(1000));
        assert_eq!(ctx.capabilities.unwrap().add, vec!["NET_ADMIN"]);
        assert_eq!(ctx.privileged, None);
    }

    #[test]
    fn test_volumes_create_claims() {
        let svc = ServiceConfig {
            volumes: vec![
                mount("/data"),
                ModelMount {
                    mode: VolumeMode::ReadOnly,
                    ..mount("/config")
                },
                ModelMount {
                    volume_name: Some("shared_cache".to_string()),
                    ..mount("/cache")
                },
            ],
            ..Default::default()
        };
        let out = configure_volumes("db", &svc, false);
        let names: Vec<&str> = out.mounts.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["db-claim0", "db-claim1", "shared-cache"]);
        assert!(out.mounts[1].read_only);
        assert_eq!(out.claims.len(), 3);
        assert_eq!(out.claims[1].spec.access_modes, vec!["ReadOnlyMany"]);
        assert_eq!(out.claims[0].spec.access_modes, vec!["ReadWriteOnce"]);
    }

    #[test]
    fn test_empty_volumes_skip_claims() {
        let svc = ServiceConfig {
            volumes: vec![mount("/data"), mount("/logs")],
            ..Default::default()
        };
        let out = configure_volumes("db", &svc, true);
        assert!(out.claims.is_empty());
        assert_eq!(out.volumes[0].name, "db-empty0");
        assert!(out.volumes[0].empty_dir.is_some());
        assert_eq!(out.volumes[1].name, "db-empty1");
    }

    #[test]
    fn test_volumes_from_reuses_claim() {
        let svc = ServiceConfig {
            volumes: vec![ModelMount {
                claim: Some("db-claim0".to_string()),
                ..mount("/data")
            }],
            ..Default::default()
        };
        let out = configure_volumes("backup", &svc, false);
        assert!(out.claims.is_empty());
        assert_eq!(
            out.volumes[0]
                .persistent_volume_claim
                .as_ref()
                .map(|c| c.claim_name.as_str()),
            Some("db-claim0")
        );
    }

    #[test]
    fn test_host_path_mount_still_gets_a_volume() {
        let svc = ServiceConfig {
            volumes: vec![ModelMount {
                host: Some("./data".to_string()),
                ..mount("/var/lib/data")
            }],
            ..Default::default()
        };
        let out = configure_volumes("db", &svc, false);
        assert_eq!(out.mounts[0].name, "db-claim0");
        assert_eq!(out.claims.len(), 1);
    }

    #[test]
    fn test_tmpfs_is_memory_backed() {
        let svc = ServiceConfig {
            tmpfs: vec!["/run".to_string(), "/tmp:size=64m".to_string()],
            ..Default::default()
        };
        let (mounts, volumes) = tmpfs_volumes("web", &svc);
        assert_eq!(mounts[1].name, "web-tmpfs1");
        assert_eq!(mounts[1].mount_path, "/tmp");
        assert_eq!(
            volumes[0].empty_dir.as_ref().and_then(|e| e.medium.as_deref()),
            Some("Memory")
        );
    }

    /// Story: a service with volumes, a custom container name and a memory
    /// limit ends up with a fully populated pod template, a Recreate rollout,
    /// and its claims appended after the workload.
    #[test]
    fn story_finishing_a_deployment() {
        let svc = ServiceConfig {
            container_name: Some("db-main".to_string()),
            restart: RestartPolicy::Always,
            volumes: vec![mount("/var/lib/postgresql/data")],
            environment: vec![ModelEnv::new("POSTGRES_DB", "app")],
            mem_limit: Some(536_870_912),
            stdin_open: true,
            annotations: [("team".to_string(), "data".to_string())].into(),
            ..ServiceConfig::with_image("postgres:16")
        };
        let opt = ConvertOptions::default();
        let mut objects = vec![KubeObject::Deployment(init_deployment("db", &svc, &opt))];
        finish_service_objects("db", &svc, &opt, &mut objects);

        assert_eq!(objects.len(), 2);
        let deployment = match &objects[0] {
            KubeObject::Deployment(d) => d,
            other => panic!("Expected Deployment, got {other:?}"),
        };
        assert_eq!(deployment.metadata.annotations["team"], "data");
        assert_eq!(deployment.spec.strategy.as_ref().map(|s| s.type_.as_str()), Some("Recreate"));

        let pod = &deployment.spec.template.spec;
        assert_eq!(pod.restart_policy.as_deref(), Some("Always"));
        let container = &pod.containers[0];
        assert_eq!(container.name, "db-main");
        assert_eq!(container.image, "postgres:16");
        assert!(container.stdin);
        assert_eq!(container.env[0].name, "POSTGRES_DB");
        assert_eq!(container.volume_mounts[0].name, "db-claim0");
        assert_eq!(
            container.resources.as_ref().map(|r| r.limits["memory"].as_str()),
            Some("536870912")
        );

        match &objects[1] {
            KubeObject::PersistentVolumeClaim(pvc) => assert_eq!(pvc.metadata.name, "db-claim0"),
            other => panic!("Expected PersistentVolumeClaim, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_pod_restart_policy() {
        let svc = ServiceConfig {
            restart: RestartPolicy::No,
            ..ServiceConfig::with_image("busybox")
        };
        let mut objects = vec![KubeObject::Pod(init_pod("job", &svc))];
        finish_service_objects("job", &svc, &ConvertOptions::default(), &mut objects);
        match &objects[0] {
            KubeObject::Pod(p) => assert_eq!(p.spec.restart_policy.as_deref(), Some("Never")),
            other => panic!("Expected Pod, got {other:?}"),
        }
    }
}
