//! docker-compose loader
//!
//! Files are parsed as untyped YAML, merged in order, interpolated, and only
//! then deserialized per service. Compose allows most keys in several shapes
//! (string or list, list or map, short or long syntax); the `Raw*` types
//! accept all of them and the conversion functions normalize into the
//! service model.

use std::collections::BTreeMap;
use std::path::PathBuf;

use kompose_common::model::{
    generated_volume_name, BuildArg, EnvVar, Expose, KomposeObject, LoadedFrom, PortMapping,
    Protocol, RestartPolicy, ServiceConfig, VolumeMode, VolumeMount,
};
use kompose_common::EXPOSE_LABEL;
use serde::Deserialize;
use serde_yaml::Value;
use tracing::{debug, warn};

use super::{interpolate_value, merge_values};
use crate::{Error, Result};

// =============================================================================
// Raw compose shapes
// =============================================================================

/// A YAML scalar compose accepts where it means a string
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::String(s) => s,
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    String(String),
    List(Vec<String>),
}

impl StringOrList {
    /// A bare string is one item
    fn into_items(self) -> Vec<String> {
        match self {
            StringOrList::String(s) => vec![s],
            StringOrList::List(items) => items,
        }
    }

    /// A bare string is split on whitespace, like a shell would for simple
    /// commands
    fn into_words(self) -> Vec<String> {
        match self {
            StringOrList::String(s) => s.split_whitespace().map(str::to_string).collect(),
            StringOrList::List(items) => items,
        }
    }
}

/// `KEY=VALUE` list or `KEY: VALUE` map. A missing value is `None`.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum KeyValues {
    List(Vec<String>),
    Map(BTreeMap<String, Option<Scalar>>),
}

impl KeyValues {
    fn into_pairs(self) -> Vec<(String, Option<String>)> {
        match self {
            KeyValues::List(items) => items
                .into_iter()
                .map(|item| match item.split_once('=') {
                    Some((k, v)) => (k.to_string(), Some(v.to_string())),
                    None => (item, None),
                })
                .collect(),
            KeyValues::Map(map) => map
                .into_iter()
                .map(|(k, v)| (k, v.map(Scalar::into_string)))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(i64),
    Short(String),
    Long(LongPort),
}

#[derive(Clone, Debug, Deserialize)]
struct LongPort {
    target: i32,
    #[serde(default)]
    published: Option<Scalar>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    host_ip: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum RawVolume {
    Short(String),
    Long(LongVolume),
}

#[derive(Clone, Debug, Deserialize)]
struct LongVolume {
    #[serde(rename = "type", default)]
    type_: Option<String>,
    #[serde(default)]
    source: Option<String>,
    target: String,
    #[serde(default)]
    read_only: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum RawBuild {
    Context(String),
    Full(FullBuild),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct FullBuild {
    context: Option<String>,
    dockerfile: Option<String>,
    args: Option<KeyValues>,
}

/// Networks as a list of names or a map keyed by name
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum RawNetworks {
    List(Vec<String>),
    Map(BTreeMap<String, Option<Value>>),
}

impl RawNetworks {
    fn into_names(self) -> Vec<String> {
        match self {
            RawNetworks::List(names) => names,
            RawNetworks::Map(map) => map.into_keys().collect(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct RawDeploy {
    replicas: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct RawService {
    image: Option<String>,
    container_name: Option<String>,
    restart: Option<String>,
    ports: Vec<RawPort>,
    volumes: Vec<RawVolume>,
    volumes_from: Vec<String>,
    environment: Option<KeyValues>,
    cap_add: Vec<String>,
    cap_drop: Vec<String>,
    tmpfs: Option<StringOrList>,
    build: Option<RawBuild>,
    labels: Option<KeyValues>,
    deploy: Option<RawDeploy>,
    command: Option<StringOrList>,
    entrypoint: Option<StringOrList>,
    working_dir: Option<String>,
    privileged: bool,
    user: Option<Scalar>,
    stdin_open: bool,
    tty: bool,
    mem_limit: Option<Scalar>,

    cgroup_parent: Option<String>,
    cpuset: Option<String>,
    cpu_shares: Option<i64>,
    devices: Vec<String>,
    dns: Option<StringOrList>,
    dns_search: Option<StringOrList>,
    networks: Option<RawNetworks>,
    security_opt: Vec<String>,
    domainname: Option<String>,
    mac_address: Option<String>,
}

// =============================================================================
// Loading
// =============================================================================

/// Load and merge compose documents, given as `(path, contents)` pairs in
/// override order.
pub fn load(
    documents: &[(PathBuf, String)],
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<KomposeObject> {
    let Some((primary, _)) = documents.first() else {
        return Err(Error::validation("no compose file given"));
    };

    let mut merged = Value::Null;
    for (path, contents) in documents {
        let doc: Value = serde_yaml::from_str(contents)
            .map_err(|e| Error::compose(path, format!("invalid YAML: {e}")))?;
        let services = services_of(doc).map_err(|message| Error::compose(path, message))?;
        if merged.is_null() {
            merged = services;
        } else {
            merge_values(&mut merged, services);
        }
    }
    interpolate_value(&mut merged, lookup).map_err(|message| Error::compose(primary, message))?;

    let raw: BTreeMap<String, RawService> = serde_yaml::from_value(merged)
        .map_err(|e| Error::compose(primary, format!("invalid service definition: {e}")))?;

    let mut object = KomposeObject::new(LoadedFrom::Compose);
    let mut volumes_from = BTreeMap::new();
    for (name, mut service) in raw {
        let from = std::mem::take(&mut service.volumes_from);
        let config = convert_service(&name, service, lookup)
            .map_err(|message| Error::compose(primary, format!("service {name}: {message}")))?;
        if !from.is_empty() {
            volumes_from.insert(name.clone(), from);
        }
        object.services.insert(name, config);
    }
    resolve_volumes_from(&mut object, volumes_from)
        .map_err(|message| Error::compose(primary, message))?;

    debug!(services = object.services.len(), "Loaded compose application");
    Ok(object)
}

/// The services mapping of a document. Version 1 files have services at the
/// top level.
fn services_of(doc: Value) -> std::result::Result<Value, String> {
    let Value::Mapping(mut top) = doc else {
        return Err("top level must be a mapping".to_string());
    };
    match top.remove("services") {
        Some(Value::Null) => Ok(Value::Mapping(Default::default())),
        Some(services @ Value::Mapping(_)) => Ok(services),
        Some(_) => Err("services must be a mapping".to_string()),
        None if top.contains_key("version") => Ok(Value::Mapping(Default::default())),
        None => Ok(Value::Mapping(top)),
    }
}

fn convert_service(
    name: &str,
    raw: RawService,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> std::result::Result<ServiceConfig, String> {
    let restart = match raw.restart.as_deref() {
        Some(value) => RestartPolicy::parse(value)
            .ok_or_else(|| format!("unknown restart policy {value:?}"))?,
        None => RestartPolicy::default(),
    };

    let mut ports = Vec::new();
    for port in raw.ports {
        ports.extend(parse_port(port)?);
    }

    let mut volumes = Vec::with_capacity(raw.volumes.len());
    let mut tmpfs: Vec<String> = raw.tmpfs.map(StringOrList::into_items).unwrap_or_default();
    for volume in raw.volumes {
        match parse_volume(volume)? {
            ParsedVolume::Mount(mount) => volumes.push(mount),
            ParsedVolume::Tmpfs(path) => tmpfs.push(path),
        }
    }

    let environment = raw
        .environment
        .map(KeyValues::into_pairs)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| match value.or_else(|| lookup(&key)) {
            Some(value) => Some(EnvVar::new(key, value)),
            None => {
                debug!(service = %name, variable = %key, "Unset environment variable dropped");
                None
            }
        })
        .collect();

    let (build, dockerfile, build_args) = match raw.build {
        None => (None, None, Vec::new()),
        Some(RawBuild::Context(context)) => (Some(PathBuf::from(context)), None, Vec::new()),
        Some(RawBuild::Full(full)) => {
            let args = full
                .args
                .map(KeyValues::into_pairs)
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| match v {
                    Some(v) => BuildArg::literal(k, v),
                    None => BuildArg::inherited(k),
                })
                .collect();
            let context = full.context.unwrap_or_else(|| ".".to_string());
            (Some(PathBuf::from(context)), full.dockerfile, args)
        }
    };

    let annotations: BTreeMap<String, String> = raw
        .labels
        .map(KeyValues::into_pairs)
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or_default()))
        .collect();
    let expose = annotations
        .get(EXPOSE_LABEL)
        .map(|v| Expose::from(v.as_str()))
        .unwrap_or_default();

    let mem_limit = match raw.mem_limit {
        Some(limit) => Some(parse_memory(&limit.into_string())?),
        None => None,
    };

    Ok(ServiceConfig {
        image: raw.image,
        container_name: raw.container_name,
        restart,
        replicas: raw.deploy.and_then(|d| d.replicas).unwrap_or(0),
        ports,
        volumes,
        environment,
        cap_add: raw.cap_add,
        cap_drop: raw.cap_drop,
        tmpfs,
        build,
        build_args,
        dockerfile,
        expose,
        command: raw.entrypoint.map(StringOrList::into_words).unwrap_or_default(),
        args: raw.command.map(StringOrList::into_words).unwrap_or_default(),
        working_dir: raw.working_dir,
        privileged: raw.privileged,
        user: raw.user.map(Scalar::into_string),
        stdin_open: raw.stdin_open,
        tty: raw.tty,
        mem_limit,
        annotations,
        cgroup_parent: raw.cgroup_parent,
        cpu_set: raw.cpuset,
        cpu_shares: raw.cpu_shares,
        devices: raw.devices,
        dns: raw.dns.map(StringOrList::into_items).unwrap_or_default(),
        dns_search: raw.dns_search.map(StringOrList::into_items).unwrap_or_default(),
        networks: raw.networks.map(RawNetworks::into_names).unwrap_or_default(),
        security_opt: raw.security_opt,
        domain_name: raw.domainname,
        mac_address: raw.mac_address,
    })
}

// =============================================================================
// Ports
// =============================================================================

fn parse_port(port: RawPort) -> std::result::Result<Vec<PortMapping>, String> {
    match port {
        RawPort::Number(n) => Ok(vec![PortMapping::new(port_number(&n.to_string())?)]),
        RawPort::Short(spec) => parse_short_port(&spec),
        RawPort::Long(long) => {
            let protocol = match long.protocol.as_deref() {
                Some(p) => Protocol::parse(p).ok_or_else(|| format!("unknown protocol {p:?}"))?,
                None => Protocol::Tcp,
            };
            let host_port = match long.published {
                Some(published) => port_number(&published.into_string())?,
                None => 0,
            };
            Ok(vec![PortMapping {
                container_port: long.target,
                host_port,
                protocol,
                host_ip: long.host_ip,
            }])
        }
    }
}

/// `[ip:][host:]container[/proto]`, where host and container may be equally
/// long ranges
fn parse_short_port(spec: &str) -> std::result::Result<Vec<PortMapping>, String> {
    let (mapping, protocol) = match spec.split_once('/') {
        Some((mapping, proto)) => (
            mapping,
            Protocol::parse(proto).ok_or_else(|| format!("unknown protocol in port {spec:?}"))?,
        ),
        None => (spec, Protocol::Tcp),
    };

    let parts: Vec<&str> = mapping.rsplitn(3, ':').collect();
    let (host_ip, host, container) = match parts.as_slice() {
        [container] => (None, "", *container),
        [container, host] => (None, *host, *container),
        [container, host, ip] => (Some(ip.to_string()), *host, *container),
        _ => return Err(format!("invalid port {spec:?}")),
    };

    let containers = port_range(container)?;
    let hosts = if host.is_empty() {
        vec![0; containers.len()]
    } else {
        port_range(host)?
    };
    if hosts.len() != containers.len() {
        return Err(format!("port ranges in {spec:?} differ in length"));
    }

    Ok(containers
        .into_iter()
        .zip(hosts)
        .map(|(container_port, host_port)| PortMapping {
            container_port,
            host_port,
            protocol,
            host_ip: host_ip.clone(),
        })
        .collect())
}

fn port_range(value: &str) -> std::result::Result<Vec<i32>, String> {
    match value.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (port_number(start)?, port_number(end)?);
            if end < start {
                return Err(format!("invalid port range {value:?}"));
            }
            Ok((start..=end).collect())
        }
        None => Ok(vec![port_number(value)?]),
    }
}

fn port_number(value: &str) -> std::result::Result<i32, String> {
    value
        .trim()
        .parse::<u16>()
        .map(i32::from)
        .map_err(|_| format!("invalid port number {value:?}"))
}

// =============================================================================
// Volumes
// =============================================================================

enum ParsedVolume {
    Mount(VolumeMount),
    Tmpfs(String),
}

fn is_host_path(source: &str) -> bool {
    source.starts_with('/') || source.starts_with('.') || source.starts_with('~')
}

fn is_mode(token: &str) -> bool {
    matches!(token, "ro" | "rw" | "z" | "Z" | "rw,z" | "ro,z" | "rw,Z" | "ro,Z")
}

fn mount_from_source(source: Option<&str>, container: &str, mode: VolumeMode) -> VolumeMount {
    let mut mount = VolumeMount {
        container: container.to_string(),
        mode,
        ..Default::default()
    };
    match source {
        Some(source) if is_host_path(source) => mount.host = Some(source.to_string()),
        Some(source) if !source.is_empty() => mount.volume_name = Some(source.to_string()),
        _ => {}
    }
    mount
}

fn parse_volume(volume: RawVolume) -> std::result::Result<ParsedVolume, String> {
    match volume {
        RawVolume::Short(spec) => {
            let parts: Vec<&str> = spec.split(':').collect();
            let mount = match parts.as_slice() {
                [container] => mount_from_source(None, container, VolumeMode::ReadWrite),
                [container, mode] if is_mode(mode) => {
                    mount_from_source(None, container, VolumeMode::parse(mode))
                }
                [source, container] => {
                    mount_from_source(Some(*source), container, VolumeMode::ReadWrite)
                }
                [source, container, mode] => {
                    mount_from_source(Some(*source), container, VolumeMode::parse(mode))
                }
                _ => return Err(format!("invalid volume {spec:?}")),
            };
            if mount.container.is_empty() {
                return Err(format!("volume {spec:?} has no container path"));
            }
            Ok(ParsedVolume::Mount(mount))
        }
        RawVolume::Long(long) => {
            let mode = if long.read_only {
                VolumeMode::ReadOnly
            } else {
                VolumeMode::ReadWrite
            };
            match long.type_.as_deref() {
                Some("tmpfs") => Ok(ParsedVolume::Tmpfs(long.target)),
                Some("bind") => Ok(ParsedVolume::Mount(VolumeMount {
                    container: long.target,
                    host: long.source,
                    mode,
                    ..Default::default()
                })),
                _ => Ok(ParsedVolume::Mount(mount_from_source(
                    long.source.as_deref(),
                    &long.target,
                    mode,
                ))),
            }
        }
    }
}

/// Mounts a `volumes_from` consumer receives from `source`: the source's own
/// volumes as shared claims, named the way the source names them.
fn shared_mounts(source_name: &str, source: &ServiceConfig, mode: Option<VolumeMode>) -> Vec<VolumeMount> {
    let mut generated = 0;
    source
        .volumes
        .iter()
        .map(|vol| {
            let claim = match (vol.claim.as_deref(), vol.volume_name.as_deref()) {
                (Some(claim), _) => claim.to_string(),
                (None, Some(named)) if !named.is_empty() => named.replace('_', "-"),
                _ => {
                    let name = generated_volume_name(source_name, generated, false);
                    generated += 1;
                    name
                }
            };
            VolumeMount {
                container: vol.container.clone(),
                claim: Some(claim),
                mode: mode.unwrap_or(vol.mode),
                ..Default::default()
            }
        })
        .collect()
}

/// Resolve `service[:ro|:rw]` references into shared claim mounts. Only the
/// referenced service's own volumes are shared.
fn resolve_volumes_from(
    object: &mut KomposeObject,
    references: BTreeMap<String, Vec<String>>,
) -> std::result::Result<(), String> {
    let mut additions = Vec::new();
    for (consumer, refs) in &references {
        for reference in refs {
            let (source_name, mode) = match reference.split_once(':') {
                Some((source, mode)) => (source, Some(VolumeMode::parse(mode))),
                None => (reference.as_str(), None),
            };
            if source_name.starts_with("container") {
                warn!(service = %consumer, reference = %reference, "volumes_from a container isn't supported - ignoring");
                continue;
            }
            let source = object.services.get(source_name).ok_or_else(|| {
                format!("service {consumer}: volumes_from refers to unknown service {source_name:?}")
            })?;
            additions.push((consumer.clone(), shared_mounts(source_name, source, mode)));
        }
    }
    for (consumer, mounts) in additions {
        if let Some(service) = object.services.get_mut(&consumer) {
            service.volumes.extend(mounts);
        }
    }
    Ok(())
}

// =============================================================================
// Memory
// =============================================================================

/// Bytes from a compose memory value: a plain number or a number with a
/// `b`, `k`, `m` or `g` suffix (binary multiples, optional trailing `b`)
fn parse_memory(value: &str) -> std::result::Result<u64, String> {
    let lower = value.trim().to_ascii_lowercase();
    let digits_end = lower
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(lower.len());
    let (number, unit) = lower.split_at(digits_end);
    let number: f64 = number
        .parse()
        .map_err(|_| format!("invalid memory limit {value:?}"))?;
    let multiplier: u64 = match unit.trim_end_matches('b') {
        "" => 1,
        "k" => 1 << 10,
        "m" => 1 << 20,
        "g" => 1 << 30,
        _ => return Err(format!("invalid memory unit in {value:?}")),
    };
    Ok((number * multiplier as f64) as u64)
}
