//! Distributed application bundle (`.dab`) loader

use std::collections::BTreeMap;
use std::path::Path;

use kompose_common::model::{
    EnvVar, Expose, KomposeObject, LoadedFrom, PortMapping, Protocol, ServiceConfig,
};
use kompose_common::EXPOSE_LABEL;
use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Bundle {
    #[serde(default)]
    version: String,
    #[serde(default)]
    services: BTreeMap<String, BundleService>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct BundleService {
    image: String,
    command: Vec<String>,
    args: Vec<String>,
    env: Vec<String>,
    labels: BTreeMap<String, String>,
    ports: Vec<BundlePort>,
    networks: Vec<String>,
    user: Option<String>,
    working_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BundlePort {
    #[serde(default)]
    protocol: String,
    port: u16,
}

/// Parse a bundle document
pub fn load(contents: &str, path: &Path) -> Result<KomposeObject> {
    let bundle: Bundle = serde_json::from_str(contents)
        .map_err(|e| Error::compose(path, format!("invalid bundle: {e}")))?;
    debug!(version = %bundle.version, services = bundle.services.len(), "Loaded bundle");

    let mut object = KomposeObject::new(LoadedFrom::Bundle);
    for (name, service) in bundle.services {
        let config = convert_service(service)
            .map_err(|message| Error::compose(path, format!("service {name}: {message}")))?;
        object.services.insert(name, config);
    }
    Ok(object)
}

fn convert_service(service: BundleService) -> std::result::Result<ServiceConfig, String> {
    let ports = service
        .ports
        .into_iter()
        .map(|p| {
            let protocol = if p.protocol.is_empty() {
                Protocol::Tcp
            } else {
                Protocol::parse(&p.protocol)
                    .ok_or_else(|| format!("unknown protocol {:?}", p.protocol))?
            };
            Ok(PortMapping {
                protocol,
                ..PortMapping::new(i32::from(p.port))
            })
        })
        .collect::<std::result::Result<Vec<_>, String>>()?;

    let environment = service
        .env
        .iter()
        .map(|item| match item.split_once('=') {
            Some((k, v)) => EnvVar::new(k, v),
            None => EnvVar::new(item.as_str(), ""),
        })
        .collect();

    let expose = service
        .labels
        .get(EXPOSE_LABEL)
        .map(|v| Expose::from(v.as_str()))
        .unwrap_or_default();

    Ok(ServiceConfig {
        image: Some(service.image).filter(|i| !i.is_empty()),
        ports,
        environment,
        command: service.command,
        args: service.args,
        user: service.user.filter(|u| !u.is_empty()),
        working_dir: service.working_dir.filter(|w| !w.is_empty()),
        networks: service.networks,
        expose,
        annotations: service.labels,
        ..Default::default()
    })
}
