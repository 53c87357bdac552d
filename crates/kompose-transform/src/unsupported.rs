//! Detection of service fields no target platform can express
//!
//! The table is static: each entry names a model field, how to tell whether a
//! service sets it, and how the field is spelled in each manifest format.

use std::collections::BTreeSet;

use kompose_common::{LoadedFrom, Provider, ServiceConfig};
use tracing::warn;

/// One model field without a platform equivalent
pub struct UnsupportedKey {
    /// Model field name
    pub field: &'static str,
    /// Key as written in a compose file
    pub compose_tag: &'static str,
    /// Key as written in a bundle file
    pub bundle_tag: &'static str,
    /// Whether the service sets the field
    pub is_set: fn(&ServiceConfig) -> bool,
}

impl UnsupportedKey {
    /// Key name in the format the model was loaded from
    pub fn tag(&self, loaded_from: LoadedFrom) -> &'static str {
        match loaded_from {
            LoadedFrom::Compose => self.compose_tag,
            LoadedFrom::Bundle => self.bundle_tag,
        }
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Fields ignored by both Kubernetes and OpenShift
pub static UNSUPPORTED_KEYS: &[UnsupportedKey] = &[
    UnsupportedKey {
        field: "cgroup_parent",
        compose_tag: "cgroup_parent",
        bundle_tag: "CgroupParent",
        is_set: |s| has_text(&s.cgroup_parent),
    },
    UnsupportedKey {
        field: "cpu_set",
        compose_tag: "cpuset",
        bundle_tag: "CPUSet",
        is_set: |s| has_text(&s.cpu_set),
    },
    UnsupportedKey {
        field: "cpu_shares",
        compose_tag: "cpu_shares",
        bundle_tag: "CPUShares",
        is_set: |s| s.cpu_shares.is_some_and(|v| v != 0),
    },
    UnsupportedKey {
        field: "devices",
        compose_tag: "devices",
        bundle_tag: "Devices",
        is_set: |s| !s.devices.is_empty(),
    },
    UnsupportedKey {
        field: "dns",
        compose_tag: "dns",
        bundle_tag: "DNS",
        is_set: |s| !s.dns.is_empty(),
    },
    UnsupportedKey {
        field: "dns_search",
        compose_tag: "dns_search",
        bundle_tag: "DNSSearch",
        is_set: |s| !s.dns_search.is_empty(),
    },
    UnsupportedKey {
        field: "networks",
        compose_tag: "networks",
        bundle_tag: "Networks",
        is_set: |s| !s.networks.is_empty(),
    },
    UnsupportedKey {
        field: "security_opt",
        compose_tag: "security_opt",
        bundle_tag: "SecurityOpt",
        is_set: |s| !s.security_opt.is_empty(),
    },
    UnsupportedKey {
        field: "domain_name",
        compose_tag: "domainname",
        bundle_tag: "DomainName",
        is_set: |s| has_text(&s.domain_name),
    },
    UnsupportedKey {
        field: "mac_address",
        compose_tag: "mac_address",
        bundle_tag: "MacAddress",
        is_set: |s| has_text(&s.mac_address),
    },
];

/// Fields already reported during a run.
///
/// Owned by the caller so repeated conversions in one process each start
/// from a clean slate, or deliberately share one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WarnedKeys {
    fields: BTreeSet<&'static str>,
}

impl WarnedKeys {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `field`; returns false when it was already recorded
    pub fn insert(&mut self, field: &'static str) -> bool {
        self.fields.insert(field)
    }

    /// Number of distinct fields reported
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether nothing was reported
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reported fields in name order
    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().copied()
    }
}

/// Warn about unsupported fields the service sets.
///
/// Each field is reported once per accumulator no matter how many services
/// set it. Returns the tags newly reported for this service.
pub fn check_unsupported_keys(
    name: &str,
    service: &ServiceConfig,
    provider: Provider,
    loaded_from: LoadedFrom,
    warned: &mut WarnedKeys,
) -> Vec<&'static str> {
    let mut reported = Vec::new();
    for key in UNSUPPORTED_KEYS {
        if !(key.is_set)(service) || !warned.insert(key.field) {
            continue;
        }
        let tag = key.tag(loaded_from);
        warn!(
            service = %name,
            "{provider} provider doesn't support {tag} key - ignoring"
        );
        reported.push(tag);
    }
    reported
}
