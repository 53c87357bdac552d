//! Shared Kubernetes utilities using kube-rs
//!
//! Canonical object metadata for generated resources, `ApiResource`
//! construction for the fixed set of kinds kompose emits, label selectors,
//! and a polling helper for bounded waits.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use kube::discovery::ApiResource;
use tracing::trace;

use crate::{Error, LABEL_SERVICE};

// =============================================================================
// ObjectMeta - Canonical Kubernetes metadata for all generated resources
// =============================================================================

/// Standard Kubernetes ObjectMeta for generated resources.
///
/// Construction adds the single service label; nothing else is added so the
/// label set stays an exact match for later selective deletion.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Resource namespace, unset for namespace-agnostic output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Create new metadata carrying the service label for `name`
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            labels: config_labels(&name),
            name,
            namespace: None,
            annotations: BTreeMap::new(),
        }
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// The single-entry label set identifying objects generated for `name`
pub fn config_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(LABEL_SERVICE.to_string(), name.to_string())])
}

/// Render a label set as an equality-based selector (`k=v,k2=v2`)
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

// =============================================================================
// HasApiResource Trait
// =============================================================================

/// Trait for types that have a known API group, version, and kind.
///
/// Implement this for resource types to derive their `ApiResource` from their
/// internal constants, ensuring consistency between serialization and API calls.
pub trait HasApiResource {
    /// Full API version (e.g., "apps/v1", "v1")
    const API_VERSION: &'static str;
    /// Resource kind (e.g., "Deployment")
    const KIND: &'static str;

    /// Build an ApiResource from the type's constants.
    fn api_resource() -> ApiResource {
        build_api_resource(Self::API_VERSION, Self::KIND)
    }
}

/// Build an ApiResource from a known apiVersion and kind.
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Split an apiVersion into (group, version); the core group is empty
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Pluralize a Kubernetes resource kind
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Poll until a condition is met or timeout is reached
///
/// Repeatedly calls `check_fn` until it returns `Ok(true)`. Errors from the
/// check are treated as fatal and returned immediately.
pub async fn poll_until<F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    timeout_msg: impl Into<String>,
    mut check_fn: F,
) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, Error>>,
{
    let start = std::time::Instant::now();
    let timeout_msg = timeout_msg.into();

    loop {
        if check_fn().await? {
            return Ok(());
        }
        if start.elapsed() > timeout {
            return Err(Error::internal_with_context("poll_until", timeout_msg));
        }
        trace!("Polling condition not yet met, retrying...");
        tokio::time::sleep(poll_interval).await;
    }
}
