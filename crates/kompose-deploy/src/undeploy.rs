//! Remove what a conversion created
//!
//! The object graph is recomputed from the same inputs, so undeploy targets
//! exactly what deploy created. Live objects are matched by their label set,
//! which must equal the generated one; objects that merely carry the label
//! among others were not created by kompose and are left alone.

use kompose_common::kube_utils::label_selector;
use kompose_common::{ConvertOptions, Error};
use kompose_transform::KubeObject;
use tracing::{debug, info};

use crate::client::{ClusterClient, DeleteMode};

/// Delete the live counterparts of every object.
///
/// Failures are collected rather than returned early so one stuck object
/// never blocks removal of the rest. An empty result means full success,
/// including the case where nothing was found.
pub async fn undeploy<C: ClusterClient + ?Sized>(
    client: &C,
    objects: &[KubeObject],
    opt: &ConvertOptions,
) -> Vec<Error> {
    let namespace = opt.resolved_namespace(&client.default_namespace());
    let mut errors = Vec::new();

    for object in objects {
        let kind = object.kind();
        let expected = object.labels();
        let selector = label_selector(expected);

        let live = match client.list(kind, &namespace, &selector).await {
            Ok(live) => live,
            Err(e) => {
                errors.push(e.with_context(format!("listing {kind} {}", object.name())));
                continue;
            }
        };

        let mode = DeleteMode::for_kind(kind);
        for candidate in live.iter().filter(|l| &l.labels == expected) {
            match client.delete(kind, &candidate.name, &namespace, mode).await {
                Ok(()) => info!("Successfully deleted {}: {}", kind, candidate.name),
                Err(e) => {
                    errors.push(e.with_context(format!("deleting {kind} {}", candidate.name)))
                }
            }
        }
        if live.is_empty() {
            debug!(kind = %kind, selector = %selector, "No live objects found");
        }
    }
    errors
}
