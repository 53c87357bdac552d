//! Object graph ordering

use std::collections::BTreeSet;

use crate::object::{KubeObject, ObjectKind};

/// Drop claims whose name an earlier claim already took.
///
/// Services sharing a named volume each ask for the same claim; the first
/// service in name order owns it.
pub fn dedupe_claims(objects: Vec<KubeObject>) -> Vec<KubeObject> {
    let mut claimed = BTreeSet::new();
    objects
        .into_iter()
        .filter(|o| o.kind() != ObjectKind::PersistentVolumeClaim || claimed.insert(o.name().to_string()))
        .collect()
}

/// Move exposure objects (Service, Ingress, Route) ahead of everything else,
/// keeping relative order within both groups.
pub fn sort_exposure_first(objects: Vec<KubeObject>) -> Vec<KubeObject> {
    let (mut exposure, rest): (Vec<_>, Vec<_>) =
        objects.into_iter().partition(KubeObject::is_exposure);
    exposure.extend(rest);
    exposure
}
