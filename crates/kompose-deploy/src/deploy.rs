//! Create an object graph in the cluster

use kompose_common::{ConvertOptions, Error, Provider, Result};
use kompose_transform::{KubeObject, ObjectKind};
use tracing::info;

use crate::client::ClusterClient;

/// What a deploy created
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploySummary {
    /// Namespace the objects were created in
    pub namespace: String,
    /// Created objects in creation order
    pub created: Vec<(ObjectKind, String)>,
    /// Command for inspecting the result
    pub inspect_hint: String,
}

/// Command listing what a deploy created on `provider`
pub fn inspect_hint(provider: Provider, has_claims: bool) -> String {
    let base = match provider {
        Provider::Kubernetes => "kubectl get deployment,svc,pods",
        Provider::OpenShift => "oc get dc,svc,is",
    };
    if has_claims {
        format!("{base},pvc")
    } else {
        base.to_string()
    }
}

/// Create every object, in order, in the resolved namespace.
///
/// The first failure stops the loop and is returned naming the object that
/// failed; objects created before it are left in place.
pub async fn deploy<C: ClusterClient + ?Sized>(
    client: &C,
    objects: &[KubeObject],
    opt: &ConvertOptions,
) -> Result<DeploySummary> {
    let namespace = opt.resolved_namespace(&client.default_namespace());
    info!(namespace = %namespace, provider = %opt.provider, "Deploying application");

    let mut created = Vec::with_capacity(objects.len());
    for object in objects {
        let kind = object.kind();
        client
            .create(object, &namespace)
            .await
            .map_err(|e| Error::apply(kind.as_str(), object.name(), e))?;
        info!("Successfully created {}: {}", kind, object.name());
        created.push((kind, object.name().to_string()));
    }

    let has_claims = objects
        .iter()
        .any(|o| o.kind() == ObjectKind::PersistentVolumeClaim);
    let hint = inspect_hint(opt.provider, has_claims);
    info!(
        "All objects are created. Your application is being deployed. Use '{}' for details.",
        hint
    );

    Ok(DeploySummary {
        namespace,
        created,
        inspect_hint: hint,
    })
}
