//! Deploy and undeploy against a live cluster

use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;

use kompose::loader::compose;
use kompose_common::kube_utils::{config_labels, label_selector};
use kompose_common::{ConvertOptions, Provider};
use kompose_deploy::{deploy, undeploy, ClusterClient, KubeClusterClient};
use kompose_transform::{Collaborators, ObjectKind, WarnedKeys};

const APP: &str = r#"
services:
  hello:
    image: nginx:1.25
    ports: ["80"]
"#;

async fn create_namespace(client: &Client, name: &str) {
    let api: Api<Namespace> = Api::all(client.clone());
    let ns: Namespace = serde_json::from_value(serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": name },
    }))
    .unwrap();
    let _ = api.create(&PostParams::default(), &ns).await;
}

async fn delete_namespace(client: &Client, name: &str) {
    let api: Api<Namespace> = Api::all(client.clone());
    let _ = api.delete(name, &DeleteParams::default()).await;
}

/// Story: an application deployed with `up` is found by its labels and
/// removed completely by `down` computed from the same compose file.
#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn story_up_then_down_leaves_nothing_behind() {
    let client = Client::try_default().await.expect("cluster should be reachable");
    let namespace = "kompose-up-down-test";
    create_namespace(&client, namespace).await;

    let model = compose::load(
        &[("docker-compose.yml".into(), APP.to_string())],
        &|_: &str| None,
    )
    .unwrap();
    let opt = ConvertOptions {
        namespace: Some(namespace.to_string()),
        ..ConvertOptions::for_provider(Provider::Kubernetes)
    };
    let mut warned = WarnedKeys::new();
    let objects = kompose_transform::transform(&model, &opt, Collaborators::default(), &mut warned)
        .await
        .unwrap();

    let cluster = KubeClusterClient::new(client.clone());
    let summary = deploy(&cluster, &objects, &opt).await.unwrap();
    assert_eq!(summary.namespace, namespace);
    assert_eq!(summary.created.len(), 2);

    let selector = label_selector(&config_labels("hello"));
    let live = cluster
        .list(ObjectKind::Deployment, namespace, &selector)
        .await
        .unwrap();
    assert_eq!(live.len(), 1);

    let errors = undeploy(&cluster, &objects, &opt).await;
    assert!(errors.is_empty(), "undeploy failed: {errors:?}");

    for kind in [ObjectKind::Deployment, ObjectKind::Service] {
        let live = cluster.list(kind, namespace, &selector).await.unwrap();
        assert!(live.is_empty(), "{kind} still present");
    }

    delete_namespace(&client, namespace).await;
}
