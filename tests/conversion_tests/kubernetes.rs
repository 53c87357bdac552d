//! Kubernetes conversion stories

use kompose::output::{self, Format};
use kompose_common::{ControllerKind, ControllerToggles, ConvertOptions, Provider};
use kompose_transform::Collaborators;

use super::helpers::{convert, find, load, summary, write_compose};

const WEB_AND_DB: &str = r#"
version: "3"
services:
  web:
    image: nginx:1.25
    ports:
      - "8080:80"
    labels:
      kompose.service.expose: shop.example.com
    environment:
      ZONE: eu
      API_URL: http://api
  db:
    image: postgres:16
    volumes:
      - db_data:/var/lib/postgresql/data
    cpu_shares: 512
volumes:
  db_data: {}
"#;

/// Story: a shop with a public web tier and a database converts into
/// exposure objects first, then the workloads, with the database getting a
/// claim and a Recreate rollout.
#[tokio::test]
async fn story_web_and_database_for_kubernetes() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_compose(dir.path(), WEB_AND_DB);
    let model = load(&[file.clone()]);
    let opt = ConvertOptions {
        input_files: vec![file],
        ..ConvertOptions::for_provider(Provider::Kubernetes)
    };

    let (objects, warned) = convert(&model, &opt, Collaborators::default()).await;

    assert_eq!(
        summary(&objects),
        vec![
            "Service/db",
            "Service/web",
            "Ingress/web",
            "Deployment/db",
            "PersistentVolumeClaim/db-data",
            "Deployment/web",
        ]
    );
    assert!(warned.iter().any(|key| key == "cpu_shares"));

    // The database has no ports, so its Service is headless
    let db_svc = find(&objects, "Service", "db");
    assert_eq!(db_svc["spec"]["clusterIP"], "None");

    let web_svc = find(&objects, "Service", "web");
    assert_eq!(web_svc["spec"]["ports"][0]["port"], 8080);
    assert_eq!(web_svc["spec"]["ports"][0]["targetPort"], 80);
    assert_eq!(
        web_svc["metadata"]["annotations"]["kompose.service.expose"],
        "shop.example.com"
    );

    let ingress = find(&objects, "Ingress", "web");
    assert_eq!(ingress["spec"]["rules"][0]["host"], "shop.example.com");

    let db = find(&objects, "Deployment", "db");
    assert_eq!(db["spec"]["strategy"]["type"], "Recreate");
    let pod = &db["spec"]["template"]["spec"];
    assert_eq!(pod["volumes"][0]["persistentVolumeClaim"]["claimName"], "db-data");
    assert_eq!(
        pod["containers"][0]["volumeMounts"][0]["mountPath"],
        "/var/lib/postgresql/data"
    );

    let web = find(&objects, "Deployment", "web");
    let env = &web["spec"]["template"]["spec"]["containers"][0]["env"];
    assert_eq!(env[0]["name"], "API_URL");
    assert_eq!(env[1]["name"], "ZONE");

    // Every object carries exactly the service label
    for object in &objects {
        assert_eq!(object.labels().len(), 1);
        assert!(object.labels().contains_key("io.kompose.service"));
    }
}

/// Story: a one-shot migration job and a log shipper that must run on every
/// node. The job becomes a bare pod; with DaemonSets forced the shipper
/// becomes one, and forced replicas do not apply to it.
#[tokio::test]
async fn story_jobs_and_daemons() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_compose(
        dir.path(),
        r#"
services:
  migrate:
    image: app:1.0
    restart: "no"
    command: ["./migrate", "--all"]
  shipper:
    image: fluent-bit
    tmpfs: /buffer
"#,
    );
    let model = load(&[file.clone()]);

    let opt = ConvertOptions {
        input_files: vec![file.clone()],
        replicas: 4,
        force_replicas: true,
        controllers: ControllerToggles::only(ControllerKind::DaemonSet),
        ..Default::default()
    };
    let (objects, _) = convert(&model, &opt, Collaborators::default()).await;
    assert_eq!(
        summary(&objects),
        vec![
            "Service/shipper",
            "Pod/migrate",
            "DaemonSet/shipper",
        ]
    );

    let pod = find(&objects, "Pod", "migrate");
    assert_eq!(pod["spec"]["restartPolicy"], "Never");
    assert_eq!(pod["spec"]["containers"][0]["args"][0], "./migrate");

    let daemon = find(&objects, "DaemonSet", "shipper");
    assert!(daemon["spec"].get("replicas").is_none());
    let volume = &daemon["spec"]["template"]["spec"]["volumes"][0];
    assert_eq!(volume["name"], "shipper-tmpfs0");
    assert_eq!(volume["emptyDir"]["medium"], "Memory");

    // Forcing a controller kind onto a run-to-completion service is refused
    let forced = ConvertOptions {
        input_files: vec![file],
        forced_controllers: vec![ControllerKind::Deployment],
        ..Default::default()
    }
    .resolve_controllers();
    let mut warned = kompose_transform::WarnedKeys::new();
    let err = kompose_transform::transform(&model, &forced, Collaborators::default(), &mut warned)
        .await
        .unwrap_err();
    assert_eq!(err.service(), Some("migrate"));
}

/// Story: converting the same application twice yields byte-identical
/// output, and the rendered YAML splits back into one document per object.
#[tokio::test]
async fn story_conversion_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_compose(dir.path(), WEB_AND_DB);
    let opt = ConvertOptions {
        input_files: vec![file.clone()],
        empty_volumes: true,
        ..ConvertOptions::for_provider(Provider::Kubernetes)
    };

    let first = {
        let (objects, _) = convert(&load(&[file.clone()]), &opt, Collaborators::default()).await;
        output::render(&objects, Format::Yaml).unwrap()
    };
    let second = {
        let (objects, _) = convert(&load(&[file]), &opt, Collaborators::default()).await;
        output::render(&objects, Format::Yaml).unwrap()
    };
    assert_eq!(first, second);
    assert_eq!(first.split("---\n").count(), 5);
    assert!(!first.contains("PersistentVolumeClaim"));
    assert!(first.contains("emptyDir"));
}
