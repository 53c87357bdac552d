//! OpenShift conversion stories

use git2::Repository;
use kompose::git::Git2Info;
use kompose_common::{BuildMode, ConvertOptions, Provider};
use kompose_transform::Collaborators;

use super::helpers::{convert, find, load, summary, write_compose};

/// Story: a public web service on OpenShift becomes a DeploymentConfig fed
/// by an ImageStream tracking the upstream image, exposed through a Route.
#[tokio::test]
async fn story_exposed_service_on_openshift() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_compose(
        dir.path(),
        r#"
services:
  web:
    image: quay.io/acme/web:2.1
    ports: ["80"]
    labels:
      kompose.service.expose: "true"
"#,
    );
    let model = load(&[file.clone()]);
    let opt = ConvertOptions {
        input_files: vec![file],
        insecure_repository: true,
        ..ConvertOptions::for_provider(Provider::OpenShift)
    };

    let (objects, _) = convert(&model, &opt, Collaborators::default()).await;
    assert_eq!(
        summary(&objects),
        vec![
            "Service/web",
            "Route/web",
            "DeploymentConfig/web",
            "ImageStream/web",
        ]
    );

    let route = find(&objects, "Route", "web");
    assert!(route["spec"].get("host").is_none());
    assert_eq!(route["spec"]["to"]["name"], "web");
    assert_eq!(route["spec"]["port"]["targetPort"], 80);

    let dc = find(&objects, "DeploymentConfig", "web");
    let triggers = dc["spec"]["triggers"].as_array().unwrap();
    assert_eq!(triggers[0]["type"], "ConfigChange");
    assert_eq!(triggers[1]["imageChangeParams"]["from"]["name"], "web:2.1");

    let stream = find(&objects, "ImageStream", "web");
    let tag = &stream["spec"]["tags"][0];
    assert_eq!(tag["name"], "2.1");
    assert_eq!(tag["from"]["name"], "quay.io/acme/web:2.1");
    assert_eq!(tag["importPolicy"]["insecure"], true);
}

/// Story: a team keeps its compose file in a subdirectory of a git checkout
/// and asks OpenShift to build the image. The BuildConfig points at the
/// checkout's remote and branch, with the build context relative to the
/// repository root, and the ImageStream starts empty.
#[tokio::test]
async fn story_in_cluster_build_from_git_checkout() {
    let repo_dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(repo_dir.path()).unwrap();
    repo.remote("origin", "https://git.example.com/acme/shop").unwrap();
    {
        let sig = git2::Signature::now("dev", "dev@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let commit = repo
            .commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap();
        let commit = repo.find_commit(commit).unwrap();
        repo.branch("release", &commit, false).unwrap();
        repo.set_head("refs/heads/release").unwrap();
    }

    let app_dir = repo_dir.path().join("deploy");
    std::fs::create_dir_all(app_dir.join("api")).unwrap();
    let file = write_compose(
        &app_dir,
        r#"
services:
  api:
    image: api:v3
    build:
      context: ./api
      args:
        - CHANNEL=stable
"#,
    );
    let model = load(&[file.clone()]);
    let opt = ConvertOptions {
        input_files: vec![file],
        build: BuildMode::BuildConfig,
        ..ConvertOptions::for_provider(Provider::OpenShift)
    };

    let git = Git2Info::new();
    let collaborators = Collaborators {
        image_builder: None,
        git: Some(&git),
    };
    let (objects, _) = convert(&model, &opt, collaborators).await;
    assert_eq!(
        summary(&objects),
        vec![
            "Service/api",
            "DeploymentConfig/api",
            "ImageStream/api",
            "BuildConfig/api",
        ]
    );

    let bc = find(&objects, "BuildConfig", "api");
    let source = &bc["spec"]["source"];
    assert_eq!(source["git"]["uri"], "https://git.example.com/acme/shop.git");
    assert_eq!(source["git"]["ref"], "release");
    assert_eq!(source["contextDir"], "deploy/api/");
    assert_eq!(bc["spec"]["output"]["to"]["name"], "api:v3");
    assert_eq!(
        bc["spec"]["strategy"]["dockerStrategy"]["env"][0]["value"],
        "stable"
    );

    let stream = find(&objects, "ImageStream", "api");
    assert!(stream["spec"].get("tags").is_none());
}
