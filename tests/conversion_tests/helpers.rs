//! Shared fixtures for conversion tests

use std::path::{Path, PathBuf};

use kompose::loader;
use kompose_common::{ConvertOptions, KomposeObject};
use kompose_transform::{Collaborators, KubeObject, WarnedKeys};
use serde_json::Value;

/// Write a compose file into `dir` and return its path
pub fn write_compose(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("docker-compose.yml");
    std::fs::write(&path, contents).expect("compose file should be writable");
    path
}

/// Load the files the way the CLI does
pub fn load(files: &[PathBuf]) -> KomposeObject {
    loader::load(files, None).expect("compose file should load")
}

/// Convert with the given collaborators and return objects plus warnings
pub async fn convert(
    model: &KomposeObject,
    opt: &ConvertOptions,
    collaborators: Collaborators<'_>,
) -> (Vec<KubeObject>, WarnedKeys) {
    let mut warned = WarnedKeys::new();
    let objects = kompose_transform::transform(model, opt, collaborators, &mut warned)
        .await
        .expect("conversion should succeed");
    (objects, warned)
}

/// `Kind/name` of every object, in order
pub fn summary(objects: &[KubeObject]) -> Vec<String> {
    objects
        .iter()
        .map(|o| format!("{}/{}", o.kind(), o.name()))
        .collect()
}

/// Serialized form of the object with this kind and name
pub fn find(objects: &[KubeObject], kind: &str, name: &str) -> Value {
    objects
        .iter()
        .find(|o| o.kind().as_str() == kind && o.name() == name)
        .unwrap_or_else(|| panic!("no {kind}/{name} in {:?}", summary(objects)))
        .to_value()
        .expect("object should serialize")
}
