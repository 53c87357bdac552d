//! Manifest loading
//!
//! Compose files (YAML, one or more merged in order) and distributed
//! application bundles (JSON) both end up as a [`KomposeObject`].

pub mod bundle;
pub mod compose;

use std::io::Read;
use std::path::{Path, PathBuf};

use kompose_common::KomposeObject;
use serde_yaml::{Mapping, Value};

use crate::{Error, Result};

/// Files tried when no input is given
pub const DEFAULT_COMPOSE_FILES: &[&str] = &["docker-compose.yml", "docker-compose.yaml"];

/// Input files with the defaults applied
pub fn resolve_input_files(files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if !files.is_empty() {
        return Ok(files.to_vec());
    }
    DEFAULT_COMPOSE_FILES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .map(|p| vec![p])
        .ok_or_else(|| {
            Error::validation(format!(
                "no compose file found; tried {}",
                DEFAULT_COMPOSE_FILES.join(", ")
            ))
        })
}

/// Load a model from compose files, or a bundle when `bundle` is set
pub fn load(files: &[PathBuf], bundle: Option<&Path>) -> Result<KomposeObject> {
    match bundle {
        Some(path) => bundle::load(&read_input(path)?, path),
        None => {
            let documents = files
                .iter()
                .map(|path| Ok((path.clone(), read_input(path)?)))
                .collect::<Result<Vec<_>>>()?;
            compose::load(&documents, &|name: &str| std::env::var(name).ok())
        }
    }
}

/// Read a file, or stdin for `-`
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path)
        .map_err(|e| Error::compose(path, format!("unable to read file: {e}")))
}

/// Merge `overlay` into `base`: mappings merge key by key, anything else is
/// replaced.
pub(crate) fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => merge_mappings(base, overlay),
        (base, overlay) => *base = overlay,
    }
}

fn merge_mappings(base: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => merge_values(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

/// Substitute `$VAR`, `${VAR}`, `${VAR:-default}` and `${VAR-default}` in
/// every string of a document. `$$` is a literal `$`.
pub(crate) fn interpolate_value(
    value: &mut Value,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> std::result::Result<(), String> {
    match value {
        Value::String(s) => {
            *s = interpolate(s, lookup)?;
        }
        Value::Sequence(items) => {
            for item in items {
                interpolate_value(item, lookup)?;
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                interpolate_value(item, lookup)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn interpolate(
    input: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('{') => {
                chars.next();
                let mut expr = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    expr.push(c);
                }
                if !closed {
                    return Err(format!("unterminated variable reference in {input:?}"));
                }
                out.push_str(&expand(&expr, lookup));
            }
            Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
                let mut name = String::new();
                while let Some(c) = chars.peek().copied() {
                    if !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                out.push_str(&lookup(&name).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }
    Ok(out)
}

fn expand(expr: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    if let Some((name, default)) = expr.split_once(":-") {
        return lookup(name)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string());
    }
    if let Some((name, default)) = expr.split_once('-') {
        return lookup(name).unwrap_or_else(|| default.to_string());
    }
    lookup(expr).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "TAG" => Some("1.2".to_string()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn test_interpolation_forms() {
        assert_eq!(interpolate("nginx:$TAG", &env).unwrap(), "nginx:1.2");
        assert_eq!(interpolate("nginx:${TAG}", &env).unwrap(), "nginx:1.2");
        assert_eq!(interpolate("${MISSING:-latest}", &env).unwrap(), "latest");
        assert_eq!(interpolate("${EMPTY:-fallback}", &env).unwrap(), "fallback");
        assert_eq!(interpolate("${EMPTY-fallback}", &env).unwrap(), "");
        assert_eq!(interpolate("cost $$5", &env).unwrap(), "cost $5");
        assert_eq!(interpolate("${MISSING}", &env).unwrap(), "");
        assert!(interpolate("${TAG", &env).is_err());
    }

    #[test]
    fn test_merge_overrides_keys() {
        let mut base: Value = serde_yaml::from_str(
            "services:\n  web:\n    image: nginx\n    ports: ['80']\n",
        )
        .unwrap();
        let overlay: Value =
            serde_yaml::from_str("services:\n  web:\n    image: nginx:1.25\n  db:\n    image: postgres\n")
                .unwrap();
        merge_values(&mut base, overlay);

        let services = &base["services"];
        assert_eq!(services["web"]["image"].as_str(), Some("nginx:1.25"));
        assert!(services["web"]["ports"].is_sequence());
        assert_eq!(services["db"]["image"].as_str(), Some("postgres"));
    }

    #[test]
    fn test_explicit_files_win() {
        let files = vec![PathBuf::from("custom.yml")];
        assert_eq!(resolve_input_files(&files).unwrap(), files);
    }
}
