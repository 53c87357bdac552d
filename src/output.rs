//! Rendering of converted objects

use std::path::Path;

use kompose_transform::KubeObject;
use serde_json::json;

use crate::Result;

/// Output encoding
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Multi-document YAML
    #[default]
    Yaml,
    /// A single `v1/List` JSON document
    Json,
}

/// Render objects in order
pub fn render(objects: &[KubeObject], format: Format) -> Result<String> {
    match format {
        Format::Yaml => {
            let docs = objects
                .iter()
                .map(|o| Ok(serde_yaml::to_string(&o.to_value()?)?))
                .collect::<Result<Vec<_>>>()?;
            Ok(docs.join("---\n"))
        }
        Format::Json => {
            let items = objects
                .iter()
                .map(|o| Ok(o.to_value()?))
                .collect::<Result<Vec<_>>>()?;
            let list = json!({
                "apiVersion": "v1",
                "kind": "List",
                "metadata": {},
                "items": items,
            });
            let mut out = serde_json::to_string_pretty(&list)?;
            out.push('\n');
            Ok(out)
        }
    }
}

/// Write rendered output to a file, or stdout when `out` is `None` or `-`
pub fn write(rendered: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) if path != Path::new("-") => {
            std::fs::write(path, rendered)?;
            Ok(())
        }
        _ => {
            use std::io::Write;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}
