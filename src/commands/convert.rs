//! Render converted objects without touching a cluster

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use super::{Input, TransformArgs};
use crate::output::{self, Format};
use crate::Result;

/// Convert the application and print or save the objects
#[derive(Args, Debug)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub transform: TransformArgs,

    /// File to write to; stdout when unset or `-`
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Emit a JSON List instead of YAML documents
    #[arg(short, long)]
    pub json: bool,
}

impl ConvertArgs {
    fn format(&self) -> Format {
        if self.json {
            Format::Json
        } else {
            Format::Yaml
        }
    }
}

pub async fn run(input: Input, args: ConvertArgs) -> Result<()> {
    let (model, opt) = super::load(&input, &args.transform)?;
    let objects = super::transform(&model, &opt).await?;

    let rendered = output::render(&objects, args.format())?;
    output::write(&rendered, args.out.as_deref())?;

    if let Some(path) = args.out.as_ref().filter(|p| p.as_os_str() != "-") {
        info!("Wrote {} objects to {}", objects.len(), path.display());
    }
    Ok(())
}
