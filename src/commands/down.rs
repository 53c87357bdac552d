//! Remove a deployed application

use clap::Args;
use kompose_common::{BuildMode, ConvertOptions};
use kompose_deploy::KubeClusterClient;
use tracing::error;

use super::{ClusterArgs, Input, TransformArgs};
use crate::{Error, Result};

/// Recompute the object graph and delete its live counterparts
#[derive(Args, Debug)]
pub struct DownArgs {
    #[command(flatten)]
    pub transform: TransformArgs,

    #[command(flatten)]
    pub cluster: ClusterArgs,
}

/// Removal only needs object identities, so local images are not rebuilt.
fn for_removal(mut opt: ConvertOptions) -> ConvertOptions {
    if opt.build == BuildMode::Local {
        opt.build = BuildMode::None;
    }
    opt
}

pub async fn run(input: Input, args: DownArgs) -> Result<()> {
    let (model, opt) = super::load(&input, &args.transform)?;
    let opt = for_removal(opt);
    let objects = super::transform(&model, &opt).await?;

    let client = KubeClusterClient::new(super::kube_client(&args.cluster).await?);
    let errors = kompose_deploy::undeploy(&client, &objects, &opt).await;
    if errors.is_empty() {
        return Ok(());
    }

    for e in &errors {
        error!("{}", e);
    }
    Err(Error::command_failed(format!(
        "{} object(s) could not be removed",
        errors.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_skips_local_builds() {
        let opt = ConvertOptions {
            build: BuildMode::Local,
            ..Default::default()
        };
        assert_eq!(for_removal(opt).build, BuildMode::None);

        let opt = ConvertOptions {
            build: BuildMode::BuildConfig,
            ..Default::default()
        };
        assert_eq!(for_removal(opt).build, BuildMode::BuildConfig);
    }
}
