//! Deploy to a live cluster

use clap::Args;
use kompose_common::BuildMode;
use kompose_deploy::KubeClusterClient;
use tracing::info;

use super::{ClusterArgs, Input, TransformArgs};
use crate::Result;

/// Convert the application and create the objects in the cluster
#[derive(Args, Debug)]
pub struct UpArgs {
    #[command(flatten)]
    pub transform: TransformArgs,

    #[command(flatten)]
    pub cluster: ClusterArgs,
}

pub async fn run(input: Input, args: UpArgs) -> Result<()> {
    let (model, opt) = super::load(&input, &args.transform)?;
    if opt.build == BuildMode::Local {
        info!("Images with a build context are built and pushed before deploying");
    }
    let objects = super::transform(&model, &opt).await?;

    let client = KubeClusterClient::new(super::kube_client(&args.cluster).await?);
    let summary = kompose_deploy::deploy(&client, &objects, &opt).await?;
    info!(
        namespace = %summary.namespace,
        objects = summary.created.len(),
        "Deploy finished"
    );
    Ok(())
}
