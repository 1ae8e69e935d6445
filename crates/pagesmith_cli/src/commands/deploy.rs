//! Deploy command - build and publish a target.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::CommonArgs;

#[derive(Args)]
pub struct DeployArgs {
    /// Target id
    target: i64,

    #[command(flatten)]
    common: CommonArgs,
}

pub async fn execute(args: DeployArgs) -> Result<()> {
    let service = super::build_service(&args.common)?;

    info!("Deploying target {}", args.target);
    let url = service.deploy_target(args.target, args.common.owner).await?;

    println!("🚀 Deployed: {}", url);
    Ok(())
}
