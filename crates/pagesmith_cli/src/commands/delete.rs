//! Delete command - remove a target and its history.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::CommonArgs;

#[derive(Args)]
pub struct DeleteArgs {
    /// Target id
    target: i64,

    #[command(flatten)]
    common: CommonArgs,
}

pub async fn execute(args: DeleteArgs) -> Result<()> {
    let service = super::build_service(&args.common)?;

    service.delete_target(args.target, args.common.owner).await?;
    info!("Deleted target {}", args.target);

    println!("🗑️  Deleted target {} and its history", args.target);
    Ok(())
}
