//! Create command - create a new generation target.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::CommonArgs;

#[derive(Args)]
pub struct CreateArgs {
    /// What the target should become
    prompt: String,

    #[command(flatten)]
    common: CommonArgs,
}

pub async fn execute(args: CreateArgs) -> Result<()> {
    let service = super::build_service(&args.common)?;

    info!("Creating target");
    let target = service.create_target(&args.prompt, args.common.owner).await?;

    println!("✅ Created target {} ({})", target.id, target.name);
    println!("   Layout: {}", target.layout);
    println!("   Next: pagesmith chat {} \"<message>\"", target.id);
    Ok(())
}
