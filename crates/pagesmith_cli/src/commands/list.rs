//! List command - list the owner's targets.

use anyhow::Result;
use clap::Args;

use super::CommonArgs;

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    common: CommonArgs,
}

pub async fn execute(args: ListArgs) -> Result<()> {
    let service = super::build_service(&args.common)?;

    let targets = service.list_targets(args.common.owner)?;
    if targets.is_empty() {
        println!("No targets yet. Create one with: pagesmith create \"<prompt>\"");
        return Ok(());
    }

    for target in targets {
        let deployed = match &target.deploy_key {
            Some(key) => format!("deployed ({})", key),
            None => "not deployed".to_string(),
        };
        println!(
            "{}  {:<12}  {:<12}  {}",
            target.id, target.name, target.layout, deployed
        );
    }
    Ok(())
}
