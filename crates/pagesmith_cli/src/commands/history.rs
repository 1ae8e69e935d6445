//! History command - show a target's conversation record.

use anyhow::Result;
use clap::Args;

use pagesmith_session::MessageKind;

use super::CommonArgs;

#[derive(Args)]
pub struct HistoryArgs {
    /// Target id
    target: i64,

    /// Maximum number of entries to show
    #[arg(short, long, default_value_t = 20)]
    limit: usize,

    #[command(flatten)]
    common: CommonArgs,
}

pub async fn execute(args: HistoryArgs) -> Result<()> {
    let service = super::build_service(&args.common)?;

    let messages = service
        .list_history(args.target, args.common.owner, args.limit)
        .await?;

    if messages.is_empty() {
        println!("No history for target {}", args.target);
        return Ok(());
    }

    for message in messages {
        let tag = match message.kind {
            MessageKind::User => "you",
            MessageKind::Assistant => "ai",
            MessageKind::Error => "error",
        };
        println!(
            "[{}] {} {}",
            message.created_at.format("%Y-%m-%d %H:%M:%S"),
            tag,
            message.content
        );
    }
    Ok(())
}
