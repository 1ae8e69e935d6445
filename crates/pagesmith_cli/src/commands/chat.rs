//! Chat command - stream one generation request.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use tokio_stream::StreamExt;

use pagesmith_core::StreamEvent;

use super::CommonArgs;

#[derive(Args)]
pub struct ChatArgs {
    /// Target id
    target: i64,

    /// Message to send
    message: String,

    #[command(flatten)]
    common: CommonArgs,
}

pub async fn execute(args: ChatArgs) -> Result<()> {
    let service = super::build_service(&args.common)?;

    let mut stream = service
        .chat_to_gen_code(args.target, &args.message, args.common.owner)
        .await?;

    let mut stdout = std::io::stdout();
    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::Chunk { content } => {
                print!("{}", content);
                stdout.flush()?;
            }
            StreamEvent::FileWritten { path } => {
                println!("📄 wrote {}", path);
            }
            StreamEvent::Done { output_dir } => {
                println!();
                println!("✅ Generation saved to {}", output_dir);
            }
            StreamEvent::Error { message } => {
                println!();
                anyhow::bail!("generation failed: {}", message);
            }
        }
    }

    Ok(())
}
