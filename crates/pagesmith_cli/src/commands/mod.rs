//! CLI command definitions.
//!
//! Each subcommand maps to one operation of the target service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use pagesmith_codegen::{LlmClient, LlmLayoutRouter};
use pagesmith_core::{PagesmithConfig, TargetService};
use pagesmith_deploy::{CommandScreenshotter, LocalObjectStore, ScreenshotService};

pub mod chat;
pub mod create;
pub mod delete;
pub mod deploy;
pub mod history;
pub mod list;

/// pagesmith - prompt-to-deployed-site generation
#[derive(Parser)]
#[command(name = "pagesmith")]
#[command(version, about = "pagesmith - turn a prompt into a deployed site")]
#[command(long_about = r#"
pagesmith maintains a conversational generation session per target, streams
generated code from an LLM backend, materializes it to disk, and deploys
the result to a served location.

WORKFLOWS:
  create   → Create a target (the layout is classified from the prompt)
  chat     → Send a message and stream the generated code
  deploy   → Build (when needed) and publish the target's output
  history  → Show a target's conversation history
  list     → List targets
  delete   → Delete a target and its history

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments / not found
  3 - Validation failure
  4 - Generation backend error
  5 - Build or deploy failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new generation target from an initial prompt
    Create(create::CreateArgs),

    /// Send a message to a target and stream the generation
    Chat(chat::ChatArgs),

    /// Build and publish a target's generated output
    Deploy(deploy::DeployArgs),

    /// Show a target's conversation history
    History(history::HistoryArgs),

    /// List targets
    List(list::ListArgs),

    /// Delete a target and its conversation history
    Delete(delete::DeleteArgs),
}

/// Options shared by every subcommand.
#[derive(clap::Args)]
pub struct CommonArgs {
    /// Configuration file
    #[arg(long, default_value = "pagesmith.toml")]
    pub config: PathBuf,

    /// Acting owner id
    #[arg(long, default_value_t = 1)]
    pub owner: i64,
}

/// Build the target service from configuration and environment.
pub(crate) fn build_service(common: &CommonArgs) -> Result<TargetService> {
    let config = PagesmithConfig::load_or_default(&common.config)?;

    let client = Arc::new(LlmClient::from_env()?);
    let router = Arc::new(LlmLayoutRouter::new(LlmClient::from_env()?));

    let screenshots = Arc::new(ScreenshotService::new(
        Box::new(CommandScreenshotter::chromium()),
        Box::new(LocalObjectStore::new(
            &config.screenshot_root,
            config.screenshot_base_url.clone(),
        )),
    ));

    Ok(TargetService::new(config, client, router, Some(screenshots)))
}
