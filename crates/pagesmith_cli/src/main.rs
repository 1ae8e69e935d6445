//! pagesmith CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments / not found
//! - 3: Validation failure
//! - 4: Generation backend error
//! - 5: Build or deploy failure

use std::process::ExitCode;

use clap::Parser;
use pagesmith_core::CoreError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const BACKEND_ERROR: u8 = 4;
    pub const BUILD_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive("pagesmith=info".parse().unwrap())
                .add_directive("warn".parse().unwrap()),
        )
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Create(args) => commands::create::execute(args).await,
        Commands::Chat(args) => commands::chat::execute(args).await,
        Commands::Deploy(args) => commands::deploy::execute(args).await,
        Commands::History(args) => commands::history::execute(args).await,
        Commands::List(args) => commands::list::execute(args).await,
        Commands::Delete(args) => commands::delete::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<CoreError>() {
        Some(CoreError::NotFound(_)) | Some(CoreError::Unauthorized(_)) => {
            ExitCodes::INVALID_ARGS
        }
        Some(CoreError::Validation(_)) => ExitCodes::VALIDATION_FAILURE,
        Some(CoreError::Codegen(_)) => ExitCodes::BACKEND_ERROR,
        Some(CoreError::Deploy(_)) => ExitCodes::BUILD_ERROR,
        _ => ExitCodes::GENERAL_ERROR,
    }
}
