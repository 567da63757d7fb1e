//! tfspec CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Plan failure
//! - 4: Provision or destroy failure
//! - 5: Output unavailable

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tfspec_harness::HarnessError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const PLAN_FAILURE: u8 = 3;
    pub const LIFECYCLE_FAILURE: u8 = 4;
    pub const OUTPUT_UNAVAILABLE: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "tfspec=debug"
    } else if cli.quiet {
        "tfspec=warn"
    } else {
        "tfspec=info"
    };
    let mut filter = EnvFilter::from_default_env();
    for directive in [default_level, "warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    // A subscriber may already be installed; keep it.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let result = match &cli.command {
        Commands::Vars(args) => commands::vars::execute(&cli, args).await,
        Commands::Plan(args) => commands::plan::execute(&cli, args).await,
        Commands::Provision(args) => commands::provision::execute(&cli, args).await,
        Commands::Destroy(args) => commands::destroy::execute(&cli, args).await,
        Commands::Reprovision(args) => commands::provision::execute_reprovision(&cli, args).await,
        Commands::Output(args) => commands::output::execute(&cli, args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

/// Map an error to its exit code.
fn categorize_error(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<HarnessError>() {
        Some(HarnessError::Plan { .. }) => ExitCodes::PLAN_FAILURE,
        Some(
            HarnessError::Init { .. }
            | HarnessError::Provision { .. }
            | HarnessError::Destroy { .. }
            | HarnessError::AlreadyLive(_),
        ) => ExitCodes::LIFECYCLE_FAILURE,
        Some(HarnessError::OutputUnavailable { .. }) => ExitCodes::OUTPUT_UNAVAILABLE,
        Some(HarnessError::UnknownRole(_) | HarnessError::InvalidConfig(_)) => {
            ExitCodes::INVALID_ARGS
        }
        Some(_) => ExitCodes::GENERAL_ERROR,
        None if e.to_string().contains("invalid argument") => ExitCodes::INVALID_ARGS,
        None => ExitCodes::GENERAL_ERROR,
    }
}
