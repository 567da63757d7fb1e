//! Destroy command - Destroy a role.

use anyhow::Result;
use clap::Args;

use tfspec_harness::DestroyOutcome;

use super::{Cli, RoleArgs};

#[derive(Args)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub role: RoleArgs,

    /// Fail when Terraform reports a destroy failure
    #[arg(long)]
    pub no_force: bool,
}

pub async fn execute(cli: &Cli, args: &DestroyArgs) -> Result<()> {
    let mut harness = cli.open_harness().await?;
    let role = args.role.role();

    let outcome = harness
        .destroy_for(&role, args.role.overrides()?, !args.no_force)
        .await?;

    if !cli.quiet {
        match outcome {
            DestroyOutcome::Destroyed => println!("✅ Role {} destroyed", role),
            DestroyOutcome::AlreadyAbsent => println!("✅ Role {} has nothing to destroy", role),
            DestroyOutcome::FailureIgnored {
                exit_code: Some(exit_code),
            } => println!(
                "⚠️  Destroy of role {} failed (exit {}); resources may remain",
                role, exit_code
            ),
            DestroyOutcome::FailureIgnored { exit_code: None } => println!(
                "⚠️  Destroy of role {} did not complete; resources may remain",
                role
            ),
        }
    }
    Ok(())
}
