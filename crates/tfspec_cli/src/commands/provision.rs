//! Provision and reprovision commands - Apply a role.

use anyhow::Result;
use clap::Args;

use super::{Cli, RoleArgs};

#[derive(Args)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub role: RoleArgs,
}

pub async fn execute(cli: &Cli, args: &ProvisionArgs) -> Result<()> {
    let mut harness = cli.open_harness().await?;
    let role = args.role.role();

    harness.provision_for(&role, args.role.overrides()?).await?;

    if !cli.quiet {
        println!("✅ Role {} provisioned", role);
    }
    Ok(())
}

pub async fn execute_reprovision(cli: &Cli, args: &ProvisionArgs) -> Result<()> {
    let mut harness = cli.open_harness().await?;
    let role = args.role.role();

    harness.reprovision_for(&role, args.role.overrides()?).await?;

    if !cli.quiet {
        println!("✅ Role {} reprovisioned", role);
    }
    Ok(())
}
