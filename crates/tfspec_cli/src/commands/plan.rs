//! Plan command - Plan a role and print the plan.

use std::io;

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::{Cli, RoleArgs};

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub role: RoleArgs,
}

pub async fn execute(cli: &Cli, args: &PlanArgs) -> Result<()> {
    let mut harness = cli.open_harness().await?;
    let role = args.role.role();
    info!("Planning role {}", role);

    let stdout = io::stdout();
    let mut sink = stdout.lock();
    harness
        .plan_for(&role, args.role.overrides()?, Some(&mut sink))
        .await?;
    Ok(())
}
