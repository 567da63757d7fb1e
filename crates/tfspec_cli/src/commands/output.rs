//! Output command - Print a published output of a live role.

use anyhow::Result;
use clap::Args;

use super::Cli;

#[derive(Args)]
pub struct OutputArgs {
    /// Output name
    pub name: String,

    /// Role publishing the output
    #[arg(short, long, default_value = tfspec_harness::Role::HARNESS)]
    pub role: String,
}

pub async fn execute(cli: &Cli, args: &OutputArgs) -> Result<()> {
    let mut harness = cli.open_harness().await?;
    let value = harness.output_for(args.role.as_str(), &args.name).await?;
    println!("{}", value);
    Ok(())
}
