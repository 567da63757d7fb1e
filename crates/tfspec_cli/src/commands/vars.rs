//! Vars command - Show a role's effective variables.

use anyhow::Result;
use clap::Args;

use super::{Cli, RoleArgs};

#[derive(Args)]
pub struct VarsArgs {
    #[command(flatten)]
    pub role: RoleArgs,

    /// Print the variables as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(cli: &Cli, args: &VarsArgs) -> Result<()> {
    let config = cli.load_config()?;
    let registry = config.registry();
    let role = args.role.role();
    let overrides = args.role.overrides()?;
    let cfg = registry.for_role(&role, Some(&overrides))?;

    if args.json {
        println!("{}", cfg.vars().to_tfvars_json()?);
        return Ok(());
    }

    let definition = registry.get_required(&role)?;
    println!("📋 Variables for role {} ({})", role, definition.source.display());
    for (name, value) in cfg.vars().iter() {
        let marker = if definition.accepts.is_empty() || definition.var_spec(name).is_some() {
            " "
        } else {
            "?"
        };
        println!("  {} {} = {}", marker, name, value);
    }
    Ok(())
}
