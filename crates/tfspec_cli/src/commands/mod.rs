//! CLI command definitions.
//!
//! Each subcommand maps to one harness lifecycle call for a single role.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use tfspec_harness::{bucket, Harness, HarnessConfig, HarnessSettings, Overrides, Role};
use tfspec_harness::HarnessError;
use tfspec_runner::{ProcessRunner, ProcessRunnerOptions, RunnerError};

pub mod destroy;
pub mod output;
pub mod plan;
pub mod provision;
pub mod vars;

/// Default configuration file, used when present.
pub const DEFAULT_CONFIG_FILE: &str = "tfspec.yaml";

/// tfspec - drive Terraform modules under test
#[derive(Parser)]
#[command(name = "tfspec")]
#[command(version, about = "tfspec - drive Terraform modules under test")]
#[command(long_about = r#"
tfspec runs Terraform modules under test through their lifecycle, one role
at a time, with per-role default variables and command line overrides.

COMMANDS:
  vars         → Show a role's effective variables
  plan         → Plan a role and print the plan
  provision    → Apply a role
  destroy      → Destroy a role (best effort unless --no-force)
  reprovision  → Destroy then apply a role
  output       → Print a published output of a live role

Without tfspec.yaml the built-in bucket module roles (harness,
prerequisites) are used, sourced from --infra-dir.

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Plan failure
  4 - Provision or destroy failure
  5 - Output unavailable
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Harness configuration file
    #[arg(short, long, global = true, env = "TFSPEC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Module directory for the built-in bucket roles
    #[arg(long, global = true, default_value = "spec/infra")]
    pub infra_dir: PathBuf,

    /// Deployment identifier for the built-in bucket roles
    #[arg(long, global = true, env = "TFSPEC_DEPLOYMENT_IDENTIFIER", default_value = "local")]
    pub deployment_identifier: String,

    /// Log commands instead of running Terraform
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Terraform binary to run (overrides configuration and environment)
    #[arg(long, global = true)]
    pub terraform_binary: Option<String>,

    /// Seconds before a Terraform call is killed (0 = no limit)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show a role's effective variables
    Vars(vars::VarsArgs),

    /// Plan a role
    Plan(plan::PlanArgs),

    /// Apply a role
    Provision(provision::ProvisionArgs),

    /// Destroy a role
    Destroy(destroy::DestroyArgs),

    /// Destroy, then apply a role
    Reprovision(provision::ProvisionArgs),

    /// Print an output of a live role
    Output(output::OutputArgs),
}

/// Role selection and variable overrides shared by the lifecycle commands.
#[derive(Args, Debug, Clone)]
pub struct RoleArgs {
    /// Role to act on
    #[arg(short, long, default_value = Role::HARNESS)]
    pub role: String,

    /// Override a variable (name=value; JSON values are parsed)
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Remove a variable so the module default applies
    #[arg(long = "unset", value_name = "NAME")]
    pub unset: Vec<String>,
}

impl RoleArgs {
    pub fn role(&self) -> Role {
        Role::new(self.role.as_str())
    }

    pub fn overrides(&self) -> Result<Overrides> {
        let mut overrides = Overrides::new();
        for assignment in &self.vars {
            let (name, value) = Overrides::parse_assignment(assignment).with_context(|| {
                format!("invalid argument --var {:?}, expected NAME=VALUE", assignment)
            })?;
            overrides = overrides.set(name, value);
        }
        for name in &self.unset {
            overrides = overrides.unset(name.as_str());
        }
        Ok(overrides)
    }
}

impl Cli {
    /// Load the harness configuration: an explicit or default config file,
    /// else the built-in bucket module roles. `TFSPEC_*` environment
    /// variables override settings either way, and command line flags
    /// override both.
    pub fn load_config(&self) -> Result<HarnessConfig> {
        let file = match &self.config {
            Some(path) => Some(path.clone()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };

        let mut config = match file {
            Some(path) => HarnessConfig::from_yaml_file(&path)
                .with_context(|| format!("failed to load configuration {:?}", path))?,
            None => {
                debug!("No {} found, using built-in bucket module roles", DEFAULT_CONFIG_FILE);
                bucket::bucket_module_config(
                    Path::new(&self.infra_dir),
                    &self.deployment_identifier,
                    HarnessSettings::default(),
                )
            }
        };

        let mut settings = config.settings.with_env_overrides()?;
        if let Some(binary) = &self.terraform_binary {
            settings = settings.with_terraform_binary(binary.as_str());
        }
        if let Some(seconds) = self.timeout {
            settings = settings.with_timeout(seconds);
        }
        config.settings = settings;
        Ok(config)
    }

    /// Open a harness over a local process runner. Outside dry runs the
    /// Terraform binary must be executable.
    pub async fn open_harness(&self) -> Result<Harness> {
        let config = self.load_config()?;
        let mut options = ProcessRunnerOptions::default();
        if self.dry_run {
            options = options.dry_run();
        }
        let harness = Harness::open(config, Arc::new(ProcessRunner::new(options)))?;

        if !self.dry_run && !harness.executor().is_available().await? {
            let binary = harness.executor().settings().terraform_binary.clone();
            return Err(HarnessError::Runner(RunnerError::ToolNotAvailable(binary)).into());
        }
        Ok(harness)
    }
}
