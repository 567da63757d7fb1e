//! Terraform lifecycle executor.
//!
//! Runs `init`, `plan`, `apply`, `destroy` and `output` for a role's module
//! through a [`CommandRunner`]. Variables go to Terraform through a generated
//! JSON var file; each role keeps its own local state file.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use tfspec_runner::{CommandRunner, ExecutionResult, Invocation, RunConfig};

use crate::configuration::{Configuration, Role, RoleDefinition};
use crate::error::{HarnessError, HarnessResult};
use crate::settings::HarnessSettings;

/// Terraform operations the executor issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Init,
    Plan,
    Apply,
    Destroy,
    Output,
}

impl Operation {
    pub fn subcommand(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
            Self::Output => "output",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.subcommand())
    }
}

/// Captured output of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanResult {
    pub role: Role,
    pub exit_code: i64,
    pub output: String,
}

impl PlanResult {
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.output.contains(needle)
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }

    /// Whether some line shows `attribute` changing from `from` to `to`,
    /// e.g. `~ mfa_delete = false -> true`. Terraform pads attribute names to
    /// align the `=` signs, so runs of whitespace are ignored.
    pub fn has_transition(&self, attribute: &str, from: &str, to: &str) -> bool {
        let expected = format!("{} = {} -> {}", attribute, from, to);
        self.lines().any(|line| {
            let normalized = line.split_whitespace().collect::<Vec<_>>().join(" ");
            normalized.contains(&expected)
        })
    }
}

/// How a destroy call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// Terraform destroyed the instance.
    Destroyed,
    /// The state recorded no resources, so there was nothing to destroy.
    AlreadyAbsent,
    /// Terraform failed but the destroy was forced; resources may remain.
    /// `exit_code` is `None` when Terraform never ran to completion.
    FailureIgnored { exit_code: Option<i64> },
}

/// Runs Terraform for role configurations.
pub struct LifecycleExecutor {
    runner: Arc<dyn CommandRunner>,
    settings: HarnessSettings,
    initialized: Mutex<HashSet<Role>>,
}

impl LifecycleExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: HarnessSettings) -> Self {
        Self {
            runner,
            settings,
            initialized: Mutex::new(HashSet::new()),
        }
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    /// Check the configured Terraform binary can be executed.
    pub async fn is_available(&self) -> HarnessResult<bool> {
        Ok(self
            .runner
            .is_available(&self.settings.terraform_binary)
            .await?)
    }

    /// Plan the configuration.
    ///
    /// The captured plan text is written to `sink` when one is given and is
    /// always returned, or attached to the error when the plan fails.
    pub async fn plan(
        &self,
        definition: &RoleDefinition,
        cfg: &Configuration,
        sink: Option<&mut dyn Write>,
    ) -> HarnessResult<PlanResult> {
        let role = cfg.role();
        info!("Planning role {}", role);
        self.ensure_initialized(role, definition).await?;

        let var_file = self.write_var_file(cfg)?;
        let state = self.state_path(role, definition)?;
        let args = vec![
            Operation::Plan.subcommand().to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
            format!("-state={}", state.display()),
            format!("-var-file={}", var_file.display()),
        ];
        let result = self.execute(definition, args).await?;
        let output = result.combined_output();

        if let Some(sink) = sink {
            sink.write_all(output.as_bytes())?;
            sink.flush()?;
        }

        if !result.success() {
            return Err(HarnessError::Plan {
                role: role.clone(),
                exit_code: result.exit_code,
                output,
            });
        }

        Ok(PlanResult {
            role: role.clone(),
            exit_code: result.exit_code,
            output,
        })
    }

    /// Apply the configuration. A failed apply may leave resources behind.
    pub async fn provision(
        &self,
        definition: &RoleDefinition,
        cfg: &Configuration,
    ) -> HarnessResult<()> {
        let role = cfg.role();
        info!("Provisioning role {}", role);
        self.ensure_initialized(role, definition).await?;

        let var_file = self.write_var_file(cfg)?;
        let state = self.state_path(role, definition)?;
        let args = vec![
            Operation::Apply.subcommand().to_string(),
            "-auto-approve".to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
            format!("-state={}", state.display()),
            format!("-var-file={}", var_file.display()),
        ];
        let result = self.execute(definition, args).await?;

        if !result.success() {
            return Err(HarnessError::Provision {
                role: role.clone(),
                exit_code: result.exit_code,
                output: result.combined_output(),
            });
        }
        Ok(())
    }

    /// Destroy the instance.
    ///
    /// An instance whose state records no resources is already gone and
    /// Terraform is not invoked. With `force`, a failing `init` or `destroy`,
    /// or a runner error, is reported as [`DestroyOutcome::FailureIgnored`]
    /// instead of an error.
    pub async fn destroy(
        &self,
        definition: &RoleDefinition,
        cfg: &Configuration,
        force: bool,
    ) -> HarnessResult<DestroyOutcome> {
        let role = cfg.role();
        if !self.has_resources(role, definition)? {
            debug!("Role {} has no resources in state, nothing to destroy", role);
            return Ok(DestroyOutcome::AlreadyAbsent);
        }

        info!("Destroying role {}{}", role, if force { " (forced)" } else { "" });
        let result = match self.run_destroy(definition, cfg).await {
            Ok(result) => result,
            Err(e @ (HarnessError::Init { .. } | HarnessError::Runner(_))) if force => {
                debug!("Ignoring failed forced destroy of role {}: {}", role, e);
                return Ok(DestroyOutcome::FailureIgnored {
                    exit_code: e.tool_failure().map(|(exit_code, _)| exit_code),
                });
            }
            Err(e) => return Err(e),
        };

        if result.success() {
            return Ok(DestroyOutcome::Destroyed);
        }
        if force {
            debug!(
                "Ignoring failed forced destroy of role {} (exit {})",
                role, result.exit_code
            );
            return Ok(DestroyOutcome::FailureIgnored {
                exit_code: Some(result.exit_code),
            });
        }
        Err(HarnessError::Destroy {
            role: role.clone(),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }

    /// Forced destroy followed by provision. Not atomic: provision runs even
    /// when the destroy fails.
    pub async fn reprovision(
        &self,
        definition: &RoleDefinition,
        cfg: &Configuration,
    ) -> HarnessResult<()> {
        if let Err(e) = self.destroy(definition, cfg, true).await {
            warn!("Destroy before reprovision of role {} failed: {}", cfg.role(), e);
        }
        self.provision(definition, cfg).await
    }

    /// Query a published output from the role's state.
    ///
    /// String outputs come back unquoted; other values come back as compact
    /// JSON text.
    pub async fn output(
        &self,
        role: &Role,
        definition: &RoleDefinition,
        name: &str,
    ) -> HarnessResult<String> {
        let state = self.state_path(role, definition)?;
        let args = vec![
            Operation::Output.subcommand().to_string(),
            "-no-color".to_string(),
            "-json".to_string(),
            format!("-state={}", state.display()),
            name.to_string(),
        ];
        let result = self.execute(definition, args).await?;

        let unavailable = |reason: String| HarnessError::OutputUnavailable {
            role: role.clone(),
            name: name.to_string(),
            reason,
        };

        if !result.success() {
            return Err(unavailable(result.combined_output().trim().to_string()));
        }

        let value: Value = serde_json::from_str(result.stdout.trim())
            .map_err(|e| unavailable(format!("unreadable output value: {}", e)))?;
        match value {
            Value::String(s) => Ok(s),
            Value::Null => Err(unavailable("output is null".to_string())),
            other => Ok(other.to_string()),
        }
    }

    /// Whether the role's state file records any resources.
    pub fn has_resources(&self, role: &Role, definition: &RoleDefinition) -> HarnessResult<bool> {
        let path = self.settings.state_file(role, definition);
        if !path.exists() {
            return Ok(false);
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(false);
        }
        let state: Value = serde_json::from_str(&content)?;
        Ok(state
            .get("resources")
            .and_then(Value::as_array)
            .is_some_and(|resources| !resources.is_empty()))
    }

    async fn run_destroy(
        &self,
        definition: &RoleDefinition,
        cfg: &Configuration,
    ) -> HarnessResult<ExecutionResult> {
        let role = cfg.role();
        self.ensure_initialized(role, definition).await?;

        let var_file = self.write_var_file(cfg)?;
        let state = self.state_path(role, definition)?;
        let args = vec![
            Operation::Destroy.subcommand().to_string(),
            "-auto-approve".to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
            format!("-state={}", state.display()),
            format!("-var-file={}", var_file.display()),
        ];
        self.execute(definition, args).await
    }

    async fn ensure_initialized(
        &self,
        role: &Role,
        definition: &RoleDefinition,
    ) -> HarnessResult<()> {
        if self.initialized.lock().contains(role) {
            return Ok(());
        }

        info!("Initializing module for role {} in {:?}", role, definition.source);
        let args = vec![
            Operation::Init.subcommand().to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
        ];
        let result = self.execute(definition, args).await?;
        if !result.success() {
            return Err(HarnessError::Init {
                role: role.clone(),
                exit_code: result.exit_code,
                output: result.combined_output(),
            });
        }

        self.initialized.lock().insert(role.clone());
        Ok(())
    }

    async fn execute(
        &self,
        definition: &RoleDefinition,
        args: Vec<String>,
    ) -> HarnessResult<ExecutionResult> {
        let source = absolute(&definition.source)?;
        let invocation = Invocation::new(&self.settings.terraform_binary)
            .arg(format!("-chdir={}", source.display()))
            .args(args)
            .env("TF_IN_AUTOMATION", "true")
            .env("TF_INPUT", "0");

        let run_config = RunConfig::default()
            .timeout(self.settings.timeout_seconds)
            .stream_logs(self.settings.stream_logs);

        Ok(self.runner.run(&invocation, &run_config).await?)
    }

    fn write_var_file(&self, cfg: &Configuration) -> HarnessResult<PathBuf> {
        let path = absolute(&self.settings.var_file(cfg.role()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, cfg.vars().to_tfvars_json()?)?;
        debug!("Wrote {} variables to {:?}", cfg.vars().len(), path);
        Ok(path)
    }

    fn state_path(&self, role: &Role, definition: &RoleDefinition) -> HarnessResult<PathBuf> {
        Ok(absolute(&self.settings.state_file(role, definition))?)
    }
}

/// Terraform resolves paths after `-chdir`, so everything handed to it is absolute.
fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
