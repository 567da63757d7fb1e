//! Harness settings and the YAML configuration document.
//!
//! ```yaml
//! settings:
//!   terraform_binary: terraform
//!   state_dir: state
//!   timeout_seconds: 1800
//! roles:
//!   harness:
//!     source: spec/infra/harness
//!     vars:
//!       region: eu-west-2
//!       bucket_name: my-test-bucket
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::configuration::{Role, RoleDefinition};
use crate::error::{HarnessError, HarnessResult};
use crate::registry::ConfigurationRegistry;

/// Environment variable overriding [`HarnessSettings::terraform_binary`].
pub const ENV_TERRAFORM_BINARY: &str = "TFSPEC_TERRAFORM_BINARY";
/// Environment variable overriding [`HarnessSettings::state_dir`].
pub const ENV_STATE_DIR: &str = "TFSPEC_STATE_DIR";
/// Environment variable overriding [`HarnessSettings::timeout_seconds`].
pub const ENV_TIMEOUT_SECONDS: &str = "TFSPEC_TIMEOUT_SECONDS";

/// How the harness runs Terraform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    /// Terraform executable
    pub terraform_binary: String,
    /// Directory holding state files and generated variable files
    pub state_dir: PathBuf,
    /// Per-invocation timeout in seconds (0 = none)
    pub timeout_seconds: u64,
    /// Forward Terraform output lines to the runner's log handler as they arrive
    pub stream_logs: bool,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            terraform_binary: "terraform".to_string(),
            state_dir: PathBuf::from("state"),
            timeout_seconds: 0,
            stream_logs: false,
        }
    }
}

impl HarnessSettings {
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    pub fn with_terraform_binary(mut self, binary: impl Into<String>) -> Self {
        self.terraform_binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Apply `TFSPEC_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> HarnessResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `TFSPEC_*` overrides from an arbitrary lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> HarnessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(binary) = lookup(ENV_TERRAFORM_BINARY) {
            self.terraform_binary = binary;
        }
        if let Some(dir) = lookup(ENV_STATE_DIR) {
            self.state_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECONDS) {
            self.timeout_seconds = raw.trim().parse().map_err(|_| {
                HarnessError::InvalidConfig(format!(
                    "{} must be a number of seconds, got {:?}",
                    ENV_TIMEOUT_SECONDS, raw
                ))
            })?;
        }
        Ok(self)
    }

    /// State file for a role, honouring an explicit `state_file` on the definition.
    pub fn state_file(&self, role: &Role, definition: &RoleDefinition) -> PathBuf {
        definition
            .state_file
            .clone()
            .unwrap_or_else(|| self.state_dir.join(format!("{}.tfstate", role)))
    }

    /// Generated variable file for a role.
    pub fn var_file(&self, role: &Role) -> PathBuf {
        self.state_dir.join(format!("{}.tfvars.json", role))
    }
}

/// Top-level harness configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub settings: HarnessSettings,
    #[serde(default)]
    pub roles: BTreeMap<Role, RoleDefinition>,
}

impl HarnessConfig {
    pub fn new(settings: HarnessSettings, registry: &ConfigurationRegistry) -> Self {
        Self {
            settings,
            roles: registry
                .iter()
                .map(|(role, definition)| (role.clone(), definition.clone()))
                .collect(),
        }
    }

    pub fn from_yaml_str(content: &str) -> HarnessResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        if config.roles.is_empty() {
            return Err(HarnessError::InvalidConfig(
                "configuration declares no roles".to_string(),
            ));
        }
        Ok(config)
    }

    /// Read a configuration file. Relative role sources and state paths are
    /// resolved against the file's directory.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = path.as_ref();
        debug!("Reading harness configuration from {:?}", path);

        let content = fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&content)?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.rebase(base);
        }
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        if self.settings.state_dir.is_relative() {
            self.settings.state_dir = base.join(&self.settings.state_dir);
        }
        for definition in self.roles.values_mut() {
            if definition.source.is_relative() {
                definition.source = base.join(&definition.source);
            }
            if let Some(state) = definition.state_file.as_mut().filter(|s| s.is_relative()) {
                *state = base.join(&*state);
            }
        }
    }

    /// The role definitions as a registry.
    pub fn registry(&self) -> ConfigurationRegistry {
        self.roles
            .iter()
            .fold(ConfigurationRegistry::new(), |registry, (role, definition)| {
                registry.with_role(role.clone(), definition.clone())
            })
    }
}
