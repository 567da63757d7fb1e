//! Roles, role definitions and configurations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::vars::{VarSpec, Vars};

/// Names one independently managed instance of the module under test.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub const HARNESS: &'static str = "harness";
    pub const PREREQUISITES: &'static str = "prerequisites";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The default subject role.
    pub fn harness() -> Self {
        Self::new(Self::HARNESS)
    }

    pub fn prerequisites() -> Self {
        Self::new(Self::PREREQUISITES)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Static description of a role: where its module lives and what it takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Terraform root module directory
    pub source: PathBuf,
    /// State file path; `<state_dir>/<role>.tfstate` when unset
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    /// Default variables
    #[serde(default)]
    pub vars: Vars,
    /// Variables the module is known to accept
    #[serde(default)]
    pub accepts: Vec<VarSpec>,
    /// Outputs the module publishes
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl RoleDefinition {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            state_file: None,
            vars: Vars::new(),
            accepts: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    pub fn with_vars(mut self, vars: Vars) -> Self {
        self.vars = vars;
        self
    }

    pub fn accepting(mut self, spec: VarSpec) -> Self {
        self.accepts.push(spec);
        self
    }

    pub fn publishing(mut self, output: impl Into<String>) -> Self {
        self.outputs.push(output.into());
        self
    }

    /// Documentation for a variable, if the module is known to accept it.
    pub fn var_spec(&self, name: &str) -> Option<&VarSpec> {
        self.accepts.iter().find(|spec| spec.name == name)
    }

    /// Whether `name` is a known output. A definition listing no outputs
    /// places no restriction.
    pub fn publishes(&self, name: &str) -> bool {
        self.outputs.is_empty() || self.outputs.iter().any(|output| output == name)
    }
}

/// The effective variables for one role, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    role: Role,
    vars: Vars,
}

impl Configuration {
    pub fn new(role: Role, vars: Vars) -> Self {
        Self { role, vars }
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    pub fn into_vars(self) -> Vars {
        self.vars
    }
}
