//! Error types for the harness.

use thiserror::Error;

use crate::configuration::Role;

/// Result type alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while orchestrating a module under test.
///
/// Tool failures carry the exit status and the raw captured output so a
/// failing test shows what Terraform said.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Unknown role: {0}")]
    UnknownRole(Role),

    #[error("Terraform init failed for role {role} (exit {exit_code}):\n{output}")]
    Init {
        role: Role,
        exit_code: i64,
        output: String,
    },

    #[error("Terraform plan failed for role {role} (exit {exit_code}):\n{output}")]
    Plan {
        role: Role,
        exit_code: i64,
        output: String,
    },

    #[error("Terraform apply failed for role {role} (exit {exit_code}):\n{output}")]
    Provision {
        role: Role,
        exit_code: i64,
        output: String,
    },

    #[error("Terraform destroy failed for role {role} (exit {exit_code}):\n{output}")]
    Destroy {
        role: Role,
        exit_code: i64,
        output: String,
    },

    #[error("Output {name} unavailable for role {role}: {reason}")]
    OutputUnavailable {
        role: Role,
        name: String,
        reason: String,
    },

    #[error("Role {0} is already provisioned; destroy or reprovision it instead")]
    AlreadyLive(Role),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Runner error: {0}")]
    Runner(#[from] tfspec_runner::RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Exit status and captured output, for errors raised by a failed tool run.
    pub fn tool_failure(&self) -> Option<(i64, &str)> {
        match self {
            Self::Init {
                exit_code, output, ..
            }
            | Self::Plan {
                exit_code, output, ..
            }
            | Self::Provision {
                exit_code, output, ..
            }
            | Self::Destroy {
                exit_code, output, ..
            } => Some((*exit_code, output.as_str())),
            _ => None,
        }
    }
}
