//! Command runner trait and types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Invocation, RunConfig};
use crate::error::RunnerResult;

/// Result of a completed process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Exit code (-1 when the process was terminated by a signal)
    pub exit_code: i64,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Execution start time
    pub started_at: DateTime<Utc>,
    /// Execution end time
    pub finished_at: DateTime<Utc>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Check if execution was successful (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Runs external tools to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Check whether `program` can be executed.
    async fn is_available(&self, program: &str) -> RunnerResult<bool>;

    /// Run the invocation and capture its output.
    async fn run(
        &self,
        invocation: &Invocation,
        run_config: &RunConfig,
    ) -> RunnerResult<ExecutionResult>;
}
