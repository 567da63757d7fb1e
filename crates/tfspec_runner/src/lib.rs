//! # tfspec_runner
//!
//! Process execution layer for the tfspec Terraform harness.
//!
//! This crate runs external tools (Terraform, in practice) to completion and
//! captures their output, behind a trait so the orchestration layer can be
//! tested without the real binary.
//!
//! # Features
//!
//! - **Process Runner**: local child processes with per-stream capture
//! - **Timeouts**: optional kill after a deadline
//! - **Dry-Run Mode**: log commands without executing them
//! - **Log Streaming**: forward output lines to a handler as they arrive
//! - **Mock Runner**: scripted responses for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use tfspec_runner::{CommandRunner, Invocation, ProcessRunner, ProcessRunnerOptions, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = ProcessRunner::new(ProcessRunnerOptions::default());
//!
//!     let invocation = Invocation::new("terraform")
//!         .args(["-chdir=spec/infra/harness", "init", "-input=false"]);
//!
//!     let result = runner.run(&invocation, &RunConfig::default()).await?;
//!     println!("Exit code: {}", result.exit_code);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod mock;
pub mod process;
pub mod runner;

pub use config::{Invocation, RunConfig};
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockResponse, MockRunner};
pub use process::{LogHandler, LogLine, LogStream, ProcessRunner, ProcessRunnerOptions};
pub use runner::{CommandRunner, ExecutionResult};
