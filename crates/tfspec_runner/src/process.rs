//! Local process runner.
//!
//! Spawns the tool directly on the host, capturing stdout and stderr on
//! separate reader threads so neither pipe can fill up and stall the child.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::config::{Invocation, RunConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult};

/// A line of tool output.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: chrono::DateTime<Utc>,
    pub stream: LogStream,
    pub message: String,
}

/// Log stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Log handler callback type.
pub type LogHandler = Arc<dyn Fn(LogLine) + Send + Sync>;

/// Process runner options.
#[derive(Debug, Clone)]
pub struct ProcessRunnerOptions {
    /// Dry-run mode (log commands without executing)
    pub dry_run: bool,
    /// CI mode (prefix streamed lines with timestamps)
    pub ci_mode: bool,
}

impl Default for ProcessRunnerOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            ci_mode: std::env::var("CI").is_ok(),
        }
    }
}

impl ProcessRunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn ci_mode(mut self) -> Self {
        self.ci_mode = true;
        self
    }
}

/// Runs tools as local child processes.
#[derive(Clone, Default)]
pub struct ProcessRunner {
    options: ProcessRunnerOptions,
    log_handler: Option<LogHandler>,
}

impl ProcessRunner {
    pub fn new(options: ProcessRunnerOptions) -> Self {
        Self {
            options,
            log_handler: None,
        }
    }

    /// Set a log handler that receives streamed lines.
    pub fn with_log_handler(mut self, handler: LogHandler) -> Self {
        self.log_handler = Some(handler);
        self
    }

    /// Check if dry-run mode is enabled.
    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    fn build_command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(dir) = &invocation.workdir {
            cmd.current_dir(dir);
        }
        cmd.envs(&invocation.env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    fn spawn_reader<R: Read + Send + 'static>(
        reader: R,
        stream: LogStream,
        stream_logs: bool,
        ci_mode: bool,
        log_handler: Option<LogHandler>,
    ) -> JoinHandle<String> {
        std::thread::spawn(move || {
            let mut reader = BufReader::new(reader);
            let mut output = String::new();
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!("Stopped reading {}: {}", stream, e);
                        break;
                    }
                }

                // Tool output is not guaranteed to be UTF-8; keep reading past bad bytes.
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                output.push_str(&line);
                output.push('\n');
                if stream_logs {
                    let log_line = LogLine {
                        timestamp: Utc::now(),
                        stream,
                        message: line,
                    };
                    if ci_mode {
                        debug!(
                            "[{}] [{}] {}",
                            log_line.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                            log_line.stream,
                            log_line.message
                        );
                    }
                    if let Some(handler) = &log_handler {
                        handler(log_line);
                    }
                }
            }
            output
        })
    }

    /// Execute the invocation, blocking until it exits or times out.
    fn execute_blocking(
        invocation: &Invocation,
        run_config: &RunConfig,
        ci_mode: bool,
        log_handler: Option<LogHandler>,
    ) -> RunnerResult<(i64, String, String)> {
        let mut child = Self::build_command(invocation).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunnerError::ToolNotAvailable(invocation.program.clone())
            } else {
                RunnerError::ExecutionFailed(format!(
                    "Failed to spawn {}: {}",
                    invocation.program, e
                ))
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stderr was not captured".to_string()))?;

        let stdout_handle = Self::spawn_reader(
            stdout,
            LogStream::Stdout,
            run_config.stream_logs,
            ci_mode,
            log_handler.clone(),
        );
        let stderr_handle = Self::spawn_reader(
            stderr,
            LogStream::Stderr,
            run_config.stream_logs,
            ci_mode,
            log_handler,
        );

        let status = if run_config.timeout_seconds > 0 {
            let timeout = Duration::from_secs(run_config.timeout_seconds);
            let start = Instant::now();
            loop {
                match child.try_wait() {
                    Ok(Some(status)) => break status,
                    Ok(None) => {
                        if start.elapsed() > timeout {
                            let _ = child.kill();
                            let _ = child.wait();
                            return Err(RunnerError::Timeout(run_config.timeout_seconds));
                        }
                        std::thread::sleep(Duration::from_millis(100));
                    }
                    Err(e) => {
                        return Err(RunnerError::ExecutionFailed(format!(
                            "Failed to wait for process: {}",
                            e
                        )));
                    }
                }
            }
        } else {
            child.wait().map_err(|e| {
                RunnerError::ExecutionFailed(format!("Failed to wait for process: {}", e))
            })?
        };

        let stdout_output = stdout_handle
            .join()
            .map_err(|_| RunnerError::ExecutionFailed("stdout reader thread panicked".to_string()))?;
        let stderr_output = stderr_handle
            .join()
            .map_err(|_| RunnerError::ExecutionFailed("stderr reader thread panicked".to_string()))?;

        let exit_code = status.code().map_or(-1, i64::from);

        Ok((exit_code, stdout_output, stderr_output))
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn is_available(&self, program: &str) -> RunnerResult<bool> {
        let program = program.to_string();
        let available = tokio::task::spawn_blocking(move || {
            Command::new(program)
                .arg("version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        })
        .await
        .map_err(|e| RunnerError::ExecutionFailed(e.to_string()))?;
        Ok(available)
    }

    async fn run(
        &self,
        invocation: &Invocation,
        run_config: &RunConfig,
    ) -> RunnerResult<ExecutionResult> {
        let command_line = invocation.command_line();
        let started_at = Utc::now();

        if self.options.dry_run {
            info!("[DRY-RUN] {}", command_line);
            return Ok(ExecutionResult {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                started_at,
                finished_at: started_at,
                duration_ms: 0,
            });
        }

        debug!("Executing: {}", command_line);

        let owned_invocation = invocation.clone();
        let owned_config = run_config.clone();
        let ci_mode = self.options.ci_mode;
        let log_handler = self.log_handler.clone();
        let start = Instant::now();

        let (exit_code, stdout, stderr) = tokio::task::spawn_blocking(move || {
            Self::execute_blocking(&owned_invocation, &owned_config, ci_mode, log_handler)
        })
        .await
        .map_err(|e| RunnerError::ExecutionFailed(e.to_string()))??;

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            "{} exited with {} after {}ms",
            invocation.program, exit_code, duration_ms
        );

        Ok(ExecutionResult {
            exit_code,
            stdout,
            stderr,
            started_at,
            finished_at: Utc::now(),
            duration_ms,
        })
    }
}
