//! Subprocess execution shared by command based checks and the ARP table dump.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Empty command")]
    EmptyCommand,
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to wait for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{program}' did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

pub type Result<T> = std::result::Result<T, ExecError>;

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Spawn `argv`, drain both output streams and wait for the exit status.
///
/// The child is killed if it has not exited within `timeout`.
pub async fn run(argv: &[String], timeout: Duration) -> Result<ExecOutput> {
    let (program, args) = argv.split_first().ok_or(ExecError::EmptyCommand)?;

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: program.clone(),
            source,
        })?;

    // Dropping the pending future on timeout drops the child, which kills it.
    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| ExecError::Timeout {
            program: program.clone(),
            timeout,
        })?
        .map_err(|source| ExecError::Wait {
            program: program.clone(),
            source,
        })?;

    Ok(ExecOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Runs commands one at a time and reports success as a boolean.
///
/// Every check that spawns processes owns one runner, so concurrent calls on
/// the same check queue up behind each other while unrelated checks run
/// independently. A process that cannot be spawned is reported the same way
/// as one that exits non-zero.
#[derive(Debug)]
pub struct CommandRunner {
    lock: Mutex<()>,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn execute(&self, argv: &[String]) -> bool {
        let _guard = self.lock.lock().await;
        debug!(?argv, "exec");

        match run(argv, self.timeout).await {
            Ok(output) => {
                debug!(code = ?output.code, "exit");
                if !output.success() && !output.stderr.trim().is_empty() {
                    debug!(stderr = %output.stderr.trim(), "Command reported errors");
                }
                output.success()
            }
            Err(e) => {
                warn!(error = %e, "Command could not be executed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn run_captures_both_streams() {
        let output = run(
            &argv(&["sh", "-c", "echo out; echo err >&2; exit 3"]),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn run_rejects_empty_command() {
        let err = run(&[], Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ExecError::EmptyCommand));
    }

    #[tokio::test]
    async fn run_reports_missing_binary() {
        let err = run(&argv(&["/nonexistent/hostwatch-test"]), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[tokio::test]
    async fn run_times_out() {
        let err = run(&argv(&["sleep", "5"]), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
    }

    #[tokio::test]
    async fn execute_maps_exit_status() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        assert!(runner.execute(&argv(&["true"])).await);
        assert!(!runner.execute(&argv(&["false"])).await);
        assert!(!runner.execute(&argv(&["/nonexistent/hostwatch-test"])).await);
        assert!(!runner.execute(&[]).await);
    }

    #[tokio::test]
    async fn execute_serializes_calls() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        let cmd = argv(&["sleep", "0.2"]);

        let started = std::time::Instant::now();
        let (a, b) = tokio::join!(runner.execute(&cmd), runner.execute(&cmd));

        assert!(a && b);
        assert!(started.elapsed() >= Duration::from_millis(400));
    }
}
