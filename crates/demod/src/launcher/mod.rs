//! Container launcher adapter.
//!
//! The launcher is an external command with a textual contract, invoked once
//! to start a container for a session and once to tear it down. Keeping it
//! at a process boundary isolates the orchestration core from the container
//! runtime's API and keeps the runtime swappable.
//!
//! Contract:
//! - `<script> start` with `DEMO_SESSION_ID`, `DEMO_PORT` and
//!   `DEMO_EXPIRES_AT` in the environment must print a single line of the
//!   form `<container-ref>:<port>` to stdout and exit zero.
//! - `<script> cleanup <container-ref>` must exit zero on success.

mod error;

pub use error::{LaunchError, LaunchResult};

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::debug;

/// Delimiter between container ref and port in launcher output.
const OUTPUT_DELIMITER: char = ':';

/// Launcher abstraction for testability.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start a container for the session. Returns the container reference.
    async fn start(
        &self,
        session_id: &str,
        port: u16,
        expires_at: DateTime<Utc>,
    ) -> LaunchResult<String>;

    /// Tear down the container behind `container_ref`.
    async fn stop(&self, container_ref: &str) -> LaunchResult<()>;
}

/// Validate a container reference before passing it back to the shell.
///
/// Container refs are hex IDs or alphanumeric names with `-` and `_`.
fn validate_container_ref(container_ref: &str) -> LaunchResult<()> {
    if container_ref.is_empty() {
        return Err(LaunchError::InvalidInput(
            "container ref cannot be empty".to_string(),
        ));
    }

    if container_ref.len() > 128 {
        return Err(LaunchError::InvalidInput(
            "container ref exceeds maximum length".to_string(),
        ));
    }

    let valid_chars = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.';
    if !container_ref.chars().all(valid_chars) {
        return Err(LaunchError::InvalidInput(format!(
            "container ref '{}' contains invalid characters",
            container_ref
        )));
    }

    Ok(())
}

/// Parse launcher start output into a container reference.
///
/// Scans stdout for the first line containing the delimiter and takes the
/// part before it. Any other output shape is unparseable.
fn parse_start_output(stdout: &str) -> LaunchResult<String> {
    let (line, (container_ref, _port)) = stdout
        .lines()
        .find_map(|line| line.split_once(OUTPUT_DELIMITER).map(|parts| (line, parts)))
        .ok_or_else(|| LaunchError::UnparseableOutput(stdout.trim().to_string()))?;

    let container_ref = container_ref.trim();
    validate_container_ref(container_ref)
        .map_err(|_| LaunchError::UnparseableOutput(line.trim().to_string()))?;

    Ok(container_ref.to_string())
}

/// Launcher backed by an external shell script.
#[derive(Debug, Clone)]
pub struct ScriptLauncher {
    script: PathBuf,
    launch_timeout: Duration,
    stop_timeout: Duration,
}

impl ScriptLauncher {
    pub fn new(script: impl Into<PathBuf>, launch_timeout: Duration, stop_timeout: Duration) -> Self {
        Self {
            script: script.into(),
            launch_timeout,
            stop_timeout,
        }
    }

    /// Run the launcher with a deadline, collecting stdout and stderr.
    async fn run(
        &self,
        action: &str,
        timeout: Duration,
        configure: impl FnOnce(&mut Command),
    ) -> LaunchResult<std::process::Output> {
        let mut cmd = Command::new(&self.script);
        cmd.arg(action).stdout(Stdio::piped()).stderr(Stdio::piped());
        configure(&mut cmd);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| LaunchError::TimedOut {
                action: action.to_string(),
                timeout,
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LaunchError::ScriptFailed {
                action: action.to_string(),
                message: stderr.trim().to_string(),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl Launcher for ScriptLauncher {
    async fn start(
        &self,
        session_id: &str,
        port: u16,
        expires_at: DateTime<Utc>,
    ) -> LaunchResult<String> {
        debug!(session_id, port, "invoking launcher start");

        let output = self
            .run("start", self.launch_timeout, |cmd| {
                cmd.env("DEMO_SESSION_ID", session_id)
                    .env("DEMO_PORT", port.to_string())
                    .env("DEMO_EXPIRES_AT", expires_at.to_rfc3339());
            })
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_start_output(&stdout)
    }

    async fn stop(&self, container_ref: &str) -> LaunchResult<()> {
        validate_container_ref(container_ref)?;
        debug!(container_ref, "invoking launcher cleanup");

        self.run("cleanup", self.stop_timeout, |cmd| {
            cmd.arg(container_ref);
        })
        .await?;

        Ok(())
    }
}
