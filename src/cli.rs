//! Subprocess plumbing shared by both transports.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use rand::Rng;
use tokio::process::Command;
use tracing::debug;

use crate::{BitwardenError, Result};

/// Captured result of a command.
///
/// stdout and stderr are kept apart: `bw` writes its payload to stdout and
/// runtime warnings to stderr, even on success.
#[derive(Debug)]
pub struct CommandOutput {
    /// Exit status of the process
    pub status: ExitStatus,
    /// Raw stdout
    pub stdout: Vec<u8>,
    /// Raw stderr
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Returns true if the process exited with status zero.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// stdout followed by stderr, for error reporting.
    pub fn combined(&self) -> Vec<u8> {
        let mut combined = self.stdout.clone();
        combined.extend_from_slice(&self.stderr);
        combined
    }

    /// Combined output as lossy UTF-8 with surrounding whitespace removed.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.combined()).trim().to_string()
    }

    /// stdout alone as lossy UTF-8, trimmed.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }
}

/// Executes a command and captures stdout and stderr.
///
/// A non-zero exit is not an error here: the caller decides what the output
/// means. Only failing to start the process is.
///
/// # Errors
///
/// - [`BitwardenError::BackendNotInstalled`] if `program` cannot be found
/// - [`BitwardenError::Io`] for any other spawn failure
pub async fn run_combined(
    program: &str,
    args: &[&str],
    env: &[(&str, &str)],
) -> Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    for (key, value) in env {
        cmd.env(key, value);
    }

    // Only the subcommand words are logged; later arguments can hold the
    // password, session token or payload.
    let shown = if args.first() == Some(&"unlock") { 1 } else { 2 };
    debug!(program, command = ?&args[..shown.min(args.len())], "running command");

    let output = cmd.output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BitwardenError::BackendNotInstalled(format!("{} command not found", program))
        } else {
            BitwardenError::Io(e)
        }
    })?;

    Ok(CommandOutput {
        status: output.status,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Sleeps for a random duration in `[0, max)`.
///
/// Spacing out `bw` calls keeps the vault service from rate-limiting a burst
/// of subcommands. `Duration::ZERO` returns immediately.
pub async fn request_delay(max: Duration) {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return;
    }

    let pause = Duration::from_millis(rand::thread_rng().gen_range(0..max_ms));
    tokio::time::sleep(pause).await;
}
