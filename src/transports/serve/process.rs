//! Lifecycle of a spawned `bw serve` process.

use std::net::{Ipv4Addr, TcpListener};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{BitwardenError, Result};

/// Bytes of stderr kept for the error message of a failed start.
const STDERR_TAIL: usize = 8 * 1024;

/// How long an exited child's stderr reader may take to finish.
const STDERR_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Asks the OS for a free loopback port.
///
/// The listener is released before returning, so the port is only free
/// "as of now"; callers spawn immediately afterwards.
pub fn free_port() -> Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}

/// Fails if something is already listening on `port`.
///
/// A `bw serve` started on a taken port exits at once, while the health
/// check would be answered by whatever holds the port.
pub fn ensure_port_free(port: u16) -> Result<()> {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port))
        .map(drop)
        .map_err(|e| {
            BitwardenError::Transport(format!("port {} is not available for bw serve: {}", port, e))
        })
}

/// A running `bw serve` child.
///
/// The child is killed when [`ServeProcess::shutdown`] is called, and as a
/// fallback when the handle is dropped.
#[derive(Debug)]
pub struct ServeProcess {
    child: Option<Child>,
    port: u16,
    stderr: Option<JoinHandle<String>>,
}

impl ServeProcess {
    /// Spawns `<program> serve --hostname 127.0.0.1 --port <port>`.
    pub fn spawn(program: &str, port: u16) -> Result<Self> {
        let port_arg = port.to_string();
        let child = Command::new(program)
            .args(["serve", "--hostname", "127.0.0.1", "--port", &port_arg])
            .env("BW_NOINTERACTION", "true")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BitwardenError::BackendNotInstalled(format!("{} command not found", program))
                } else {
                    BitwardenError::Transport(format!("could not start {} serve: {}", program, e))
                }
            })?;

        debug!(port, pid = ?child.id(), "spawned bw serve");
        Ok(Self::from_child(child, port))
    }

    /// Wraps a spawned child. Its stderr, if piped, is drained in the
    /// background so a chatty server never blocks on a full pipe.
    fn from_child(mut child: Child, port: u16) -> Self {
        let stderr = child.stderr.take().map(|pipe| tokio::spawn(drain_stderr(pipe)));
        Self {
            child: Some(child),
            port,
            stderr,
        }
    }

    /// Port the server was told to listen on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// OS process id, while the child is running.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// If the child already exited, returns a description including the
    /// tail of its stderr.
    pub async fn exited(&mut self) -> Option<String> {
        let child = self.child.as_mut()?;
        let status = match child.try_wait() {
            Ok(Some(status)) => status,
            Ok(None) => return None,
            Err(e) => return Some(format!("could not poll bw serve: {}", e)),
        };
        self.child = None;

        let stderr = match self.stderr.take() {
            Some(reader) => match tokio::time::timeout(STDERR_FLUSH_TIMEOUT, reader).await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => format!("(stderr reader failed: {})", e),
                Err(_) => "(stderr still open)".to_string(),
            },
            None => String::new(),
        };

        Some(format!("bw serve exited with {}: {}", status, stderr.trim()))
    }

    /// Kills the child and waits for it. Idempotent.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(reader) = self.stderr.take() {
            reader.abort();
        }
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        match child.kill().await {
            Ok(()) => {
                debug!(port = self.port, "stopped bw serve");
                Ok(())
            }
            // Already gone on its own.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => {
                warn!(port = self.port, error = %e, "failed to stop bw serve");
                Err(BitwardenError::Io(e))
            }
        }
    }
}

/// Reads stderr until EOF, keeping only the last [`STDERR_TAIL`] bytes.
async fn drain_stderr(mut pipe: ChildStderr) -> String {
    let mut tail = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > STDERR_TAIL {
                    let excess = tail.len() - STDERR_TAIL;
                    tail.drain(..excess);
                }
            }
            Err(e) => {
                warn!(error = %e, "could not read bw serve stderr");
                break;
            }
        }
    }
    String::from_utf8_lossy(&tail).into_owned()
}

/// Polls `probe` until it reports ready, at most `attempts` times.
///
/// The child is checked for an early exit before every probe, so a server
/// that died cannot be mistaken for ready.
pub async fn wait_until_healthy<F, Fut>(
    process: &mut ServeProcess,
    attempts: u32,
    interval: Duration,
    mut probe: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for attempt in 1..=attempts {
        if let Some(reason) = process.exited().await {
            return Err(BitwardenError::Transport(reason));
        }

        if probe().await {
            if let Some(reason) = process.exited().await {
                return Err(BitwardenError::Transport(reason));
            }
            debug!(attempt, "bw serve is healthy");
            return Ok(());
        }

        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }

    Err(BitwardenError::Transport(format!(
        "bw serve on port {} did not become healthy after {} attempts",
        process.port(),
        attempts
    )))
}
