//! `bw serve` transport.
//!
//! A single `bw serve` child listens on a loopback port. The transport waits
//! for `GET /status` to answer, unlocks with `POST /unlock`, and then drives
//! the vault through the server's REST endpoints. The child is killed on
//! [`Transport::close`], on any startup failure, and when the transport is
//! dropped.

mod process;

pub use process::{ensure_port_free, free_port, ServeProcess};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cli::run_combined;
use crate::codec::{check_envelope, classify_failure, decode_collections, decode_item, to_json_body};
use crate::config::TransportKind;
use crate::item::{Collection, Item, ItemCreate};
use crate::transport::Transport;
use crate::{BitwardenError, Config, Result, Session};

/// Lower bound for a single health probe, however short the interval.
const MIN_PROBE_TIMEOUT: Duration = Duration::from_millis(200);

/// Drives a `bw serve` process over loopback HTTP.
pub struct ServeTransport {
    program: String,
    port: Option<u16>,
    attempts: u32,
    interval: Duration,
    http: reqwest::Client,
    base_url: Option<String>,
    process: Option<ServeProcess>,
}

impl ServeTransport {
    /// Creates a transport that spawns its own `bw serve` on unlock.
    pub fn new(config: &Config) -> Self {
        let port = match config.transport {
            TransportKind::Serve { port } => port,
            TransportKind::Subcommand => None,
        };

        Self {
            program: config.program.clone(),
            port,
            attempts: config.health_check_attempts,
            interval: config.health_check_interval,
            http: reqwest::Client::new(),
            base_url: None,
            process: None,
        }
    }

    /// Creates a transport for a server that is already running at `base_url`.
    ///
    /// Nothing is spawned or killed; `program` is only used for `--version`.
    pub fn attach(program: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            port: None,
            attempts: 0,
            interval: Duration::ZERO,
            http: reqwest::Client::new(),
            base_url: Some(base_url.into().trim_end_matches('/').to_string()),
            process: None,
        }
    }

    /// Base URL of the server, once known.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Process id of the spawned server, while it runs.
    pub fn server_pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(ServeProcess::id)
    }

    /// Spawns the server and waits for it, unless one is already known.
    async fn start(&mut self) -> Result<()> {
        if self.base_url.is_some() {
            return Ok(());
        }

        let port = match self.port {
            Some(port) if port != 0 => {
                ensure_port_free(port)?;
                port
            }
            _ => free_port()?,
        };
        let mut process = ServeProcess::spawn(&self.program, port)?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let http = self.http.clone();
        let status_url = format!("{}/status", base_url);
        let probe_timeout = self.interval.max(MIN_PROBE_TIMEOUT);
        let ready = process::wait_until_healthy(&mut process, self.attempts, self.interval, || {
            let request = http.get(&status_url).timeout(probe_timeout).send();
            async move { matches!(request.await, Ok(resp) if resp.status().is_success()) }
        })
        .await;

        if let Err(e) = ready {
            if let Err(kill_err) = process.shutdown().await {
                warn!(error = %kill_err, "could not stop unhealthy bw serve");
            }
            return Err(e);
        }

        debug!(%base_url, "bw serve ready");
        self.process = Some(process);
        self.base_url = Some(base_url);
        Ok(())
    }

    fn url(&self, path: &str) -> Result<String> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| BitwardenError::Transport("bw serve is not running".to_string()))?;
        Ok(format!("{}{}", base, path))
    }

    /// Sends a request and returns the body of a 200 response.
    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        if status.is_success() {
            Ok(body)
        } else {
            Err(failure(status, &body))
        }
    }

    fn json_request(&self, request: RequestBuilder, payload: &ItemCreate) -> Result<RequestBuilder> {
        Ok(request
            .header(CONTENT_TYPE, "application/json")
            .body(to_json_body(payload)?))
    }
}

/// Maps a non-200 response to an error. `bw serve` reports failures as
/// `{"success": false, "message": ".."}`.
fn failure(status: StatusCode, body: &[u8]) -> BitwardenError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

    if status == StatusCode::NOT_FOUND {
        return BitwardenError::NotFound(message);
    }

    match classify_failure(message.as_bytes()) {
        BitwardenError::Transport(text) => {
            BitwardenError::Transport(format!("HTTP {}: {}", status.as_u16(), text))
        }
        other => other,
    }
}

#[async_trait]
impl Transport for ServeTransport {
    fn name(&self) -> &str {
        "serve"
    }

    async fn version(&mut self) -> Result<String> {
        let out = run_combined(&self.program, &["--version"], &[]).await?;
        if !out.success() {
            return Err(BitwardenError::Transport(out.text()));
        }
        Ok(out.stdout_text())
    }

    async fn unlock(&mut self, password: &SecretString) -> Result<Session> {
        self.start().await?;

        let body = serde_json::json!({ "password": password.expose_secret() });
        let request = self.http.post(self.url("/unlock")?).json(&body);
        let reply = self.send(request).await;
        reply
            .and_then(|body| check_envelope(&body))
            .map_err(|e| match e {
                BitwardenError::Transport(msg) | BitwardenError::NotFound(msg) => {
                    BitwardenError::Auth(msg)
                }
                other => BitwardenError::Auth(other.to_string()),
            })?;

        debug!("vault unlocked through bw serve");
        Ok(Session::implicit())
    }

    async fn sync(&mut self, _session: &Session) -> Result<()> {
        let request = self.http.post(self.url("/sync")?);
        let reply = self.send(request).await;
        reply
            .and_then(|body| check_envelope(&body))
            .map_err(|e| BitwardenError::Sync(e.to_string()))
    }

    async fn create_item(&mut self, payload: &ItemCreate, _session: &Session) -> Result<Item> {
        let request = self.json_request(self.http.post(self.url("/object/item")?), payload)?;
        let body = self.send(request).await?;
        decode_item(&body)
    }

    async fn get_item(&mut self, id: &str, _session: &Session) -> Result<Item> {
        let request = self.http.get(self.url(&format!("/object/item/{}", id))?);
        let body = self.send(request).await?;
        decode_item(&body)
    }

    async fn edit_item(
        &mut self,
        id: &str,
        payload: &ItemCreate,
        _session: &Session,
    ) -> Result<Item> {
        let url = self.url(&format!("/object/item/{}", id))?;
        let request = self.json_request(self.http.put(url), payload)?;
        let body = self.send(request).await?;
        decode_item(&body)
    }

    async fn move_item(
        &mut self,
        id: &str,
        organization_id: &str,
        _session: &Session,
    ) -> Result<()> {
        let url = self.url(&format!("/move/{}/{}", id, organization_id))?;
        let body = self.send(self.http.post(url)).await?;
        check_envelope(&body)
    }

    async fn delete_item(&mut self, id: &str, _session: &Session) -> Result<()> {
        let url = self.url(&format!("/object/item/{}", id))?;
        let body = self.send(self.http.delete(url)).await?;
        check_envelope(&body)
    }

    async fn list_collections(
        &mut self,
        organization_id: Option<&str>,
        _session: &Session,
    ) -> Result<Vec<Collection>> {
        let mut request = self.http.get(self.url("/list/object/collections")?);
        if let Some(org) = organization_id {
            request = request.query(&[("organizationId", org)]);
        }
        let body = self.send(request).await?;
        decode_collections(&body)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut process) = self.process.take() {
            self.base_url = None;
            process.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_takes_configured_port() {
        let config = Config::new("pw").with_transport(TransportKind::Serve { port: Some(8087) });
        let transport = ServeTransport::new(&config);

        assert_eq!(transport.port, Some(8087));
        assert_eq!(transport.base_url(), None);
        assert_eq!(transport.name(), "serve");
    }

    #[test]
    fn test_attach_normalizes_base_url() {
        let transport = ServeTransport::attach("bw", "http://127.0.0.1:8087/");
        assert_eq!(transport.base_url(), Some("http://127.0.0.1:8087"));
        assert_eq!(transport.url("/status").unwrap(), "http://127.0.0.1:8087/status");
    }

    #[test]
    fn test_failure_mapping() {
        let err = failure(StatusCode::NOT_FOUND, b"");
        assert!(err.is_not_found());

        let err = failure(
            StatusCode::BAD_REQUEST,
            br#"{"success":false,"message":"Not found."}"#,
        );
        assert!(err.is_not_found());

        let err = failure(
            StatusCode::BAD_REQUEST,
            br#"{"success":false,"message":"Invalid master password."}"#,
        );
        match err {
            BitwardenError::Transport(msg) => {
                assert_eq!(msg, "HTTP 400: Invalid master password.")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_requests_fail_before_start() {
        let mut transport = ServeTransport::new(&Config::new("pw"));
        let err = transport
            .get_item("x", &Session::implicit())
            .await
            .unwrap_err();
        assert!(matches!(err, BitwardenError::Transport(_)));
        transport.close().await.unwrap();
    }
}
