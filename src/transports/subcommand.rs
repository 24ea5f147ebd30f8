//! One `bw` subprocess per operation.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::cli::{request_delay, run_combined, CommandOutput};
use crate::codec::{classify_failure, decode_collections, decode_item, to_base64};
use crate::item::{Collection, Item, ItemCreate};
use crate::transport::Transport;
use crate::{BitwardenError, Config, Result, Session};

/// Keeps `bw` from ever waiting on a prompt.
const NON_INTERACTIVE: (&str, &str) = ("BW_NOINTERACTION", "true");

/// Runs every operation as a separate `bw` invocation.
///
/// Commands that touch items are preceded by a random pause so a burst of
/// operations does not trip the vault service's rate limiting.
#[derive(Debug, Clone)]
pub struct SubcommandTransport {
    program: String,
    max_delay: Duration,
}

impl SubcommandTransport {
    /// Creates a transport from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.program.clone(),
            max_delay: config.max_request_delay,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        run_combined(&self.program, args, &[NON_INTERACTIVE]).await
    }

    async fn run_paced(&self, args: &[&str]) -> Result<CommandOutput> {
        request_delay(self.max_delay).await;
        self.run(args).await
    }

    /// Runs an item command and decodes the item it prints.
    async fn run_item(&self, args: &[&str]) -> Result<Item> {
        let out = self.run_paced(args).await?;
        if !out.success() {
            return Err(classify_failure(&out.combined()));
        }
        decode_item(&out.stdout)
    }

    /// Runs an item command whose output only matters on failure.
    async fn run_unit(&self, args: &[&str]) -> Result<()> {
        let out = self.run_paced(args).await?;
        if !out.success() {
            return Err(classify_failure(&out.combined()));
        }
        Ok(())
    }
}

fn token(session: &Session) -> Result<&str> {
    session.token().ok_or(BitwardenError::NotAuthenticated)
}

#[async_trait]
impl Transport for SubcommandTransport {
    fn name(&self) -> &str {
        "subcommand"
    }

    async fn version(&mut self) -> Result<String> {
        let out = self.run(&["--version"]).await?;
        if !out.success() {
            return Err(BitwardenError::Transport(out.text()));
        }
        Ok(out.stdout_text())
    }

    async fn unlock(&mut self, password: &SecretString) -> Result<Session> {
        let out = run_combined(
            &self.program,
            &["unlock", password.expose_secret(), "--raw"],
            &[NON_INTERACTIVE],
        )
        .await
        .map_err(|e| BitwardenError::Auth(e.to_string()))?;

        if !out.success() {
            return Err(BitwardenError::Auth(out.text()));
        }

        // `--raw` prints only the token on stdout. Runtime warnings go to
        // stderr and never reach the token.
        let text = out.stdout_text();
        let token = text.lines().map(str::trim).filter(|l| !l.is_empty()).last();
        match token {
            Some(token) => {
                debug!("vault unlocked");
                Ok(Session::new(token))
            }
            None => Err(BitwardenError::Auth(
                "bw unlock returned no session token".to_string(),
            )),
        }
    }

    async fn sync(&mut self, session: &Session) -> Result<()> {
        let out = self.run(&["sync", "-f", "--session", token(session)?]).await?;
        if !out.success() {
            return Err(BitwardenError::Sync(out.text()));
        }
        Ok(())
    }

    async fn create_item(&mut self, payload: &ItemCreate, session: &Session) -> Result<Item> {
        let encoded = to_base64(payload)?;
        self.run_item(&[
            "create",
            "item",
            "--organizationid",
            &payload.organization_id,
            &encoded,
            "--session",
            token(session)?,
        ])
        .await
    }

    async fn get_item(&mut self, id: &str, session: &Session) -> Result<Item> {
        self.run_item(&["get", "item", id, "--session", token(session)?])
            .await
    }

    async fn edit_item(
        &mut self,
        id: &str,
        payload: &ItemCreate,
        session: &Session,
    ) -> Result<Item> {
        let encoded = to_base64(payload)?;
        self.run_item(&[
            "edit",
            "item",
            id,
            "--organizationid",
            &payload.organization_id,
            &encoded,
            "--session",
            token(session)?,
        ])
        .await
    }

    async fn move_item(
        &mut self,
        id: &str,
        organization_id: &str,
        session: &Session,
    ) -> Result<()> {
        self.run_unit(&["move", id, organization_id, "--session", token(session)?])
            .await
    }

    async fn delete_item(&mut self, id: &str, session: &Session) -> Result<()> {
        self.run_unit(&["delete", "item", id, "--session", token(session)?])
            .await
    }

    async fn list_collections(
        &mut self,
        organization_id: Option<&str>,
        session: &Session,
    ) -> Result<Vec<Collection>> {
        let token = token(session)?;
        let mut args = vec!["list", "collections"];
        if let Some(org) = organization_id {
            args.extend(["--organizationid", org]);
        }
        args.extend(["--session", token]);

        let out = self.run_paced(&args).await?;
        if !out.success() {
            return Err(classify_failure(&out.combined()));
        }
        decode_collections(&out.stdout)
    }

    async fn close(&mut self) -> Result<()> {
        // The vault stays unlocked for other `bw` users of the same profile;
        // the token simply goes out of scope with the session.
        Ok(())
    }
}
