//! The vault item adapter.
//!
//! [`VaultClient`] owns a [`Transport`] and the unlocked [`Session`]. Every
//! operation follows the same sequence:
//!
//! 1. check that the client still holds a session
//! 2. validate ids before they reach a command line or URL
//! 3. `sync`, because `bw` serves reads from a local cache that goes stale
//! 4. encode, execute, decode
//!
//! There are no retries and nothing is rolled back. If a write's response
//! fails to decode, the write may or may not have happened.

use secrecy::SecretString;
use tracing::{debug, info, instrument, warn};

use crate::codec::encode_create;
use crate::item::{Collection, Item, SecureNote};
use crate::transport::Transport;
use crate::transports::new_transport;
use crate::validation::{validate_id, validate_note};
use crate::version::{check_version, CliVersion};
use crate::{BitwardenError, Config, Result, Session};

/// Client for secure notes in a Bitwarden vault.
///
/// # Example
///
/// ```no_run
/// use bitwarden_sync::{Config, SecureNote, VaultClient};
///
/// #[tokio::main]
/// async fn main() -> bitwarden_sync::Result<()> {
///     let mut client = VaultClient::connect(Config::from_env()?).await?;
///
///     let note = SecureNote::new(
///         "0b7f3f4e-8c53-4f66-9c54-0d6c1f2a9b11",
///         "deploy-notes",
///         "rotate keys on friday",
///     );
///     let created = client.create(&note).await?;
///     let fetched = client.get(&created.id).await?;
///     assert_eq!(fetched.name, "deploy-notes");
///
///     client.close().await
/// }
/// ```
pub struct VaultClient {
    transport: Box<dyn Transport>,
    session: Option<Session>,
}

impl VaultClient {
    /// Connects using the transport selected by `config`.
    ///
    /// Checks the `bw` version, unlocks and syncs once. On any failure the
    /// transport is closed before the error is returned, so no `bw serve`
    /// child outlives a failed connect.
    ///
    /// # Errors
    ///
    /// - [`BitwardenError::Version`]: `bw` is older than `config.min_version`
    /// - [`BitwardenError::Auth`]: unlock was refused
    /// - [`BitwardenError::Transport`]: `bw serve` never became healthy
    /// - [`BitwardenError::Sync`]: the initial sync failed
    pub async fn connect(config: Config) -> Result<Self> {
        let transport = new_transport(&config);
        Self::with_transport(transport, &config.password, config.min_version).await
    }

    /// Connects through an explicit transport.
    pub async fn with_transport(
        mut transport: Box<dyn Transport>,
        password: &SecretString,
        min_version: CliVersion,
    ) -> Result<Self> {
        match open(transport.as_mut(), password, min_version).await {
            Ok(session) => Ok(Self {
                transport,
                session: Some(session),
            }),
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    warn!(error = %close_err, "failed to close transport after connect error");
                }
                Err(e)
            }
        }
    }

    /// Connects through a [`MockTransport`](crate::transports::MockTransport).
    #[cfg(feature = "mock")]
    pub async fn with_mock(
        mock: crate::transports::MockTransport,
        password: impl Into<String>,
    ) -> Result<Self> {
        let password = SecretString::from(password.into());
        Self::with_transport(
            Box::new(mock),
            &password,
            crate::version::MIN_SUPPORTED_VERSION,
        )
        .await
    }

    /// Name of the transport in use.
    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// The unlocked session, until [`close`](Self::close) is called.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Forces a refresh of the local vault cache.
    pub async fn sync(&mut self) -> Result<()> {
        let session = self.session.as_ref().ok_or(BitwardenError::NotAuthenticated)?;
        self.transport.sync(session).await
    }

    /// Creates a secure note and returns it as stored.
    ///
    /// # Errors
    ///
    /// Returns [`BitwardenError::InvalidInput`] if the organization, folder or
    /// a collection id is not a UUID, or the name is empty.
    #[instrument(skip_all, fields(organization = %note.organization_id))]
    pub async fn create(&mut self, note: &SecureNote) -> Result<Item> {
        let result = async {
            validate_note(note)?;
            let session = synced(self.transport.as_mut(), self.session.as_ref()).await?;
            let payload = encode_create(note);
            self.transport.create_item(&payload, session).await
        }
        .await;

        let item = result.map_err(|e| BitwardenError::op("create", &note.organization_id, e))?;
        info!(id = %item.id, "created secure note");
        Ok(item)
    }

    /// Fetches an item by id.
    ///
    /// # Errors
    ///
    /// Returns [`BitwardenError::NotFound`] (wrapped with the operation) if
    /// the id does not exist.
    #[instrument(skip(self))]
    pub async fn get(&mut self, id: &str) -> Result<Item> {
        let result = async {
            validate_id("item", id)?;
            let session = synced(self.transport.as_mut(), self.session.as_ref()).await?;
            self.transport.get_item(id, session).await
        }
        .await;

        result.map_err(|e| BitwardenError::op("get", id, e))
    }

    /// Replaces an item with `note` and returns it as stored.
    #[instrument(skip(self, note))]
    pub async fn update(&mut self, id: &str, note: &SecureNote) -> Result<Item> {
        let result = async {
            validate_id("item", id)?;
            validate_note(note)?;
            let session = synced(self.transport.as_mut(), self.session.as_ref()).await?;
            let payload = encode_create(note);
            self.transport.edit_item(id, &payload, session).await
        }
        .await;

        let item = result.map_err(|e| BitwardenError::op("update", id, e))?;
        info!("updated secure note");
        Ok(item)
    }

    /// Moves an item into another organization.
    #[instrument(skip(self))]
    pub async fn move_item(&mut self, id: &str, organization_id: &str) -> Result<()> {
        let result = async {
            validate_id("item", id)?;
            validate_id("organization", organization_id)?;
            let session = synced(self.transport.as_mut(), self.session.as_ref()).await?;
            self.transport.move_item(id, organization_id, session).await
        }
        .await;

        result.map_err(|e| BitwardenError::op("move", id, e))?;
        info!("moved item");
        Ok(())
    }

    /// Deletes an item. Deleting an id that does not exist is an error.
    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        let result = async {
            validate_id("item", id)?;
            let session = synced(self.transport.as_mut(), self.session.as_ref()).await?;
            self.transport.delete_item(id, session).await
        }
        .await;

        result.map_err(|e| BitwardenError::op("delete", id, e))?;
        info!("deleted item");
        Ok(())
    }

    /// Lists collections, optionally for one organization.
    #[instrument(skip(self))]
    pub async fn list_collections(&mut self, organization_id: Option<&str>) -> Result<Vec<Collection>> {
        if let Some(org) = organization_id {
            validate_id("organization", org)?;
        }
        let session = synced(self.transport.as_mut(), self.session.as_ref()).await?;
        self.transport.list_collections(organization_id, session).await
    }

    /// Drops the session and releases the transport (killing `bw serve`).
    ///
    /// Later operations fail with [`BitwardenError::NotAuthenticated`].
    /// Calling it twice is harmless.
    pub async fn close(&mut self) -> Result<()> {
        if self.session.take().is_some() {
            debug!(transport = self.transport.name(), "closing client");
        }
        self.transport.close().await
    }
}

/// Version check, unlock, first sync.
async fn open(
    transport: &mut dyn Transport,
    password: &SecretString,
    min_version: CliVersion,
) -> Result<Session> {
    let reported = transport.version().await?;
    let version = check_version(&reported, min_version)?;
    info!(%version, transport = transport.name(), "found bw CLI");

    let session = transport.unlock(password).await?;
    transport.sync(&session).await?;
    Ok(session)
}

/// Syncs and hands back the session for the call that follows.
async fn synced<'s>(
    transport: &mut dyn Transport,
    session: Option<&'s Session>,
) -> Result<&'s Session> {
    let session = session.ok_or(BitwardenError::NotAuthenticated)?;
    transport.sync(session).await?;
    Ok(session)
}
