//! The [`Transport`] trait: one way of reaching the `bw` CLI.
//!
//! Two implementations ship with the crate, both speaking to the same
//! external tool:
//!
//! - [`SubcommandTransport`](crate::transports::SubcommandTransport): a fresh
//!   `bw` subprocess per call, session token passed with `--session`.
//! - [`ServeTransport`](crate::transports::ServeTransport): one `bw serve`
//!   subprocess on a loopback port, driven over HTTP.
//!
//! Composition (sync before each call, validation, context on errors) lives
//! in [`VaultClient`](crate::VaultClient); transports only execute and decode.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::item::{Collection, Item, ItemCreate};
use crate::{Result, Session};

/// A way of executing vault operations against `bw`.
///
/// Implementations are used through `&mut self` one call at a time and
/// provide no internal locking.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the transport name (e.g., "subcommand", "serve").
    fn name(&self) -> &str;

    /// Returns the raw output of `bw --version`.
    ///
    /// Must not touch the vault: it runs before unlock.
    async fn version(&mut self) -> Result<String>;

    /// Unlocks the vault.
    ///
    /// For `bw serve` this also starts the server and waits until it is
    /// healthy.
    ///
    /// # Errors
    ///
    /// - [`BitwardenError::Auth`](crate::BitwardenError::Auth): the unlock
    ///   was refused; the message carries the tool's output
    /// - [`BitwardenError::Transport`](crate::BitwardenError::Transport): the
    ///   server never became healthy
    async fn unlock(&mut self, password: &SecretString) -> Result<Session>;

    /// Forces a refresh of the local vault cache (`bw sync -f`).
    ///
    /// # Errors
    ///
    /// Returns [`BitwardenError::Sync`](crate::BitwardenError::Sync) on failure.
    async fn sync(&mut self, session: &Session) -> Result<()>;

    /// Creates an item and returns it as stored.
    async fn create_item(&mut self, payload: &ItemCreate, session: &Session) -> Result<Item>;

    /// Fetches an item by id.
    ///
    /// # Errors
    ///
    /// Returns [`BitwardenError::NotFound`](crate::BitwardenError::NotFound)
    /// if the id does not exist.
    async fn get_item(&mut self, id: &str, session: &Session) -> Result<Item>;

    /// Replaces an item and returns it as stored.
    async fn edit_item(&mut self, id: &str, payload: &ItemCreate, session: &Session)
        -> Result<Item>;

    /// Moves an item into another organization.
    async fn move_item(&mut self, id: &str, organization_id: &str, session: &Session)
        -> Result<()>;

    /// Deletes an item.
    ///
    /// # Errors
    ///
    /// Returns [`BitwardenError::NotFound`](crate::BitwardenError::NotFound)
    /// if the id does not exist.
    async fn delete_item(&mut self, id: &str, session: &Session) -> Result<()>;

    /// Lists collections, optionally restricted to one organization.
    async fn list_collections(
        &mut self,
        organization_id: Option<&str>,
        session: &Session,
    ) -> Result<Vec<Collection>>;

    /// Releases transport resources. Calling it again is a no-op.
    async fn close(&mut self) -> Result<()>;
}
