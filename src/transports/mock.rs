//! Mock transport for testing.
//!
//! Keeps items in memory, answers through the real payload codec, records
//! every call and supports error injection, so code built on
//! [`VaultClient`](crate::VaultClient) can be tested without `bw`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

use crate::codec::decode_item;
use crate::item::{Collection, Item, ItemCreate};
use crate::transport::Transport;
use crate::{BitwardenError, Result, Session};

#[derive(Default)]
struct MockState {
    items: HashMap<String, Item>,
    collections: Vec<Collection>,
    calls: Vec<String>,
    failures: HashMap<String, BitwardenError>,
}

/// In-memory stand-in for `bw`.
///
/// Clones share state, so a test can keep one handle for inspection while
/// the client owns another.
///
/// # Example
///
/// ```
/// use bitwarden_sync::transports::MockTransport;
/// use bitwarden_sync::{BitwardenError, VaultClient};
///
/// #[tokio::main]
/// async fn main() -> bitwarden_sync::Result<()> {
///     let mock = MockTransport::new().with_password("hunter2");
///     mock.inject_error("unlock", BitwardenError::Auth("locked out".into())).await;
///
///     let result = VaultClient::with_mock(mock.clone(), "hunter2").await;
///     assert!(result.is_err());
///     assert_eq!(mock.calls().await, vec!["version", "unlock", "close"]);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<RwLock<MockState>>,
    version: String,
    password: String,
    duplicate_collection_ids: bool,
}

impl MockTransport {
    /// Creates a mock reporting version `1.22.0` and accepting any password.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            version: "1.22.0".to_string(),
            password: String::new(),
            duplicate_collection_ids: false,
        }
    }

    /// Sets the version reported by `--version`.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Only accepts `password` on unlock.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Repeats every collection id in responses, like some `bw` releases do.
    pub fn with_duplicate_collection_ids(mut self) -> Self {
        self.duplicate_collection_ids = true;
        self
    }

    /// Pre-populates the vault with an item.
    pub async fn set_item(&self, item: Item) {
        let mut state = self.state.write().await;
        state.items.insert(item.id.clone(), item);
    }

    /// Pre-populates a collection.
    pub async fn set_collection(&self, collection: Collection) {
        self.state.write().await.collections.push(collection);
    }

    /// Makes the next call of `operation` fail with `err`.
    ///
    /// Operation names match the [`Transport`] methods without the `_item`
    /// suffix: `version`, `unlock`, `sync`, `create`, `get`, `edit`, `move`,
    /// `delete`, `list_collections`.
    pub async fn inject_error(&self, operation: &str, err: BitwardenError) {
        let mut state = self.state.write().await;
        state.failures.insert(operation.to_string(), err);
    }

    /// Operations called so far, in order.
    pub async fn calls(&self) -> Vec<String> {
        self.state.read().await.calls.clone()
    }

    /// Items currently stored.
    pub async fn items(&self) -> Vec<Item> {
        self.state.read().await.items.values().cloned().collect()
    }

    /// Records the call and returns an injected failure, if any.
    async fn enter(&self, operation: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.calls.push(operation.to_string());
        match state.failures.remove(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Round-trips an item through JSON and the real decoder.
    fn respond(&self, item: &Item) -> Result<Item> {
        let mut value = serde_json::to_value(item)?;
        if self.duplicate_collection_ids {
            let doubled: Vec<_> = item
                .collection_ids
                .iter()
                .chain(item.collection_ids.iter())
                .cloned()
                .collect();
            value["collectionIds"] = serde_json::json!(doubled);
        }
        decode_item(&serde_json::to_vec(&value)?)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found() -> BitwardenError {
    BitwardenError::NotFound("Not found.".to_string())
}

fn apply(item: &mut Item, payload: &ItemCreate) {
    item.organization_id = Some(payload.organization_id.clone());
    item.folder_id = payload.folder_id.clone();
    item.item_type = payload.item_type;
    item.reprompt = payload.reprompt;
    item.name = payload.name.clone();
    item.notes = Some(payload.notes.clone());
    item.favorite = payload.favorite;
    item.secure_note = Some(payload.secure_note);
    item.collection_ids = payload.collection_ids.clone();
    item.revision_date = Some(Utc::now());
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn version(&mut self) -> Result<String> {
        self.enter("version").await?;
        Ok(self.version.clone())
    }

    async fn unlock(&mut self, password: &SecretString) -> Result<Session> {
        self.enter("unlock").await?;
        if !self.password.is_empty() && password.expose_secret() != self.password {
            return Err(BitwardenError::Auth("Invalid master password.".to_string()));
        }
        Ok(Session::new("mock-session-token"))
    }

    async fn sync(&mut self, _session: &Session) -> Result<()> {
        self.enter("sync").await
    }

    async fn create_item(&mut self, payload: &ItemCreate, _session: &Session) -> Result<Item> {
        self.enter("create").await?;

        let mut item = Item {
            object: "item".to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: None,
            folder_id: None,
            item_type: 0,
            reprompt: false,
            name: String::new(),
            notes: None,
            favorite: false,
            login: None,
            secure_note: None,
            collection_ids: Vec::new(),
            revision_date: None,
        };
        apply(&mut item, payload);

        self.state
            .write()
            .await
            .items
            .insert(item.id.clone(), item.clone());
        self.respond(&item)
    }

    async fn get_item(&mut self, id: &str, _session: &Session) -> Result<Item> {
        self.enter("get").await?;
        let item = self.state.read().await.items.get(id).cloned();
        self.respond(&item.ok_or_else(not_found)?)
    }

    async fn edit_item(
        &mut self,
        id: &str,
        payload: &ItemCreate,
        _session: &Session,
    ) -> Result<Item> {
        self.enter("edit").await?;
        let mut state = self.state.write().await;
        let item = state.items.get_mut(id).ok_or_else(not_found)?;
        apply(item, payload);
        let item = item.clone();
        drop(state);
        self.respond(&item)
    }

    async fn move_item(
        &mut self,
        id: &str,
        organization_id: &str,
        _session: &Session,
    ) -> Result<()> {
        self.enter("move").await?;
        let mut state = self.state.write().await;
        let item = state.items.get_mut(id).ok_or_else(not_found)?;
        item.organization_id = Some(organization_id.to_string());
        Ok(())
    }

    async fn delete_item(&mut self, id: &str, _session: &Session) -> Result<()> {
        self.enter("delete").await?;
        let mut state = self.state.write().await;
        state.items.remove(id).ok_or_else(not_found)?;
        Ok(())
    }

    async fn list_collections(
        &mut self,
        organization_id: Option<&str>,
        _session: &Session,
    ) -> Result<Vec<Collection>> {
        self.enter("list_collections").await?;
        let state = self.state.read().await;
        Ok(state
            .collections
            .iter()
            .filter(|c| organization_id.is_none() || c.organization_id.as_deref() == organization_id)
            .cloned()
            .collect())
    }

    async fn close(&mut self) -> Result<()> {
        self.enter("close").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_create;
    use crate::SecureNote;

    const ORG: &str = "0b7f3f4e-8c53-4f66-9c54-0d6c1f2a9b11";

    #[tokio::test]
    async fn test_mock_create_and_get() {
        let mut mock = MockTransport::new();
        let session = mock.unlock(&SecretString::from("pw")).await.unwrap();

        let payload = encode_create(&SecureNote::new(ORG, "n", "body"));
        let created = mock.create_item(&payload, &session).await.unwrap();
        let fetched = mock.get_item(&created.id, &session).await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.notes.as_deref(), Some("body"));
        assert_eq!(fetched.organization_id.as_deref(), Some(ORG));
    }

    #[tokio::test]
    async fn test_mock_rejects_wrong_password() {
        let mut mock = MockTransport::new().with_password("right");
        let err = mock.unlock(&SecretString::from("wrong")).await.unwrap_err();
        assert!(matches!(err, BitwardenError::Auth(_)));
    }

    #[tokio::test]
    async fn test_mock_duplicates_are_removed_by_decoder() {
        let mut mock = MockTransport::new().with_duplicate_collection_ids();
        let session = mock.unlock(&SecretString::from("pw")).await.unwrap();

        let note = SecureNote::new(ORG, "n", "body").with_collections(["c1", "c2"]);
        let created = mock
            .create_item(&encode_create(&note), &session)
            .await
            .unwrap();
        assert_eq!(created.collection_ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_error_injection_fires_once() {
        let mut mock = MockTransport::new();
        mock.inject_error("sync", BitwardenError::Sync("offline".to_string()))
            .await;
        let session = mock.unlock(&SecretString::from("pw")).await.unwrap();

        assert!(matches!(
            mock.sync(&session).await,
            Err(BitwardenError::Sync(_))
        ));
        assert!(mock.sync(&session).await.is_ok());
        assert_eq!(mock.calls().await, vec!["unlock", "sync", "sync"]);
    }

    #[tokio::test]
    async fn test_mock_missing_item() {
        let mut mock = MockTransport::new();
        let session = mock.unlock(&SecretString::from("pw")).await.unwrap();

        assert!(mock.get_item("nope", &session).await.unwrap_err().is_not_found());
        assert!(mock.delete_item("nope", &session).await.unwrap_err().is_not_found());
    }
}
