//! Secure note resource lifecycle for a host that plans and stores state.
//!
//! A host hands over a desired [`SecureNote`] ("plan") and keeps the returned
//! [`SecureNoteState`] between runs. This module maps those records onto
//! [`VaultClient`] calls.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::item::{Item, SecureNote};
use crate::{Result, VaultClient};

/// Stored state of a managed secure note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureNoteState {
    pub object: String,
    pub id: String,
    pub organization_id: String,
    pub folder_id: Option<String>,
    pub item_type: u8,
    pub reprompt: bool,
    pub name: String,
    pub notes: String,
    pub favorite: bool,
    pub collection_ids: Vec<String>,
    /// RFC 3339, as the vault last reported it
    pub revision_date: Option<String>,
}

impl From<Item> for SecureNoteState {
    fn from(item: Item) -> Self {
        Self {
            object: item.object,
            id: item.id,
            organization_id: item.organization_id.unwrap_or_default(),
            folder_id: item.folder_id,
            item_type: item.item_type,
            reprompt: item.reprompt,
            name: item.name,
            notes: item.notes.unwrap_or_default(),
            favorite: item.favorite,
            collection_ids: item.collection_ids,
            revision_date: item.revision_date.map(|d| d.to_rfc3339()),
        }
    }
}

impl SecureNoteState {
    /// The plan that would reproduce this state.
    pub fn to_plan(&self) -> SecureNote {
        SecureNote {
            organization_id: self.organization_id.clone(),
            name: self.name.clone(),
            notes: self.notes.clone(),
            collection_ids: self.collection_ids.clone(),
            folder_id: self.folder_id.clone(),
            favorite: Some(self.favorite),
            reprompt: Some(self.reprompt),
        }
    }
}

/// Create/read/update/delete of one secure note resource.
pub struct SecureNoteResource<'a> {
    client: &'a mut VaultClient,
}

impl<'a> SecureNoteResource<'a> {
    /// Borrows a connected client.
    pub fn new(client: &'a mut VaultClient) -> Self {
        Self { client }
    }

    /// Creates the note described by `plan`.
    pub async fn create(&mut self, plan: &SecureNote) -> Result<SecureNoteState> {
        let item = self.client.create(plan).await?;
        Ok(item.into())
    }

    /// Refreshes state. Returns `None` if the note no longer exists, so the
    /// host can drop it and plan a re-create.
    pub async fn read(&mut self, state: &SecureNoteState) -> Result<Option<SecureNoteState>> {
        match self.client.get(&state.id).await {
            Ok(item) => Ok(Some(item.into())),
            Err(e) if e.is_not_found() => {
                info!(id = %state.id, "secure note is gone from the vault");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Applies `plan` to an existing note.
    ///
    /// `bw edit` cannot change ownership, so a new organization is applied
    /// with a move first.
    pub async fn update(
        &mut self,
        state: &SecureNoteState,
        plan: &SecureNote,
    ) -> Result<SecureNoteState> {
        if plan.organization_id != state.organization_id {
            self.client.move_item(&state.id, &plan.organization_id).await?;
        }
        let item = self.client.update(&state.id, plan).await?;
        Ok(item.into())
    }

    /// Deletes the note.
    pub async fn delete(&mut self, state: &SecureNoteState) -> Result<()> {
        self.client.delete(&state.id).await
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::transports::MockTransport;

    const ORG: &str = "0b7f3f4e-8c53-4f66-9c54-0d6c1f2a9b11";
    const OTHER_ORG: &str = "9a8b7c6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d";

    #[tokio::test]
    async fn test_resource_lifecycle() {
        let mock = MockTransport::new();
        let mut client = VaultClient::with_mock(mock.clone(), "pw").await.unwrap();
        let mut resource = SecureNoteResource::new(&mut client);

        let plan = SecureNote::new(ORG, "deploy-notes", "v1").with_favorite(true);
        let state = resource.create(&plan).await.unwrap();
        assert_eq!(state.notes, "v1");
        assert_eq!(state.item_type, 2);
        assert!(state.favorite);
        assert!(state.revision_date.is_some());

        let refreshed = resource.read(&state).await.unwrap().unwrap();
        assert_eq!(refreshed, state);

        let mut next = state.to_plan();
        next.notes = "v2".to_string();
        let updated = resource.update(&state, &next).await.unwrap();
        assert_eq!(updated.notes, "v2");
        assert_eq!(updated.id, state.id);

        resource.delete(&updated).await.unwrap();
        assert_eq!(resource.read(&updated).await.unwrap(), None);
        assert!(!mock.calls().await.contains(&"move".to_string()));
    }

    #[tokio::test]
    async fn test_update_moves_on_organization_change() {
        let mock = MockTransport::new();
        let mut client = VaultClient::with_mock(mock.clone(), "pw").await.unwrap();
        let mut resource = SecureNoteResource::new(&mut client);

        let state = resource
            .create(&SecureNote::new(ORG, "n", "body"))
            .await
            .unwrap();

        let moved = SecureNote::new(OTHER_ORG, "n", "body");
        let updated = resource.update(&state, &moved).await.unwrap();
        assert_eq!(updated.organization_id, OTHER_ORG);

        let calls = mock.calls().await;
        let move_at = calls.iter().position(|c| c == "move").unwrap();
        let edit_at = calls.iter().position(|c| c == "edit").unwrap();
        assert!(move_at < edit_at);
    }
}
