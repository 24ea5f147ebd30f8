//! Vault records as the `bw` CLI exchanges them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::wire;

/// Numeric item type code of a secure note.
pub const SECURE_NOTE_TYPE: u8 = 2;

/// Sub-type carried in the nested `secureNote` object. Bitwarden only defines `0`.
pub const SECURE_NOTE_SUBTYPE: u8 = 0;

/// An item stored in the vault, as returned by `bw get item` or `GET /object/item/:id`.
///
/// Ids and revision dates are assigned by the vault; this crate never
/// originates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Object discriminator, `"item"` for vault items
    #[serde(default)]
    pub object: String,

    /// Vault-assigned identifier
    pub id: String,

    /// Owning organization
    #[serde(default)]
    pub organization_id: Option<String>,

    /// Containing folder, if any
    #[serde(default)]
    pub folder_id: Option<String>,

    /// Numeric type code (see [`ItemType`])
    #[serde(rename = "type")]
    pub item_type: u8,

    /// Whether the master password is re-prompted before showing the item
    #[serde(default, with = "wire::reprompt")]
    pub reprompt: bool,

    /// Display name
    pub name: String,

    /// Note body
    #[serde(default)]
    pub notes: Option<String>,

    /// Favorite flag
    #[serde(default)]
    pub favorite: bool,

    /// Login sub-record, unused by secure notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<ItemLogin>,

    /// Secure note sub-record
    #[serde(default)]
    pub secure_note: Option<SecureNoteKind>,

    /// Collections the item belongs to
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub collection_ids: Vec<String>,

    /// Last revision, absent if the CLI sent something unparsable
    #[serde(default, with = "wire::lenient_date")]
    pub revision_date: Option<DateTime<Utc>>,
}

impl Item {
    /// Returns the item type.
    pub fn kind(&self) -> ItemType {
        ItemType::from(self.item_type)
    }
}

/// URI attached to a login item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemLoginUri {
    /// Match detection strategy
    #[serde(rename = "match", default)]
    pub match_type: Option<u8>,
    /// The URI itself
    #[serde(default)]
    pub uri: Option<String>,
}

/// Login sub-record of an item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemLogin {
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub uris: Vec<ItemLoginUri>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub totp: Option<String>,
    #[serde(default)]
    pub password_revision_date: Option<String>,
}

/// The nested `secureNote` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureNoteKind {
    /// Always [`SECURE_NOTE_SUBTYPE`] in practice
    #[serde(rename = "type")]
    pub kind: u8,
}

impl Default for SecureNoteKind {
    fn default() -> Self {
        Self {
            kind: SECURE_NOTE_SUBTYPE,
        }
    }
}

/// Type of vault item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    /// Login credentials (username/password)
    Login,
    /// Secure note (arbitrary text)
    SecureNote,
    /// Credit card
    Card,
    /// Identity information
    Identity,
    /// A code this crate does not know about
    Unknown(u8),
}

impl From<u8> for ItemType {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::Login,
            2 => Self::SecureNote,
            3 => Self::Card,
            4 => Self::Identity,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login => write!(f, "Login"),
            Self::SecureNote => write!(f, "SecureNote"),
            Self::Card => write!(f, "Card"),
            Self::Identity => write!(f, "Identity"),
            Self::Unknown(code) => write!(f, "Unknown({})", code),
        }
    }
}

/// Desired state of a secure note, as supplied by the caller.
///
/// Optional fields stay `None` until the caller sets them; the codec decides
/// how each absence is written on the wire.
///
/// # Example
///
/// ```
/// use bitwarden_sync::SecureNote;
///
/// let note = SecureNote::new("org-id", "deploy-notes", "rotate keys on friday")
///     .with_collections(["col-a", "col-b"])
///     .with_favorite(true);
///
/// assert_eq!(note.collection_ids.len(), 2);
/// assert_eq!(note.folder_id, None);
/// assert_eq!(note.favorite, Some(true));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecureNote {
    /// Owning organization (required)
    pub organization_id: String,
    /// Display name
    pub name: String,
    /// Note body
    pub notes: String,
    /// Collections to place the note in
    pub collection_ids: Vec<String>,
    /// Folder, `None` for no folder
    pub folder_id: Option<String>,
    /// Favorite flag, `None` means not set
    pub favorite: Option<bool>,
    /// Master password re-prompt, `None` means not set
    pub reprompt: Option<bool>,
}

impl SecureNote {
    /// Creates a note with the required fields.
    pub fn new(
        organization_id: impl Into<String>,
        name: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            name: name.into(),
            notes: notes.into(),
            ..Default::default()
        }
    }

    /// Sets the collections.
    pub fn with_collections<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collection_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the folder.
    pub fn with_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    /// Sets the favorite flag.
    pub fn with_favorite(mut self, favorite: bool) -> Self {
        self.favorite = Some(favorite);
        self
    }

    /// Sets master password re-prompt.
    pub fn with_reprompt(mut self, reprompt: bool) -> Self {
        self.reprompt = Some(reprompt);
        self
    }
}

/// Create and edit payload for a secure note.
///
/// Only secure notes are supported, so `type` is fixed and the login, card,
/// identity and fields placeholders are always `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCreate {
    pub organization_id: String,
    #[serde(default)]
    pub collection_ids: Vec<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(rename = "type")]
    pub item_type: u8,
    pub name: String,
    pub notes: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub favorite: bool,
    #[serde(default)]
    pub fields: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub login: Option<serde_json::Value>,
    pub secure_note: SecureNoteKind,
    #[serde(default)]
    pub card: Option<serde_json::Value>,
    #[serde(default)]
    pub identity: Option<serde_json::Value>,
    #[serde(default, with = "wire::reprompt")]
    pub reprompt: bool,
}

/// A vault collection. Read-only from this crate's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    #[serde(default)]
    pub object: String,
    pub id: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub external_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_type_from_code() {
        assert_eq!(ItemType::from(1), ItemType::Login);
        assert_eq!(ItemType::from(2), ItemType::SecureNote);
        assert_eq!(ItemType::from(9), ItemType::Unknown(9));
        assert_eq!(ItemType::SecureNote.to_string(), "SecureNote");
    }

    #[test]
    fn test_decode_cli_item() {
        let json = r#"{
            "object": "item",
            "id": "7d0c9a0e-3b6f-4f4e-9f2e-1a2b3c4d5e6f",
            "organizationId": "0b7f3f4e-8c53-4f66-9c54-0d6c1f2a9b11",
            "folderId": null,
            "type": 2,
            "reprompt": 1,
            "name": "deploy-notes",
            "notes": "rotate keys",
            "favorite": false,
            "login": null,
            "secureNote": {"type": 0},
            "collectionIds": ["c1"],
            "revisionDate": "2022-03-01T10:20:30.123Z"
        }"#;

        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind(), ItemType::SecureNote);
        assert!(item.reprompt);
        assert_eq!(item.folder_id, None);
        assert_eq!(item.secure_note, Some(SecureNoteKind { kind: 0 }));
        assert!(item.revision_date.is_some());
    }

    #[test]
    fn test_decode_tolerates_bool_reprompt_and_null_collections() {
        let json = r#"{"id":"x","type":2,"name":"n","reprompt":false,"collectionIds":null,"revisionDate":"yesterday"}"#;

        let item: Item = serde_json::from_str(json).unwrap();
        assert!(!item.reprompt);
        assert!(item.collection_ids.is_empty());
        assert_eq!(item.revision_date, None);
    }

    #[test]
    fn test_secure_note_builder() {
        let note = SecureNote::new("org", "name", "body")
            .with_folder("folder")
            .with_reprompt(false);

        assert_eq!(note.folder_id.as_deref(), Some("folder"));
        assert_eq!(note.reprompt, Some(false));
        assert_eq!(note.favorite, None);
    }

    #[test]
    fn test_decode_collection() {
        let json = r#"{"object":"collection","id":"c1","organizationId":"o1","name":"Ops","externalId":null}"#;
        let col: Collection = serde_json::from_str(json).unwrap();
        assert_eq!(col.name, "Ops");
        assert_eq!(col.organization_id.as_deref(), Some("o1"));
    }
}
