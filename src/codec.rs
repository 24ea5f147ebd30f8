//! Payload codec between [`SecureNote`] records and the `bw` wire format.
//!
//! Writes go out as an [`ItemCreate`] (base64 for the subcommand transport,
//! plain JSON for `bw serve`). Reads accept both the bare CLI object and the
//! `{"success": .., "data": ..}` envelope used by `bw serve`.

use std::collections::HashSet;

use base64::Engine;
use serde_json::Value;

use crate::item::{Collection, Item, ItemCreate, SecureNote, SecureNoteKind, SECURE_NOTE_TYPE};
use crate::{BitwardenError, Result};

/// Message `bw` prints (and `bw serve` returns) for a missing object.
const NOT_FOUND_MESSAGE: &str = "Not found";

/// Maps a caller's note to the create/edit wire shape.
///
/// - A missing folder becomes `null`.
/// - A missing favorite becomes `false`, which is then omitted.
/// - Reprompt is written as `0`/`1`.
pub fn encode_create(note: &SecureNote) -> ItemCreate {
    ItemCreate {
        organization_id: note.organization_id.clone(),
        collection_ids: note.collection_ids.clone(),
        folder_id: note.folder_id.clone(),
        item_type: SECURE_NOTE_TYPE,
        name: note.name.clone(),
        notes: note.notes.clone(),
        favorite: note.favorite.unwrap_or(false),
        fields: None,
        login: None,
        secure_note: SecureNoteKind::default(),
        card: None,
        identity: None,
        reprompt: note.reprompt.unwrap_or(false),
    }
}

/// Serializes a payload to the single base64 argument `bw create`/`bw edit` expect.
pub fn to_base64(payload: &ItemCreate) -> Result<String> {
    let json = serde_json::to_vec(payload)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

/// Serializes a payload as an HTTP request body for `bw serve`.
pub fn to_json_body(payload: &ItemCreate) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(payload)?)
}

/// Decodes an item response, unwrapping the envelope if present.
///
/// Collection ids are always de-duplicated: the CLI is known to repeat them.
pub fn decode_item(body: &[u8]) -> Result<Item> {
    let value = parse(body)?;
    let data = unwrap_envelope(value, body)?;

    let mut item: Item =
        serde_json::from_value(data).map_err(|e| BitwardenError::decode(e, body))?;
    item.collection_ids = dedup_collection_ids(std::mem::take(&mut item.collection_ids));

    Ok(item)
}

/// Decodes a collection listing, bare array or `{"object":"list","data":[..]}`.
pub fn decode_collections(body: &[u8]) -> Result<Vec<Collection>> {
    let value = parse(body)?;
    let data = unwrap_envelope(value, body)?;

    let list = match data {
        Value::Object(mut map) if map.get("object").and_then(Value::as_str) == Some("list") => {
            map.remove("data").unwrap_or(Value::Array(Vec::new()))
        }
        other => other,
    };

    serde_json::from_value(list).map_err(|e| BitwardenError::decode(e, body))
}

/// Checks a response that carries no payload for a `success: false`
/// envelope. Empty or non-JSON bodies are accepted.
pub fn check_envelope(body: &[u8]) -> Result<()> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) if value.get("success").and_then(Value::as_bool) == Some(false) => {
            unwrap_envelope(value, body).map(drop)
        }
        _ => Ok(()),
    }
}

/// Removes repeated collection ids, keeping the first occurrence of each.
///
/// # Example
///
/// ```
/// use bitwarden_sync::codec::dedup_collection_ids;
///
/// let ids = vec!["a".to_string(), "b".to_string(), "a".to_string()];
/// assert_eq!(dedup_collection_ids(ids), vec!["a", "b"]);
/// ```
pub fn dedup_collection_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Turns the combined output of a failed CLI call into a typed error.
///
/// `bw` reports missing objects with a plain-text `Not found.` rather than
/// JSON, so this never tries to parse.
pub fn classify_failure(output: &[u8]) -> BitwardenError {
    let text = String::from_utf8_lossy(output).trim().to_string();
    if text.contains(NOT_FOUND_MESSAGE) {
        BitwardenError::NotFound(text)
    } else {
        BitwardenError::Transport(text)
    }
}

fn parse(body: &[u8]) -> Result<Value> {
    serde_json::from_slice(body).map_err(|e| BitwardenError::decode(e, body))
}

/// Strips the `bw serve` envelope. A `success: false` envelope is classified
/// by its message.
fn unwrap_envelope(value: Value, body: &[u8]) -> Result<Value> {
    let Value::Object(mut map) = value else {
        return Ok(value);
    };

    match map.get("success").and_then(Value::as_bool) {
        Some(false) => {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Err(classify_failure(message.as_bytes()))
        }
        Some(true) => map
            .remove("data")
            .ok_or_else(|| BitwardenError::decode("envelope without data", body)),
        None if !map.contains_key("id") && map.contains_key("data") => {
            Ok(map.remove("data").unwrap_or(Value::Null))
        }
        None => Ok(Value::Object(map)),
    }
}

/// Serde adapters for the CLI's inconsistent field representations.
pub(crate) mod wire {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Treats an explicit `null` like a missing field.
    pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    /// Reprompt is an integer in older CLI output and a bool in some newer
    /// responses. Always written as `0`/`1`.
    pub mod reprompt {
        use serde::{Deserialize, Deserializer, Serializer};

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(i64),
            Bool(bool),
        }

        pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_u8(u8::from(*value))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
            Ok(match Option::<Repr>::deserialize(deserializer)? {
                None => false,
                Some(Repr::Bool(b)) => b,
                Some(Repr::Int(n)) => n != 0,
            })
        }
    }

    /// RFC 3339 revision dates; anything unparsable is dropped rather than
    /// failing the whole item.
    pub mod lenient_date {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(date) => {
                    serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Millis, true))
                }
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            Ok(raw
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|d| d.with_timezone(&Utc)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note() -> SecureNote {
        SecureNote::new("org-1", "deploy-notes", "rotate keys").with_collections(["c1", "c2"])
    }

    #[test]
    fn test_encode_fixed_type_and_placeholders() {
        let payload = encode_create(&note());
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["type"], 2);
        assert_eq!(value["secureNote"], json!({"type": 0}));
        assert_eq!(value["folderId"], Value::Null);
        assert_eq!(value["login"], Value::Null);
        assert_eq!(value["card"], Value::Null);
        assert_eq!(value["identity"], Value::Null);
        assert_eq!(value["fields"], Value::Null);
        assert_eq!(value["reprompt"], 0);
        assert!(value.get("favorite").is_none());
    }

    #[test]
    fn test_encode_optional_fields() {
        let payload = encode_create(
            &note()
                .with_folder("f1")
                .with_favorite(true)
                .with_reprompt(true),
        );
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["folderId"], "f1");
        assert_eq!(value["favorite"], true);
        assert_eq!(value["reprompt"], 1);
    }

    #[test]
    fn test_base64_decodes_to_payload_json() {
        let payload = encode_create(&note());
        let encoded = to_base64(&payload).unwrap();

        let raw = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        let back: ItemCreate = serde_json::from_slice(&raw).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_optional_fields_survive_decode() {
        for (folder, favorite, reprompt) in [
            (None, false, false),
            (Some("f1"), true, false),
            (None, false, true),
        ] {
            let mut n = note().with_favorite(favorite).with_reprompt(reprompt);
            n.folder_id = folder.map(str::to_string);
            let payload = encode_create(&n);

            let mut stored = serde_json::to_value(&payload).unwrap();
            stored["id"] = json!("11111111-2222-3333-4444-555555555555");
            stored["object"] = json!("item");
            let item = decode_item(stored.to_string().as_bytes()).unwrap();

            assert_eq!(item.folder_id.as_deref(), folder);
            assert_eq!(item.favorite, favorite);
            assert_eq!(item.reprompt, reprompt);
        }
    }

    #[test]
    fn test_decode_unwraps_envelope_and_dedups() {
        let body = json!({
            "success": true,
            "data": {
                "object": "item",
                "id": "abc",
                "type": 2,
                "name": "n",
                "collectionIds": ["c1", "c2", "c1", "c1"]
            }
        });

        let item = decode_item(body.to_string().as_bytes()).unwrap();
        assert_eq!(item.id, "abc");
        assert_eq!(item.collection_ids, vec!["c1", "c2"]);
    }

    #[test]
    fn test_decode_failure_envelope_not_found() {
        let body = br#"{"success":false,"message":"Not found."}"#;
        assert!(decode_item(body).unwrap_err().is_not_found());
    }

    #[test]
    fn test_decode_non_json_is_decode_error() {
        let err = decode_item(b"mac failed.").unwrap_err();
        match err {
            BitwardenError::Decode { body, .. } => assert_eq!(body, "mac failed."),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dedup_is_idempotent_and_set_preserving() {
        let inputs: Vec<Vec<&str>> = vec![
            vec![],
            vec!["a"],
            vec!["a", "a", "a"],
            vec!["b", "a", "b", "c", "a"],
        ];

        for input in inputs {
            let x: Vec<String> = input.iter().map(|s| s.to_string()).collect();
            let once = dedup_collection_ids(x.clone());
            let twice = dedup_collection_ids(once.clone());
            assert_eq!(once, twice);

            let before: HashSet<_> = x.iter().collect();
            let after: HashSet<_> = once.iter().collect();
            assert_eq!(before, after);
            assert_eq!(once.len(), after.len());
        }
    }

    #[test]
    fn test_decode_collections_list_envelope() {
        let body = json!({
            "success": true,
            "data": {
                "object": "list",
                "data": [
                    {"object": "collection", "id": "c1", "organizationId": "o1", "name": "Ops"},
                    {"object": "collection", "id": "c2", "organizationId": "o1", "name": "Dev"}
                ]
            }
        });

        let cols = decode_collections(body.to_string().as_bytes()).unwrap();
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[1].name, "Dev");

        let bare = br#"[{"id":"c3","name":"Bare"}]"#;
        assert_eq!(decode_collections(bare).unwrap()[0].id, "c3");
    }

    #[test]
    fn test_classify_failure() {
        assert!(classify_failure(b"Not found.\n").is_not_found());
        assert!(matches!(
            classify_failure(b"You are not logged in."),
            BitwardenError::Transport(_)
        ));
    }

    #[test]
    fn test_check_envelope() {
        assert!(check_envelope(b"").is_ok());
        assert!(check_envelope(br#"{"success":true}"#).is_ok());
        assert!(check_envelope(br#"{"success":true,"data":null}"#).is_ok());

        let err = check_envelope(br#"{"success":false,"message":"Not found."}"#).unwrap_err();
        assert!(err.is_not_found());

        let err = check_envelope(br#"{"success":false,"message":"Organization is locked."}"#)
            .unwrap_err();
        assert!(matches!(err, BitwardenError::Transport(_)));
    }
}
