//! Input validation before anything reaches a `bw` command line or URL path.

use crate::{BitwardenError, Result, SecureNote};

/// Maximum accepted length of an item name.
const MAX_NAME_LENGTH: usize = 1000;

/// Validates a vault object id (item, organization, folder, collection).
///
/// Bitwarden ids are UUIDs. Checking that up front also keeps flags and
/// path separators out of subprocess arguments and `bw serve` URLs.
///
/// # Example
///
/// ```
/// use bitwarden_sync::validation::validate_id;
///
/// assert!(validate_id("item", "7d0c9a0e-3b6f-4f4e-9f2e-1a2b3c4d5e6f").is_ok());
///
/// assert!(validate_id("item", "").is_err());
/// assert!(validate_id("item", "--session").is_err());
/// assert!(validate_id("item", "../sync").is_err());
/// ```
pub fn validate_id(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(BitwardenError::InvalidInput(format!(
            "{} id cannot be empty",
            kind
        )));
    }

    uuid::Uuid::parse_str(id).map_err(|_| {
        BitwardenError::InvalidInput(format!("{} id {:?} is not a valid UUID", kind, id))
    })?;

    Ok(())
}

/// Validates an item name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(BitwardenError::InvalidInput(
            "name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(BitwardenError::InvalidInput(format!(
            "name exceeds maximum length of {} characters",
            MAX_NAME_LENGTH
        )));
    }

    if name.contains('\0') {
        return Err(BitwardenError::InvalidInput(
            "name contains null byte".to_string(),
        ));
    }

    Ok(())
}

/// Validates every id and the name of a note.
pub fn validate_note(note: &SecureNote) -> Result<()> {
    validate_id("organization", &note.organization_id)?;
    validate_name(&note.name)?;

    if let Some(folder) = &note.folder_id {
        validate_id("folder", folder)?;
    }

    for collection in &note.collection_ids {
        validate_id("collection", collection)?;
    }

    Ok(())
}
