//! Domain models for the vault
//!
//! A [`VaultEntry`] is the metadata half of a stored video; the encrypted
//! container it points to lives in the blob store.

use bridge_traits::storage::BlobRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a vault entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultEntryId(pub Uuid);

impl VaultEntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for VaultEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VaultEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One stored, encrypted video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEntry {
    pub id: VaultEntryId,
    /// Handle of the encrypted container in the blob store
    pub storage_reference: BlobRef,
    /// File name the plaintext had when it was ingested
    pub source_name: String,
    /// Resume point into the plaintext; a byte offset unless the player
    /// stores time offsets through `PlaybackSession::stop_at`
    pub last_position: u64,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
}

impl VaultEntry {
    /// New entry with a fresh id and `last_position` 0.
    pub fn new(storage_reference: BlobRef, source_name: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: VaultEntryId::new(),
            storage_reference,
            source_name: source_name.into(),
            last_position: 0,
            created_at,
        }
    }

    /// Name shown in listings: the source file name without its extension.
    ///
    /// Never empty. Falls back to the full source name (e.g. `.mp4`), then
    /// to the entry id.
    pub fn display_name(&self) -> String {
        let stem = match self.source_name.rsplit_once('.') {
            Some((stem, _ext)) => stem,
            None => self.source_name.as_str(),
        };

        if !stem.trim().is_empty() {
            stem.to_string()
        } else if !self.source_name.trim().is_empty() {
            self.source_name.clone()
        } else {
            self.id.to_string()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.storage_reference.as_str().is_empty() {
            return Err("Storage reference cannot be empty".to_string());
        }
        if self.last_position > i64::MAX as u64 {
            return Err("Position exceeds the storable range".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(source_name: &str) -> VaultEntry {
        VaultEntry::new(BlobRef::new("x.vault"), source_name, 0)
    }

    #[test]
    fn test_display_name_strips_last_extension() {
        assert_eq!(entry("holiday.mp4").display_name(), "holiday");
        assert_eq!(entry("clip.final.webm").display_name(), "clip.final");
        assert_eq!(entry("no_extension").display_name(), "no_extension");
    }

    #[test]
    fn test_display_name_is_never_empty() {
        assert_eq!(entry(".mp4").display_name(), ".mp4");

        let nameless = entry("");
        assert_eq!(nameless.display_name(), nameless.id.to_string());
    }

    #[test]
    fn test_new_entry_starts_at_zero() {
        let e = entry("a.mkv");
        assert_eq!(e.last_position, 0);
        assert!(e.validate().is_ok());
    }

    #[test]
    fn test_id_round_trips_through_string() {
        let id = VaultEntryId::new();
        assert_eq!(VaultEntryId::from_string(&id.to_string()).unwrap(), id);
        assert!(VaultEntryId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_entry_serializes_reference_as_string() {
        let e = entry("a.mp4");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["storage_reference"], "x.vault");
        assert_eq!(json["last_position"], 0);
    }
}
