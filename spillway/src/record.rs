//! Generic item-store record shape and its wire form.
//!
//! On the wire a record is a flat document with a primary id, the owning type
//! tag and two optional slots: the inline snapshot under [`FIELD_STATE`] and
//! the overflow pointer sub-document under [`FIELD_BLOB_LOCATION`]. At most
//! one slot is ever filled.

use serde::{Deserialize, Serialize, Serializer};

use crate::{
    base::EntityRef,
    errors::{Result, StoreError},
    wrapper::{OverflowPointer, StateWrapper},
};

pub const FIELD_PRIMARY_ID: &str = "_id";
pub const FIELD_OWNING_TYPE: &str = "_owningType";
pub const FIELD_STATE: &str = "_state";
pub const FIELD_BLOB_LOCATION: &str = "_blobLocation";

/// Item-store record of one entity.
///
/// Human-readable formats get the document form, which leaves the empty slot
/// out. Compact formats get every field in a fixed order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawItemRecord")]
pub struct ItemRecord {
    pub id: String,
    pub owning_type: String,
    /// `None` for a record which exists but holds no data yet.
    pub state: Option<StateWrapper>,
}

// Field names have to stay in sync with the FIELD_* constants, field order with `WireRecord`.
#[derive(Debug, Clone, Deserialize)]
struct RawItemRecord {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_owningType")]
    owning_type: String,
    #[serde(rename = "_state", default)]
    state: Option<String>,
    #[serde(rename = "_blobLocation", default)]
    blob_location: Option<OverflowPointer>,
}

#[derive(Serialize)]
struct WireRecord<'a> {
    #[serde(rename = "_id")]
    id: &'a str,
    #[serde(rename = "_owningType")]
    owning_type: &'a str,
    #[serde(rename = "_state")]
    state: Option<&'a str>,
    #[serde(rename = "_blobLocation")]
    blob_location: Option<&'a OverflowPointer>,
}

#[derive(Serialize)]
struct DocumentRecord<'a> {
    #[serde(rename = "_id")]
    id: &'a str,
    #[serde(rename = "_owningType")]
    owning_type: &'a str,
    #[serde(rename = "_state", skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    #[serde(rename = "_blobLocation", skip_serializing_if = "Option::is_none")]
    blob_location: Option<&'a OverflowPointer>,
}

#[derive(Debug, thiserror::Error)]
#[error("record {0} carries both _state and _blobLocation")]
pub struct ConflictingFields(String);

// Implementations

impl ItemRecord {
    pub fn new(entity: &EntityRef, wrapper: StateWrapper) -> Self {
        Self {
            id: entity.item_id(),
            owning_type: entity.owning_type().to_string(),
            state: Some(wrapper),
        }
    }

    pub fn is_overflowed(&self) -> bool {
        self.state.as_ref().is_some_and(StateWrapper::is_overflowed)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        postcard::to_stdvec(self).map_err(|e| StoreError::encode("item record", e))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        postcard::from_bytes(bytes).map_err(|e| StoreError::decode("item record", e))
    }
}

impl TryFrom<RawItemRecord> for ItemRecord {
    type Error = ConflictingFields;

    fn try_from(raw: RawItemRecord) -> Result<Self, Self::Error> {
        let state = match (raw.state, raw.blob_location) {
            (None, None) => None,
            (Some(state), None) => Some(StateWrapper::Inline(state)),
            (None, Some(pointer)) => Some(StateWrapper::Overflowed(pointer)),
            (Some(_), Some(_)) => return Err(ConflictingFields(raw.id)),
        };

        Ok(Self {
            id: raw.id,
            owning_type: raw.owning_type,
            state,
        })
    }
}

impl Serialize for ItemRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (state, blob_location) = match &self.state {
            None => (None, None),
            Some(StateWrapper::Inline(state)) => (Some(state.as_str()), None),
            Some(StateWrapper::Overflowed(pointer)) => (None, Some(pointer)),
        };

        if serializer.is_human_readable() {
            DocumentRecord {
                id: &self.id,
                owning_type: &self.owning_type,
                state,
                blob_location,
            }
            .serialize(serializer)
        } else {
            WireRecord {
                id: &self.id,
                owning_type: &self.owning_type,
                state,
                blob_location,
            }
            .serialize(serializer)
        }
    }
}
