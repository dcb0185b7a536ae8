//! JSON document form of actor snapshots.
//!
//! Top-level members which are `null` are left out of the stored document.
//! Reading merges the stored members into a caller-provided snapshot, so
//! defaults already set on it survive members which were null when written.
//! A patched snapshot which no longer deserializes, e.g. an enum switching
//! variant, is replaced by the stored document as a whole.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::errors::{Result, StoreError};

/// Serialize a snapshot into the document stored in either tier.
pub fn encode<S: Serialize + ?Sized>(snapshot: &S) -> Result<String> {
    let mut doc = serde_json::to_value(snapshot).map_err(|e| StoreError::encode("snapshot", e))?;

    if let Value::Object(members) = &mut doc {
        members.retain(|_, v| !v.is_null());
    }

    serde_json::to_string(&doc).map_err(|e| StoreError::encode("snapshot", e))
}

/// Patch `out` with the members present in a stored document.
pub fn merge_into<S>(out: &mut S, stored: &[u8]) -> Result<()>
where
    S: Serialize + DeserializeOwned,
{
    let stored: Value =
        serde_json::from_slice(stored).map_err(|e| StoreError::decode("snapshot", e))?;

    if stored.is_null() {
        return Ok(());
    }

    if let (Value::Object(patch), Ok(Value::Object(mut base))) =
        (&stored, serde_json::to_value(&*out))
    {
        for (name, value) in patch {
            if !value.is_null() {
                base.insert(name.clone(), value.clone());
            }
        }

        // Externally tagged enums switching variant do not survive a member-wise patch
        if let Ok(merged) = serde_json::from_value(Value::Object(base)) {
            *out = merged;
            return Ok(());
        }
    }

    *out = serde_json::from_value(stored).map_err(|e| StoreError::decode("snapshot", e))?;

    Ok(())
}
