use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Location of a snapshot which did not fit into the item store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverflowPointer {
    pub bucket: String,
    pub key: String,
}

/// Per-request envelope hiding which tier holds a snapshot.
///
/// `Inline` carries the serialized snapshot itself, `Overflowed` only the
/// pointer to the blob holding it. Being an enum, a wrapper can never carry
/// both at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateWrapper {
    Inline(String),
    Overflowed(OverflowPointer),
}

/// Store currently holding the authoritative snapshot of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Inline,
    Overflow,
}

// Implementations

impl OverflowPointer {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl Display for OverflowPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

impl StateWrapper {
    pub fn is_overflowed(&self) -> bool {
        matches!(self, StateWrapper::Overflowed(_))
    }

    pub fn state(&self) -> Option<&str> {
        match self {
            StateWrapper::Inline(state) => Some(state),
            StateWrapper::Overflowed(_) => None,
        }
    }

    pub fn pointer(&self) -> Option<&OverflowPointer> {
        match self {
            StateWrapper::Inline(_) => None,
            StateWrapper::Overflowed(pointer) => Some(pointer),
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            StateWrapper::Inline(_) => Tier::Inline,
            StateWrapper::Overflowed(_) => Tier::Overflow,
        }
    }
}
