use std::{any, borrow::Cow, fmt::Display};

use serde::{Deserialize, Serialize};

/// Unique identifier of an actor instance in the hosting runtime.
pub type ActorId = uuid::Uuid;

/// Identity of the entity owning a snapshot.
///
/// The owning type tag is recorded next to every item-store record so that
/// records of different actor types sharing one table stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    owning_type: Cow<'static, str>,
    identity: String,
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        {#[cfg(feature = "tracing")] tracing::trace!($($arg)*);}
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        {#[cfg(feature = "tracing")] tracing::debug!($($arg)*);}
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        {#[cfg(feature = "tracing")] tracing::info!($($arg)*);}
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        {#[cfg(feature = "tracing")] tracing::warn!($($arg)*);}
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        {#[cfg(feature = "tracing")] tracing::error!($($arg)*);}
    };
}

// Implementations

impl EntityRef {
    pub fn new(owning_type: impl Into<Cow<'static, str>>, identity: impl Into<String>) -> Self {
        Self {
            owning_type: owning_type.into(),
            identity: identity.into(),
        }
    }

    /// Reference an entity whose owning type is the Rust type `T`.
    pub fn of<T: ?Sized>(identity: impl Into<String>) -> Self {
        Self::new(any::type_name::<T>(), identity)
    }

    /// Reference the snapshot of an actor instance.
    pub fn from_actor_id<T: ?Sized>(id: ActorId) -> Self {
        Self::of::<T>(id.to_string())
    }

    pub fn owning_type(&self) -> &str {
        &self.owning_type
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Primary id of the entity's item-store record.
    ///
    /// `-` and `%` in the owning type are percent-escaped, so the first `-`
    /// always ends the type tag.
    pub fn item_id(&self) -> String {
        if !self.owning_type.contains(['-', '%']) {
            return format!("{}-{}", self.owning_type, self.identity);
        }

        let owning_type = self.owning_type.replace('%', "%25").replace('-', "%2D");
        format!("{owning_type}-{}", self.identity)
    }

    /// Object key of the entity's snapshot in the blob tier.
    pub fn blob_key(&self) -> String {
        self.item_id()
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owning_type, self.identity)
    }
}
