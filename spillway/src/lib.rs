//! Tiered persistence of actor state snapshots.
//!
//! Snapshots are kept in a low-latency [`ItemStore`](store::ItemStore) as long
//! as they fit its per-record ceiling, and spill over into a
//! [`BlobStore`](store::BlobStore) once they do not. The
//! [`TierCoordinator`](coordinator::TierCoordinator) hides which tier holds a
//! given snapshot from the runtime reading and writing it.

pub mod base;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod record;
pub mod snapshot;
pub mod store;
pub mod wrapper;

// Re-exports

pub mod prelude {
    pub use crate::base::{ActorId, EntityRef};
    pub use crate::config::{BlobStoreConfig, Credentials, ItemStoreConfig, TierConfig};
    pub use crate::coordinator::TierCoordinator;
    pub use crate::errors::{Result, StoreError};
    pub use crate::store::{
        BlobStore, ItemStore,
        memory::{MemoryBlobStore, MemoryItemStore},
    };
    pub use crate::wrapper::{OverflowPointer, StateWrapper, Tier};

    #[cfg(feature = "local_fs")]
    pub use crate::store::local_fs::{LocalFsBlobStore, LocalFsItemStore};
}
