//! Contracts of the two backing stores and the reference adapters.

use std::future::Future;

use bytes::Bytes;

use crate::{errors::Result, record::ItemRecord, wrapper::OverflowPointer};

#[cfg(feature = "local_fs")]
pub mod local_fs;
pub mod memory;

/// Default per-record ceiling of the reference item stores, in bytes.
pub const DEFAULT_MAX_RECORD_SIZE: usize = 400 * 1024;

/// Low-latency key-value store with a hard per-record size ceiling.
///
/// `put` must report a record over the ceiling as
/// [`StoreError::SizeLimitExceeded`](crate::errors::StoreError::SizeLimitExceeded)
/// and nothing else; every other failure is taken as fatal by the caller.
pub trait ItemStore: Send + Sync {
    fn start(&self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    fn stop(&self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Create or overwrite the record under `record.id`.
    fn put(&self, record: ItemRecord) -> impl Future<Output = Result<()>> + Send;

    fn get(&self, id: &str) -> impl Future<Output = Result<Option<ItemRecord>>> + Send;

    /// Remove the record. Removing a missing record succeeds.
    fn clear(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Object store without a practical size ceiling.
pub trait BlobStore: Send + Sync {
    fn start(&self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    fn stop(&self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    fn put(&self, pointer: &OverflowPointer, payload: Bytes)
    -> impl Future<Output = Result<()>> + Send;

    fn get(&self, pointer: &OverflowPointer) -> impl Future<Output = Result<Option<Bytes>>> + Send;

    /// Remove the object. Removing a missing object succeeds.
    fn clear(&self, pointer: &OverflowPointer) -> impl Future<Output = Result<()>> + Send;
}
