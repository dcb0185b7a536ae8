use std::sync::{Arc, PoisonError, RwLock};

use anyhow::anyhow;
use bytes::Bytes;
use rustc_hash::FxHashMap;

use crate::{
    errors::{Result, StoreError},
    record::ItemRecord,
    store::{BlobStore, DEFAULT_MAX_RECORD_SIZE, ItemStore},
    trace,
    wrapper::OverflowPointer,
};

/// Process-local item store.
///
/// Clones share the same records, so a coordinator built over a clone sees
/// everything written through the original. Records are kept postcard encoded
/// and the ceiling is checked against the encoded length.
#[derive(Debug, Clone)]
pub struct MemoryItemStore {
    records: Arc<RwLock<FxHashMap<String, Vec<u8>>>>,
    max_record_size: usize,
}

/// Process-local blob store, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<RwLock<FxHashMap<OverflowPointer, Bytes>>>,
}

// Implementations

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::with_max_record_size(DEFAULT_MAX_RECORD_SIZE)
    }

    pub fn with_max_record_size(max_record_size: usize) -> Self {
        Self {
            records: Default::default(),
            max_record_size,
        }
    }

    pub fn max_record_size(&self) -> usize {
        self.max_record_size
    }

    /// Number of records held. A poisoned lock is read through, the map is never left half-updated.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemStore for MemoryItemStore {
    async fn put(&self, record: ItemRecord) -> Result<()> {
        let bytes = record.to_bytes()?;

        if bytes.len() > self.max_record_size {
            return Err(StoreError::SizeLimitExceeded {
                size: bytes.len(),
                limit: self.max_record_size,
            });
        }

        trace!("Putting item record {} ({} bytes)", record.id, bytes.len());

        self.records
            .write()
            .map_err(|_| anyhow!("item store lock poisoned"))?
            .insert(record.id, bytes);

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ItemRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("item store lock poisoned"))?;

        records
            .get(id)
            .map(|bytes| ItemRecord::from_bytes(bytes))
            .transpose()
    }

    async fn clear(&self, id: &str) -> Result<()> {
        self.records
            .write()
            .map_err(|_| anyhow!("item store lock poisoned"))?
            .remove(id);

        Ok(())
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Like [`MemoryItemStore::len`], reads through a poisoned lock.
    pub fn contains(&self, pointer: &OverflowPointer) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(pointer)
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    async fn put(&self, pointer: &OverflowPointer, payload: Bytes) -> Result<()> {
        trace!("Putting blob {pointer} ({} bytes)", payload.len());

        self.objects
            .write()
            .map_err(|_| anyhow!("blob store lock poisoned"))?
            .insert(pointer.clone(), payload);

        Ok(())
    }

    async fn get(&self, pointer: &OverflowPointer) -> Result<Option<Bytes>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| anyhow!("blob store lock poisoned"))?;

        Ok(objects.get(pointer).cloned())
    }

    async fn clear(&self, pointer: &OverflowPointer) -> Result<()> {
        self.objects
            .write()
            .map_err(|_| anyhow!("blob store lock poisoned"))?
            .remove(pointer);

        Ok(())
    }
}
