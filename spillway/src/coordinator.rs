use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    base::EntityRef,
    config::TierConfig,
    debug,
    errors::{Result, StoreError, join_outcomes},
    info,
    record::ItemRecord,
    snapshot,
    store::{BlobStore, ItemStore},
    trace, warn,
    wrapper::{OverflowPointer, StateWrapper, Tier},
};

/// Storage extension spreading actor snapshots over an item store and a blob store.
///
/// Snapshots are written inline into the item store whenever it accepts them.
/// When the item store rejects a record for its size, the snapshot goes to
/// the blob store and the item record keeps only a pointer to it. Reads follow
/// the pointer transparently.
///
/// The coordinator does no locking of its own. The hosting runtime is expected
/// to run at most one operation per entity at a time.
#[derive(Debug)]
pub struct TierCoordinator<I, B> {
    config: TierConfig,
    items: I,
    blobs: B,
    started: AtomicBool,
}

// Implementations

impl<I, B> TierCoordinator<I, B>
where
    I: ItemStore,
    B: BlobStore,
{
    pub fn new(config: TierConfig, items: I, blobs: B) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            items,
            blobs,
            started: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    pub fn item_store(&self) -> &I {
        &self.items
    }

    pub fn blob_store(&self) -> &B {
        &self.blobs
    }

    /// Start both stores. Calling it on a started coordinator does nothing.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        info!(
            "Starting storage extension {} on table {} and bucket {}",
            self.config.name, self.config.item_store.table, self.config.blob_store.bucket
        );

        let (items, blobs) = futures::join!(self.items.start(), self.blobs.start());
        let res = join_outcomes(items, blobs);

        if res.is_err() {
            self.started.store(false, Ordering::Release);
        }

        res
    }

    /// Stop both stores. Calling it on a stopped coordinator does nothing.
    pub async fn stop(&self) -> Result<()> {
        if !self.started.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        info!("Stopping storage extension {}", self.config.name);

        let (items, blobs) = futures::join!(self.items.stop(), self.blobs.stop());
        join_outcomes(items, blobs)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Persist `snapshot` as the state of `entity`.
    ///
    /// Only [`StoreError::SizeLimitExceeded`] from the item store diverts the
    /// write to the blob tier. Any other failure is returned as is.
    pub async fn write_state<S>(&self, entity: &EntityRef, snapshot: &S) -> Result<()>
    where
        S: Serialize + ?Sized,
    {
        let document = snapshot::encode(snapshot)?;
        let inline = StateWrapper::Inline(document.clone());

        match self.items.put(ItemRecord::new(entity, inline)).await {
            Ok(()) => {
                trace!("Wrote state of {entity} inline");
                return Ok(());
            }
            Err(e) if e.is_size_limit() => {
                debug!("State of {entity} does not fit the item store ({e}), overflowing");
            }
            Err(e) => return Err(e),
        }

        let pointer = self.pointer_for(entity);
        let overflowed = StateWrapper::Overflowed(pointer.clone());

        let (blob, item) = futures::join!(
            self.blobs.put(&pointer, Bytes::from(document)),
            self.items.put(ItemRecord::new(entity, overflowed)),
        );

        join_outcomes(blob, item)
    }

    /// Merge the stored state of `entity` into `out`.
    ///
    /// Returns `false`, leaving `out` untouched, when nothing is stored yet.
    /// Members absent or null in the stored state keep their value in `out`.
    pub async fn read_state<S>(&self, entity: &EntityRef, out: &mut S) -> Result<bool>
    where
        S: Serialize + DeserializeOwned,
    {
        let Some(wrapper) = self.load(entity).await? else {
            trace!("No state stored for {entity}");
            return Ok(false);
        };

        match wrapper {
            StateWrapper::Inline(document) => {
                snapshot::merge_into(out, document.as_bytes())?;
            }
            StateWrapper::Overflowed(pointer) => {
                let Some(payload) = self.blobs.get(&pointer).await? else {
                    return Err(StoreError::DanglingPointer(pointer));
                };

                trace!("Read state of {entity} from blob {pointer}");
                snapshot::merge_into(out, &payload)?;
            }
        }

        Ok(true)
    }

    /// Remove the state of `entity` from every tier holding it.
    ///
    /// Nothing is deleted when no item record exists. Otherwise the item
    /// record and, for an overflowed state, the blob are deleted side by side
    /// and a failure of either is reported without undoing the other.
    /// A record which fails to decode is deleted on its own, as its blob
    /// cannot be located.
    pub async fn clear_state(&self, entity: &EntityRef) -> Result<()> {
        let id = entity.item_id();

        let record = match self.items.get(&id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                trace!("No state stored for {entity}, nothing to clear");
                return Ok(());
            }
            Err(e) if e.is_decode() => {
                warn!("Clearing undecodable record of {entity}: {e}");
                return self.items.clear(&id).await;
            }
            Err(e) => return Err(e),
        };

        match record.state {
            Some(StateWrapper::Overflowed(pointer)) => {
                let (item, blob) = futures::join!(self.items.clear(&id), self.blobs.clear(&pointer));
                join_outcomes(item, blob)
            }
            _ => self.items.clear(&id).await,
        }
    }

    /// Tier currently holding the state of `entity`, if any.
    pub async fn tier_of(&self, entity: &EntityRef) -> Result<Option<Tier>> {
        Ok(self.load(entity).await?.as_ref().map(StateWrapper::tier))
    }

    fn pointer_for(&self, entity: &EntityRef) -> OverflowPointer {
        OverflowPointer::new(&self.config.blob_store.bucket, entity.blob_key())
    }

    async fn load(&self, entity: &EntityRef) -> Result<Option<StateWrapper>> {
        Ok(self
            .items
            .get(&entity.item_id())
            .await?
            .and_then(|record| record.state))
    }
}

#[cfg(feature = "local_fs")]
impl TierCoordinator<crate::store::local_fs::LocalFsItemStore, crate::store::local_fs::LocalFsBlobStore> {
    /// Build a coordinator over the local filesystem stores named by `config`.
    pub fn local_fs(config: TierConfig) -> Result<Self> {
        use crate::store::local_fs::{LocalFsBlobStore, LocalFsItemStore};

        let items = LocalFsItemStore::from_config(&config.item_store)?;
        let blobs = LocalFsBlobStore::from_config(&config.blob_store)?;

        Self::new(config, items, blobs)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        error::Error,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use anyhow::anyhow;
    use serde::Deserialize;

    use super::*;
    use crate::store::memory::{MemoryBlobStore, MemoryItemStore};

    /// Memory stores with switchable failures and call counters.
    #[derive(Debug, Clone)]
    struct Faulty<S> {
        inner: S,
        fail_put: bool,
        fail_clear: bool,
        corrupt_get: bool,
        puts: Arc<AtomicUsize>,
        clears: Arc<AtomicUsize>,
        starts: Arc<AtomicUsize>,
    }

    impl<S> Faulty<S> {
        fn new(inner: S) -> Self {
            Self {
                inner,
                fail_put: false,
                fail_clear: false,
                corrupt_get: false,
                puts: Default::default(),
                clears: Default::default(),
                starts: Default::default(),
            }
        }
    }

    impl ItemStore for Faulty<MemoryItemStore> {
        async fn start(&self) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn put(&self, record: ItemRecord) -> Result<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if self.fail_put {
                return Err(anyhow!("ProvisionedThroughputExceeded").into());
            }
            self.inner.put(record).await
        }

        async fn get(&self, id: &str) -> Result<Option<ItemRecord>> {
            if self.corrupt_get {
                // Both slots filled, as left behind by a foreign writer
                let doc = serde_json::json!({
                    "_id": id,
                    "_owningType": "Hello",
                    "_state": "{}",
                    "_blobLocation": { "bucket": "orbit-bucket", "key": id },
                });
                return serde_json::from_value(doc)
                    .map(Some)
                    .map_err(|e| StoreError::decode("item record", e));
            }
            self.inner.get(id).await
        }

        async fn clear(&self, id: &str) -> Result<()> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            if self.fail_clear {
                return Err(anyhow!("item delete refused").into());
            }
            self.inner.clear(id).await
        }
    }

    impl BlobStore for Faulty<MemoryBlobStore> {
        async fn start(&self) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn put(&self, pointer: &OverflowPointer, payload: Bytes) -> Result<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if self.fail_put {
                return Err(anyhow!("bucket unavailable").into());
            }
            self.inner.put(pointer, payload).await
        }

        async fn get(&self, pointer: &OverflowPointer) -> Result<Option<Bytes>> {
            self.inner.get(pointer).await
        }

        async fn clear(&self, pointer: &OverflowPointer) -> Result<()> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            if self.fail_clear {
                return Err(anyhow!("blob delete refused").into());
            }
            self.inner.clear(pointer).await
        }
    }

    type Probe = TierCoordinator<Faulty<MemoryItemStore>, Faulty<MemoryBlobStore>>;

    fn probe(items: Faulty<MemoryItemStore>, blobs: Faulty<MemoryBlobStore>) -> Probe {
        TierCoordinator::new(TierConfig::new("orbit", "orbit-bucket"), items, blobs).unwrap()
    }

    fn small_items() -> Faulty<MemoryItemStore> {
        Faulty::new(MemoryItemStore::with_max_record_size(128))
    }

    fn entity() -> EntityRef {
        EntityRef::new("Hello", "sampleData")
    }

    #[test]
    fn test_new_rejects_blank_bucket() {
        let res = TierCoordinator::new(
            TierConfig::new("orbit", ""),
            MemoryItemStore::new(),
            MemoryBlobStore::new(),
        );

        assert!(matches!(res, Err(StoreError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_other_put_failure_is_not_overflowed() {
        let mut items = small_items();
        items.fail_put = true;
        let blobs = Faulty::new(MemoryBlobStore::new());
        let coordinator = probe(items, blobs.clone());

        let e = coordinator
            .write_state(&entity(), &"X".repeat(1024))
            .await
            .unwrap_err();

        assert_eq!(e.to_string(), "ProvisionedThroughputExceeded");
        assert_eq!(blobs.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_overflow_blob_failure_keeps_pointer() {
        let items = small_items();
        let mut blobs = Faulty::new(MemoryBlobStore::new());
        blobs.fail_put = true;
        let coordinator = probe(items.clone(), blobs);

        let e = coordinator
            .write_state(&entity(), &"X".repeat(1024))
            .await
            .unwrap_err();
        assert_eq!(e.to_string(), "bucket unavailable");

        // No compensation: the pointer record stays behind
        let record = items.inner.get("Hello-sampleData").await.unwrap().unwrap();
        assert!(record.is_overflowed());

        let mut out = String::new();
        let e = coordinator.read_state(&entity(), &mut out).await.unwrap_err();
        assert!(matches!(e, StoreError::DanglingPointer(_)));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_overflow_double_failure_is_aggregated() {
        let mut blobs = Faulty::new(MemoryBlobStore::new());
        blobs.fail_put = true;

        // Inline attempt is rejected for size, the pointer write then fails outright
        #[derive(Debug)]
        struct RejectAll;

        impl ItemStore for RejectAll {
            async fn put(&self, record: ItemRecord) -> Result<()> {
                match record.state {
                    Some(StateWrapper::Inline(_)) => Err(StoreError::SizeLimitExceeded {
                        size: usize::MAX,
                        limit: 0,
                    }),
                    _ => Err(anyhow!("table is being deleted").into()),
                }
            }

            async fn get(&self, _id: &str) -> Result<Option<ItemRecord>> {
                Ok(None)
            }

            async fn clear(&self, _id: &str) -> Result<()> {
                Ok(())
            }
        }

        let coordinator =
            TierCoordinator::new(TierConfig::new("orbit", "orbit-bucket"), RejectAll, blobs)
                .unwrap();

        let e = coordinator.write_state(&entity(), "tiny").await.unwrap_err();

        let StoreError::Aggregate(errors) = e else {
            panic!("expected aggregate failure, got {e:?}");
        };
        assert_eq!(errors.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_without_record_issues_no_deletes() {
        let items = small_items();
        let blobs = Faulty::new(MemoryBlobStore::new());
        let coordinator = probe(items.clone(), blobs.clone());

        coordinator.clear_state(&entity()).await.unwrap();

        assert_eq!(items.clears.load(Ordering::SeqCst), 0);
        assert_eq!(blobs.clears.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clear_inline_leaves_blob_store_alone() {
        let items = small_items();
        let blobs = Faulty::new(MemoryBlobStore::new());
        let coordinator = probe(items.clone(), blobs.clone());

        coordinator.write_state(&entity(), "tiny").await.unwrap();
        coordinator.clear_state(&entity()).await.unwrap();

        assert_eq!(items.clears.load(Ordering::SeqCst), 1);
        assert_eq!(blobs.clears.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.tier_of(&entity()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_blob_failure_still_removes_record() {
        let items = small_items();
        let mut blobs = Faulty::new(MemoryBlobStore::new());
        blobs.fail_clear = true;
        let coordinator = probe(items.clone(), blobs.clone());

        coordinator
            .write_state(&entity(), &"X".repeat(1024))
            .await
            .unwrap();

        let e = coordinator.clear_state(&entity()).await.unwrap_err();
        assert_eq!(e.to_string(), "blob delete refused");

        assert!(items.inner.get("Hello-sampleData").await.unwrap().is_none());
        assert_eq!(blobs.inner.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_double_failure_is_aggregated() {
        let mut items = small_items();
        items.fail_clear = true;
        let mut blobs = Faulty::new(MemoryBlobStore::new());
        blobs.fail_clear = true;
        let coordinator = probe(items, blobs);

        coordinator
            .write_state(&entity(), &"X".repeat(1024))
            .await
            .unwrap();

        let e = coordinator.clear_state(&entity()).await.unwrap_err();
        assert_eq!(
            e.to_string(),
            "2 storage operations failed: item delete refused; blob delete refused"
        );
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let items = small_items();
        let blobs = Faulty::new(MemoryBlobStore::new());
        let coordinator = probe(items.clone(), blobs.clone());

        coordinator.stop().await.unwrap();
        assert!(!coordinator.is_started());

        coordinator.start().await.unwrap();
        coordinator.start().await.unwrap();
        assert!(coordinator.is_started());
        assert_eq!(items.starts.load(Ordering::SeqCst), 1);
        assert_eq!(blobs.starts.load(Ordering::SeqCst), 1);

        coordinator.stop().await.unwrap();
        coordinator.stop().await.unwrap();
        assert!(!coordinator.is_started());

        coordinator.start().await.unwrap();
        assert_eq!(items.starts.load(Ordering::SeqCst), 2);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Phase {
        Idle { since: u64 },
        Running { pid: u32 },
    }

    #[tokio::test]
    async fn test_read_switches_enum_variant() {
        let coordinator = probe(small_items(), Faulty::new(MemoryBlobStore::new()));

        coordinator
            .write_state(&entity(), &Phase::Running { pid: 5 })
            .await
            .unwrap();

        let mut out = Phase::Idle { since: 0 };
        assert!(coordinator.read_state(&entity(), &mut out).await.unwrap());
        assert_eq!(out, Phase::Running { pid: 5 });
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Journal {
        owner: Option<String>,
        entries: Vec<String>,
    }

    #[tokio::test]
    async fn test_overflowed_read_merges_into_defaults() {
        let coordinator = probe(small_items(), Faulty::new(MemoryBlobStore::new()));
        let written = Journal {
            owner: None,
            entries: vec!["X".repeat(512)],
        };

        coordinator.write_state(&entity(), &written).await.unwrap();
        assert_eq!(
            coordinator.tier_of(&entity()).await.unwrap(),
            Some(Tier::Overflow)
        );

        let mut out = Journal {
            owner: Some("preset".into()),
            entries: vec!["stale".into()],
        };
        assert!(coordinator.read_state(&entity(), &mut out).await.unwrap());

        assert_eq!(out.owner.as_deref(), Some("preset"));
        assert_eq!(out.entries, written.entries);
    }

    #[tokio::test]
    async fn test_malformed_inline_snapshot_is_decode_error() {
        let items = small_items();
        let coordinator = probe(items.clone(), Faulty::new(MemoryBlobStore::new()));

        let record = ItemRecord::new(&entity(), StateWrapper::Inline("{not json".into()));
        items.inner.put(record).await.unwrap();

        let mut out = Journal::default();
        let e = coordinator.read_state(&entity(), &mut out).await.unwrap_err();

        assert!(matches!(e, StoreError::Decode { what: "snapshot", .. }));
        assert_eq!(out, Journal::default());
    }

    #[tokio::test]
    async fn test_malformed_blob_is_decode_error() {
        let items = small_items();
        let blobs = Faulty::new(MemoryBlobStore::new());
        let coordinator = probe(items.clone(), blobs.clone());

        let pointer = OverflowPointer::new("orbit-bucket", entity().blob_key());
        let record = ItemRecord::new(&entity(), StateWrapper::Overflowed(pointer.clone()));
        items.inner.put(record).await.unwrap();
        blobs
            .inner
            .put(&pointer, Bytes::from_static(b"\x00\x01garbage"))
            .await
            .unwrap();

        let mut out = Journal::default();
        let e = coordinator.read_state(&entity(), &mut out).await.unwrap_err();

        assert!(matches!(e, StoreError::Decode { what: "snapshot", .. }));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_decode_error() {
        let mut items = small_items();
        items.corrupt_get = true;
        let coordinator = probe(items, Faulty::new(MemoryBlobStore::new()));

        let mut out = Journal::default();
        let e = coordinator.read_state(&entity(), &mut out).await.unwrap_err();

        assert!(matches!(e, StoreError::Decode { what: "item record", .. }));
        assert!(e.source().unwrap().to_string().contains("carries both"));
    }

    #[tokio::test]
    async fn test_clear_removes_corrupt_record() {
        let mut items = small_items();
        items.corrupt_get = true;
        let blobs = Faulty::new(MemoryBlobStore::new());
        let coordinator = probe(items.clone(), blobs.clone());

        items
            .inner
            .put(ItemRecord::new(&entity(), StateWrapper::Inline("{}".into())))
            .await
            .unwrap();

        coordinator.clear_state(&entity()).await.unwrap();

        assert_eq!(items.clears.load(Ordering::SeqCst), 1);
        assert_eq!(blobs.clears.load(Ordering::SeqCst), 0);
        assert!(items.inner.is_empty());
    }
}
