use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::anyhow;
use bytes::Bytes;
use url::{Url, form_urlencoded};
use uuid::Uuid;

use crate::{
    config::{BlobStoreConfig, ItemStoreConfig},
    debug,
    errors::{Result, StoreError},
    record::ItemRecord,
    store::{BlobStore, DEFAULT_MAX_RECORD_SIZE, ItemStore},
    wrapper::OverflowPointer,
};

/// Item store keeping one postcard-encoded file per record.
///
/// Records live under `<root>/<table>/`.
#[derive(Debug, Clone)]
pub struct LocalFsItemStore {
    dir: PathBuf,
    max_record_size: usize,
}

/// Blob store keeping one raw file per object under `<root>/<bucket>/`.
#[derive(Debug, Clone)]
pub struct LocalFsBlobStore {
    root: PathBuf,
}

// Implementation

impl LocalFsItemStore {
    pub fn new(root: impl AsRef<Path>, table: &str) -> Self {
        Self {
            dir: root.as_ref().join(file_name(table)),
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }

    pub fn from_config(config: &ItemStoreConfig) -> Result<Self> {
        let root = root_dir(config.endpoint.as_ref())?;
        Ok(Self::new(root, &config.table))
    }

    pub fn with_max_record_size(mut self, max_record_size: usize) -> Self {
        self.max_record_size = max_record_size;
        self
    }

    fn path(&self, id: &str) -> PathBuf {
        self.dir.join(file_name(id))
    }
}

impl ItemStore for LocalFsItemStore {
    async fn start(&self) -> Result<()> {
        debug!("Opening item table at {:?}", self.dir);
        Ok(tokio::fs::create_dir_all(&self.dir).await?)
    }

    async fn put(&self, record: ItemRecord) -> Result<()> {
        let bytes = record.to_bytes()?;

        if bytes.len() > self.max_record_size {
            return Err(StoreError::SizeLimitExceeded {
                size: bytes.len(),
                limit: self.max_record_size,
            });
        }

        write_replacing(&self.path(&record.id), bytes).await
    }

    async fn get(&self, id: &str) -> Result<Option<ItemRecord>> {
        match tokio::fs::read(self.path(id)).await {
            Ok(bytes) => Ok(Some(ItemRecord::from_bytes(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self, id: &str) -> Result<()> {
        remove_if_exists(&self.path(id)).await
    }
}

impl LocalFsBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(config: &BlobStoreConfig) -> Result<Self> {
        Ok(Self::new(root_dir(config.endpoint.as_ref())?))
    }

    fn path(&self, pointer: &OverflowPointer) -> PathBuf {
        self.root
            .join(file_name(&pointer.bucket))
            .join(file_name(&pointer.key))
    }
}

impl BlobStore for LocalFsBlobStore {
    async fn start(&self) -> Result<()> {
        debug!("Opening blob root at {:?}", self.root);
        Ok(tokio::fs::create_dir_all(&self.root).await?)
    }

    async fn put(&self, pointer: &OverflowPointer, payload: Bytes) -> Result<()> {
        let path = self.path(pointer);

        if let Some(bucket_dir) = path.parent() {
            tokio::fs::create_dir_all(bucket_dir).await?;
        }

        write_replacing(&path, payload).await
    }

    async fn get(&self, pointer: &OverflowPointer) -> Result<Option<Bytes>> {
        match tokio::fs::read(self.path(pointer)).await {
            Ok(bytes) => Ok(Some(bytes.into())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self, pointer: &OverflowPointer) -> Result<()> {
        remove_if_exists(&self.path(pointer)).await
    }
}

fn root_dir(endpoint: Option<&Url>) -> Result<PathBuf> {
    let endpoint = endpoint
        .ok_or_else(|| StoreError::InvalidConfig("local store needs a file:// endpoint".into()))?;

    match endpoint.scheme() {
        "file" => Ok(endpoint
            .to_file_path()
            .map_err(|_| anyhow!("Failed to convert Url to file path"))?),
        scheme => Err(StoreError::InvalidConfig(format!(
            "Unsupported scheme for local store endpoint: {scheme}"
        ))),
    }
}

// Ids may carry path separators, e.g. module paths of owning types
fn file_name(id: &str) -> String {
    form_urlencoded::byte_serialize(id.as_bytes()).collect()
}

// Written aside and renamed over the target, so a torn write never replaces a good file
async fn write_replacing(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    let staging = path.with_file_name(format!(".{}.tmp", Uuid::new_v4()));

    if let Err(e) = tokio::fs::write(&staging, contents).await {
        remove_if_exists(&staging).await?;
        return Err(e.into());
    }

    if let Err(e) = tokio::fs::rename(&staging, path).await {
        remove_if_exists(&staging).await?;
        return Err(e.into());
    }

    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}
