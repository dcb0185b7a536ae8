use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{Result, StoreError};

/// Configuration of a tiered storage extension.
///
/// Table and bucket are always given explicitly, there is no global fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub item_store: ItemStoreConfig,
    pub blob_store: BlobStoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStoreConfig {
    pub table: String,
    #[serde(default)]
    pub endpoint: Option<Url>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub credentials: Credentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    pub bucket: String,
    #[serde(default)]
    pub endpoint: Option<Url>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub credentials: Credentials,
}

/// Credentials handed through to a store client untouched.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// Whatever the client resolves from its environment
    #[default]
    DefaultChain,
    Static {
        access_key_id: String,
        secret_access_key: String,
        #[serde(default)]
        session_token: Option<String>,
    },
    Profile {
        name: String,
    },
}

fn default_name() -> String {
    "default".to_string()
}

// Implementations

impl TierConfig {
    pub fn new(table: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            name: default_name(),
            item_store: ItemStoreConfig::new(table),
            blob_store: BlobStoreConfig::new(bucket),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_item_store(mut self, item_store: ItemStoreConfig) -> Self {
        self.item_store = item_store;
        self
    }

    pub fn with_blob_store(mut self, blob_store: BlobStoreConfig) -> Self {
        self.blob_store = blob_store;
        self
    }

    /// Point both stores at the same endpoint, e.g. one `file://` root.
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.item_store.endpoint = Some(endpoint.clone());
        self.blob_store.endpoint = Some(endpoint);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        let region = region.into();
        self.item_store.region = Some(region.clone());
        self.blob_store.region = Some(region);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::InvalidConfig("extension name is blank".into()));
        }
        if self.item_store.table.trim().is_empty() {
            return Err(StoreError::InvalidConfig("item store table is blank".into()));
        }
        if self.blob_store.bucket.trim().is_empty() {
            return Err(StoreError::InvalidConfig("blob store bucket is blank".into()));
        }
        Ok(())
    }
}

impl ItemStoreConfig {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            endpoint: None,
            region: None,
            credentials: Credentials::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

impl BlobStoreConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            endpoint: None,
            region: None,
            credentials: Credentials::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

// Secrets stay out of logs
impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::DefaultChain => write!(f, "DefaultChain"),
            Credentials::Static { access_key_id, .. } => f
                .debug_struct("Static")
                .field("access_key_id", access_key_id)
                .finish_non_exhaustive(),
            Credentials::Profile { name } => f.debug_struct("Profile").field("name", name).finish(),
        }
    }
}
