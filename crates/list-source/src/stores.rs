//! Narrow interfaces to the external stores that remote list sources read
//! from, plus in-memory implementations for tests and offline validation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use authgate_core_types::AuthzError;

/// Reads the lines of a blob in an object store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read_lines(&self, url: &str) -> Result<Vec<String>, AuthzError>;
}

/// Lists the key names of a kind in a structured store.
#[async_trait]
pub trait EntityKeyStore: Send + Sync {
    async fn list_keys(
        &self,
        kind: &str,
        namespace: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>, AuthzError>;
}

/// In-memory blob store keyed by URL.
#[derive(Default)]
pub struct StaticBlobStore {
    blobs: RwLock<HashMap<String, Vec<String>>>,
}

impl StaticBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn put(&self, url: impl Into<String>, lines: Vec<String>) {
        self.blobs.write().await.insert(url.into(), lines);
    }
}

#[async_trait]
impl BlobStore for StaticBlobStore {
    async fn read_lines(&self, url: &str) -> Result<Vec<String>, AuthzError> {
        self.blobs
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| AuthzError::source(format!("no blob at {url}")))
    }
}

/// In-memory key store keyed by `(kind, namespace)`.
#[derive(Default)]
pub struct StaticEntityKeyStore {
    keys: RwLock<HashMap<(String, Option<String>), Vec<String>>>,
}

impl StaticEntityKeyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn put(
        &self,
        kind: impl Into<String>,
        namespace: Option<String>,
        keys: Vec<String>,
    ) {
        self.keys
            .write()
            .await
            .insert((kind.into(), namespace), keys);
    }
}

#[async_trait]
impl EntityKeyStore for StaticEntityKeyStore {
    async fn list_keys(
        &self,
        kind: &str,
        namespace: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>, AuthzError> {
        let keys = self.keys.read().await;
        let found = keys
            .get(&(kind.to_string(), namespace.map(str::to_string)))
            .ok_or_else(|| AuthzError::source(format!("no entities of kind {kind}")))?;
        Ok(found.iter().take(limit).cloned().collect())
    }
}
