use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_recursion::async_recursion;
use async_trait::async_trait;
use tracing::{info, warn};

use authgate_core_types::AuthzError;
use authgate_refresh_cache::{AsyncRefreshCache, RefreshSource, DEFAULT_TTL_SECONDS};

use crate::clean::clean_lines;
use crate::stores::{BlobStore, EntityKeyStore};

/// Default page size for entity-key listings.
pub const DEFAULT_ENTITY_LIMIT: usize = 100;

/// A source of a cleaned string list.
///
/// Closed over the variants the policy DSL knows how to express. Trees are
/// immutable once constructed; clones of remote variants share the same
/// refresh cache.
#[derive(Clone, Debug)]
pub enum ListSource {
    /// Fixed inline values (the DSL array form).
    Explicit { values: Vec<String> },
    /// Local file, loaded once at construction.
    File(FileSource),
    /// Concatenation of child sources in order, without deduplication.
    Merge { sources: Vec<ListSource> },
    /// Lines of an object-store blob, cached with a TTL.
    Blob(BlobSource),
    /// Key names of a kind in a structured store, cached with a TTL.
    EntityKeys(EntityKeysSource),
}

impl ListSource {
    pub fn explicit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Explicit {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn file(path: impl Into<String>, fail_on_missing: bool) -> Result<Self, AuthzError> {
        Ok(Self::File(FileSource::load(path.into(), fail_on_missing)?))
    }

    pub fn merge(sources: Vec<ListSource>) -> Self {
        Self::Merge { sources }
    }

    pub fn blob(
        store: Arc<dyn BlobStore>,
        url: impl Into<String>,
        ttl_seconds: Option<u64>,
        fail_on_missing: bool,
    ) -> Self {
        Self::Blob(BlobSource::new(store, url.into(), ttl_seconds, fail_on_missing))
    }

    pub fn entity_keys(
        store: Arc<dyn EntityKeyStore>,
        kind: impl Into<String>,
        namespace: Option<String>,
        limit: Option<usize>,
        ttl_seconds: Option<u64>,
    ) -> Self {
        Self::EntityKeys(EntityKeysSource::new(
            store,
            kind.into(),
            namespace,
            limit,
            ttl_seconds,
        ))
    }

    /// Returns the cleaned list.
    #[async_recursion]
    pub async fn get(&self) -> Result<Vec<String>, AuthzError> {
        match self {
            ListSource::Explicit { values } => Ok(clean_lines(values)),
            ListSource::File(file) => Ok(clean_lines(&file.lines)),
            ListSource::Merge { sources } => {
                let mut merged = Vec::new();
                for source in sources {
                    merged.extend(source.get().await?);
                }
                Ok(merged)
            }
            ListSource::Blob(blob) => Ok(clean_lines(blob.cache.get().await?.iter())),
            ListSource::EntityKeys(keys) => Ok(clean_lines(keys.cache.get().await?.iter())),
        }
    }
}

// Equality compares configuration only, never runtime handles; it backs
// the DSL round-trip law.
impl PartialEq for ListSource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ListSource::Explicit { values: a }, ListSource::Explicit { values: b }) => a == b,
            (ListSource::File(a), ListSource::File(b)) => {
                a.path == b.path && a.fail_on_missing == b.fail_on_missing
            }
            (ListSource::Merge { sources: a }, ListSource::Merge { sources: b }) => a == b,
            (ListSource::Blob(a), ListSource::Blob(b)) => {
                a.url == b.url
                    && a.ttl_seconds == b.ttl_seconds
                    && a.fail_on_missing == b.fail_on_missing
            }
            (ListSource::EntityKeys(a), ListSource::EntityKeys(b)) => {
                a.kind == b.kind
                    && a.namespace == b.namespace
                    && a.limit == b.limit
                    && a.ttl_seconds == b.ttl_seconds
            }
            _ => false,
        }
    }
}

/// File-backed source; content is read once when the policy is built.
#[derive(Clone, Debug)]
pub struct FileSource {
    pub path: String,
    pub fail_on_missing: bool,
    lines: Vec<String>,
}

impl FileSource {
    fn load(path: String, fail_on_missing: bool) -> Result<Self, AuthzError> {
        info!(path, "loading list file");
        let lines = match fs::read_to_string(Path::new(&path)) {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(err) if fail_on_missing => {
                return Err(AuthzError::config(format!("cannot load {path}: {err}")));
            }
            Err(err) => {
                warn!(path, error = %err, "cannot load list file, using empty list");
                Vec::new()
            }
        };
        Ok(Self {
            path,
            fail_on_missing,
            lines,
        })
    }
}

struct BlobFetch {
    store: Arc<dyn BlobStore>,
    url: String,
    fail_on_missing: bool,
}

#[async_trait]
impl RefreshSource<Vec<String>> for BlobFetch {
    async fn load(&self) -> Result<Vec<String>, AuthzError> {
        match self.store.read_lines(&self.url).await {
            Ok(lines) => Ok(lines),
            Err(err) if self.fail_on_missing => Err(err),
            Err(err) => {
                warn!(url = %self.url, error = %err, "cannot load blob, using empty list");
                Ok(Vec::new())
            }
        }
    }
}

/// Blob-backed source refreshed in the background after its TTL.
#[derive(Clone)]
pub struct BlobSource {
    pub url: String,
    pub ttl_seconds: u64,
    pub fail_on_missing: bool,
    cache: AsyncRefreshCache<Vec<String>>,
}

impl BlobSource {
    fn new(
        store: Arc<dyn BlobStore>,
        url: String,
        ttl_seconds: Option<u64>,
        fail_on_missing: bool,
    ) -> Self {
        let ttl_seconds = ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS);
        let fetch = Arc::new(BlobFetch {
            store,
            url: url.clone(),
            fail_on_missing,
        });
        Self {
            url,
            ttl_seconds,
            fail_on_missing,
            cache: AsyncRefreshCache::new(Duration::from_secs(ttl_seconds), fetch),
        }
    }
}

impl fmt::Debug for BlobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobSource")
            .field("url", &self.url)
            .field("ttl_seconds", &self.ttl_seconds)
            .field("fail_on_missing", &self.fail_on_missing)
            .finish_non_exhaustive()
    }
}

struct EntityKeysFetch {
    store: Arc<dyn EntityKeyStore>,
    kind: String,
    namespace: Option<String>,
    limit: usize,
}

#[async_trait]
impl RefreshSource<Vec<String>> for EntityKeysFetch {
    async fn load(&self) -> Result<Vec<String>, AuthzError> {
        self.store
            .list_keys(&self.kind, self.namespace.as_deref(), self.limit)
            .await
    }
}

/// Entity-key-backed source refreshed in the background after its TTL.
#[derive(Clone)]
pub struct EntityKeysSource {
    pub kind: String,
    pub namespace: Option<String>,
    pub limit: usize,
    pub ttl_seconds: u64,
    cache: AsyncRefreshCache<Vec<String>>,
}

impl EntityKeysSource {
    fn new(
        store: Arc<dyn EntityKeyStore>,
        kind: String,
        namespace: Option<String>,
        limit: Option<usize>,
        ttl_seconds: Option<u64>,
    ) -> Self {
        let limit = limit.unwrap_or(DEFAULT_ENTITY_LIMIT);
        let ttl_seconds = ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS);
        let fetch = Arc::new(EntityKeysFetch {
            store,
            kind: kind.clone(),
            namespace: namespace.clone(),
            limit,
        });
        Self {
            kind,
            namespace,
            limit,
            ttl_seconds,
            cache: AsyncRefreshCache::new(Duration::from_secs(ttl_seconds), fetch),
        }
    }
}

impl fmt::Debug for EntityKeysSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityKeysSource")
            .field("kind", &self.kind)
            .field("namespace", &self.namespace)
            .field("limit", &self.limit)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{StaticBlobStore, StaticEntityKeyStore};
    use std::io::Write;

    #[tokio::test]
    async fn test_explicit_is_cleaned() {
        let source = ListSource::explicit([" a # comment", "b", "   ", "b"]);
        assert_eq!(source.get().await.unwrap(), vec!["a", "b", "b"]);
    }

    #[tokio::test]
    async fn test_merge_concatenates_without_dedup() {
        let source = ListSource::merge(vec![
            ListSource::explicit(["a", "b"]),
            ListSource::explicit(["b", "c"]),
        ]);
        assert_eq!(source.get().await.unwrap(), vec!["a", "b", "b", "c"]);
    }

    #[tokio::test]
    async fn test_file_source_reads_and_cleans() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alpha # first").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  beta  ").unwrap();
        let source = ListSource::file(file.path().to_string_lossy(), true).unwrap();
        assert_eq!(source.get().await.unwrap(), vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_missing_file_honors_fail_on_missing() {
        assert!(ListSource::file("/nonexistent/list.txt", true).is_err());
        let lenient = ListSource::file("/nonexistent/list.txt", false).unwrap();
        assert!(lenient.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blob_source_fetches_and_cleans() {
        let store = StaticBlobStore::new();
        store
            .put("gs://bucket/list.txt", vec!["x # allowed".into(), "y".into()])
            .await;
        let source = ListSource::blob(store, "gs://bucket/list.txt", Some(60), true);
        assert_eq!(source.get().await.unwrap(), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_missing_blob_honors_fail_on_missing() {
        let store = StaticBlobStore::new();
        let strict = ListSource::blob(store.clone(), "gs://bucket/none.txt", None, true);
        assert!(strict.get().await.is_err());
        let lenient = ListSource::blob(store, "gs://bucket/none.txt", None, false);
        assert!(lenient.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entity_keys_respects_limit() {
        let store = StaticEntityKeyStore::new();
        store
            .put(
                "AllowedClientIds",
                None,
                vec!["one".into(), "two".into(), "three".into()],
            )
            .await;
        let source =
            ListSource::entity_keys(store, "AllowedClientIds", None, Some(2), Some(60));
        assert_eq!(source.get().await.unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn test_equality_ignores_runtime_handles() {
        let a = ListSource::explicit(["a"]);
        let b = ListSource::explicit(["a"]);
        assert_eq!(a, b);

        let store = StaticBlobStore::new();
        let c = ListSource::blob(store.clone(), "gs://b/x", Some(60), true);
        let d = ListSource::blob(store, "gs://b/x", Some(60), true);
        assert_eq!(c, d);
        assert_ne!(a, c);
    }
}
