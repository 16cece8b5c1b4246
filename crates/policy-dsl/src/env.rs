use std::sync::Arc;

use authgate_list_source::{BlobStore, EntityKeyStore, StaticBlobStore, StaticEntityKeyStore};
use authgate_role_resolver::{ProjectRoleResolver, RoleBindingSource, StaticRoleSource};

/// External collaborators injected into decoded trees: remote list
/// variants keep a store handle and role leaves keep the resolver.
/// Decoding the same document against the same environment yields
/// structurally equal trees.
#[derive(Clone)]
pub struct Environment {
    pub blob_store: Arc<dyn BlobStore>,
    pub entity_key_store: Arc<dyn EntityKeyStore>,
    pub role_resolver: Arc<ProjectRoleResolver>,
}

impl Environment {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        entity_key_store: Arc<dyn EntityKeyStore>,
        role_resolver: Arc<ProjectRoleResolver>,
    ) -> Self {
        Self {
            blob_store,
            entity_key_store,
            role_resolver,
        }
    }

    /// Environment with empty in-memory backends, for offline validation
    /// and tests. Remote fetches fail, structural checks all work.
    pub fn offline() -> Self {
        let role_source: Arc<dyn RoleBindingSource> = StaticRoleSource::new();
        Self {
            blob_store: StaticBlobStore::new(),
            entity_key_store: StaticEntityKeyStore::new(),
            role_resolver: Arc::new(ProjectRoleResolver::new("0", role_source, None)),
        }
    }
}
