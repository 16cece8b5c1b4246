use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::RwLock;
use tracing::info;

use authgate_core_types::AuthzError;
use authgate_refresh_cache::{AsyncRefreshCache, RefreshSource, DEFAULT_TTL_SECONDS};

use crate::model::{PrincipalId, RoleSnapshot, ServiceAccountInfo};

static CLIENT_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)(-\w+)?\.apps\.googleusercontent\.com$")
        .expect("client id pattern is valid")
});

/// Extracts the project number from a web client id of the form
/// `<number>[-suffix].apps.googleusercontent.com`.
pub fn extract_project_number(client_id: &str) -> Option<&str> {
    CLIENT_ID_PATTERN
        .captures(client_id)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// External policy source the resolver reads from.
#[async_trait]
pub trait RoleBindingSource: Send + Sync {
    /// Current role bindings for the project, as `member` strings per role.
    async fn policy_bindings(&self) -> Result<BTreeMap<String, Vec<String>>, AuthzError>;
    /// Service-account identities of the project.
    async fn service_accounts(&self) -> Result<Vec<ServiceAccountInfo>, AuthzError>;
}

struct SnapshotLoader {
    source: Arc<dyn RoleBindingSource>,
}

#[async_trait]
impl RefreshSource<RoleSnapshot> for SnapshotLoader {
    async fn load(&self) -> Result<RoleSnapshot, AuthzError> {
        let raw_bindings = self.source.policy_bindings().await?;
        let mut bindings = BTreeMap::new();
        for (role, members) in raw_bindings {
            let identities = members
                .iter()
                .map(|member| PrincipalId::parse(member))
                .collect::<Result<Vec<_>, _>>()?;
            bindings.insert(role, identities);
        }
        let mut service_account_client_ids = BTreeMap::new();
        for account in self.source.service_accounts().await? {
            service_account_client_ids.insert(account.email, account.oauth2_client_id);
        }
        let snapshot = RoleSnapshot {
            bindings,
            service_account_client_ids,
        };
        info!(
            roles = snapshot.bindings.len(),
            service_accounts = snapshot.service_account_client_ids.len(),
            "loaded role snapshot"
        );
        Ok(snapshot)
    }
}

/// Resolves emails to project roles against a cached binding snapshot.
///
/// The snapshot is recomputed as a whole in the background after its TTL;
/// resolution always reads the current or the previous snapshot and never
/// waits on a refresh in progress.
pub struct ProjectRoleResolver {
    project_number: String,
    ttl: Duration,
    cache: AsyncRefreshCache<RoleSnapshot>,
}

impl ProjectRoleResolver {
    pub fn new(
        project_number: impl Into<String>,
        source: Arc<dyn RoleBindingSource>,
        ttl: Option<Duration>,
    ) -> Self {
        let ttl = ttl.unwrap_or(Duration::from_secs(DEFAULT_TTL_SECONDS));
        Self {
            project_number: project_number.into(),
            ttl,
            cache: AsyncRefreshCache::new(ttl, Arc::new(SnapshotLoader { source })),
        }
    }

    pub fn project_number(&self) -> &str {
        &self.project_number
    }

    pub async fn snapshot(&self) -> Result<Arc<RoleSnapshot>, AuthzError> {
        self.cache.get().await
    }

    /// Roles held by the email on the project, `roles/` prefix stripped.
    pub async fn roles_for(&self, email: &str) -> Result<BTreeSet<String>, AuthzError> {
        Ok(self.snapshot().await?.roles_for(email))
    }

    /// Whether the client id belongs to this project: either a
    /// service-account client id, or a web client id carrying the
    /// project number.
    pub async fn is_project_client_id(&self, client_id: &str) -> Result<bool, AuthzError> {
        let snapshot = self.snapshot().await?;
        if snapshot
            .service_account_client_ids
            .values()
            .any(|id| id == client_id)
        {
            return Ok(true);
        }
        Ok(extract_project_number(client_id) == Some(self.project_number.as_str()))
    }
}

impl fmt::Debug for ProjectRoleResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectRoleResolver")
            .field("project_number", &self.project_number)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// In-memory binding source for tests and offline validation.
#[derive(Default)]
pub struct StaticRoleSource {
    bindings: RwLock<BTreeMap<String, Vec<String>>>,
    service_accounts: RwLock<Vec<ServiceAccountInfo>>,
}

impl StaticRoleSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn bind(&self, role: impl Into<String>, members: Vec<String>) {
        self.bindings.write().await.insert(role.into(), members);
    }

    pub async fn add_service_account(&self, email: impl Into<String>, client_id: impl Into<String>) {
        self.service_accounts.write().await.push(ServiceAccountInfo {
            email: email.into(),
            oauth2_client_id: client_id.into(),
        });
    }
}

#[async_trait]
impl RoleBindingSource for StaticRoleSource {
    async fn policy_bindings(&self) -> Result<BTreeMap<String, Vec<String>>, AuthzError> {
        Ok(self.bindings.read().await.clone())
    }

    async fn service_accounts(&self) -> Result<Vec<ServiceAccountInfo>, AuthzError> {
        Ok(self.service_accounts.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_project_number() {
        assert_eq!(
            extract_project_number("428563709008-vvh1k92tpns1ab8qnhum5fetmk4iir47.apps.googleusercontent.com"),
            Some("428563709008")
        );
        assert_eq!(
            extract_project_number("428563709008.apps.googleusercontent.com"),
            Some("428563709008")
        );
        assert_eq!(extract_project_number("115933665684941698610"), None);
        assert_eq!(extract_project_number("someone@example.com"), None);
    }

    #[tokio::test]
    async fn test_roles_for_uses_snapshot_rules() {
        let source = StaticRoleSource::new();
        source
            .bind(
                "roles/roleA",
                vec!["user:a@x.com".into(), "domain:y.com".into()],
            )
            .await;
        let resolver = ProjectRoleResolver::new("428563709008", source, None);

        assert_eq!(
            resolver.roles_for("a@x.com").await.unwrap(),
            BTreeSet::from(["roleA".to_string()])
        );
        assert_eq!(
            resolver.roles_for("b@y.com").await.unwrap(),
            BTreeSet::from(["roleA".to_string()])
        );
        assert!(resolver.roles_for("c@z.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_is_project_client_id() {
        let source = StaticRoleSource::new();
        source
            .add_service_account("robot@proj.iam.test", "115933665684941698610")
            .await;
        let resolver = ProjectRoleResolver::new("428563709008", source, None);

        assert!(resolver
            .is_project_client_id("115933665684941698610")
            .await
            .unwrap());
        assert!(resolver
            .is_project_client_id("428563709008-abc.apps.googleusercontent.com")
            .await
            .unwrap());
        assert!(!resolver
            .is_project_client_id("999-abc.apps.googleusercontent.com")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_malformed_member_is_a_config_error() {
        let source = StaticRoleSource::new();
        source.bind("roles/roleA", vec!["nonsense".into()]).await;
        let resolver = ProjectRoleResolver::new("1", source, None);
        assert!(resolver.roles_for("a@x.com").await.is_err());
    }
}
