//! Prebuilt compositions covering common deployment patterns. These are
//! plain tree builders; everything they produce round-trips through the
//! DSL like any hand-assembled tree.

use std::sync::Arc;

use authgate_core_types::AuthzError;
use authgate_list_source::{BlobStore, ListSource};
use authgate_refresh_cache::DEFAULT_TTL_SECONDS;
use authgate_role_resolver::ProjectRoleResolver;

use crate::builder::{
    and, client_ids, current_project_client_id, entra_app_ids, not, or, projects,
    required_query_param_value, version_contains,
};
use crate::tree::Authorizer;

/// Builds allow/deny lists by convention: each list merges a deploy-time
/// file under `<root_dir>/<allow|deny>/<id>.txt` with a runtime blob at
/// `<bucket_url>/<allow|deny>/<id>.txt`. Both legs tolerate a missing
/// resource, so either side can be provisioned independently.
pub struct CombinedListBuilder {
    root_dir: String,
    bucket_url: String,
    blob_store: Arc<dyn BlobStore>,
    ttl_seconds: u64,
}

impl CombinedListBuilder {
    pub fn new(
        root_dir: impl Into<String>,
        bucket_url: impl Into<String>,
        blob_store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            root_dir: root_dir.into(),
            bucket_url: bucket_url.into(),
            blob_store,
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }

    pub fn with_ttl_seconds(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn allow(&self, id: &str) -> Result<ListSource, AuthzError> {
        self.list("allow", id)
    }

    pub fn deny(&self, id: &str) -> Result<ListSource, AuthzError> {
        self.list("deny", id)
    }

    fn list(&self, side: &str, id: &str) -> Result<ListSource, AuthzError> {
        let file = ListSource::file(format!("{}/{side}/{id}.txt", self.root_dir), false)?;
        let blob = ListSource::blob(
            Arc::clone(&self.blob_store),
            format!("{}/{side}/{id}.txt", self.bucket_url),
            Some(self.ttl_seconds),
            false,
        );
        Ok(ListSource::merge(vec![file, blob]))
    }
}

/// Same-project callers plus explicitly allowed client ids, application
/// ids and projects, minus the denied ones. A caller must be allowed AND
/// not denied.
pub fn allow_deny(
    resolver: Arc<ProjectRoleResolver>,
    lists: &CombinedListBuilder,
) -> Result<Authorizer, AuthzError> {
    and(vec![
        or(vec![
            current_project_client_id(resolver),
            client_ids(lists.allow("clientIds")?),
            entra_app_ids(lists.allow("entraIdAppIds")?),
            projects(lists.allow("projects")?),
        ])?,
        not(or(vec![
            client_ids(lists.deny("clientIds")?),
            entra_app_ids(lists.deny("entraIdAppIds")?),
            projects(lists.deny("projects")?),
        ])?),
    ])
}

/// API-key gate around an inner authorizer: the `key` query parameter
/// must hold an allowed value and not a denied one.
pub fn api_key(
    allowed_keys: ListSource,
    denied_keys: ListSource,
    inner: Authorizer,
) -> Result<Authorizer, AuthzError> {
    and(vec![
        required_query_param_value("key", allowed_keys),
        not(required_query_param_value("key", denied_keys)),
        inner,
    ])
}

/// Applies a specific authorizer to versions containing `marker` and the
/// default authorizer elsewhere. With `include_specific_in_default`, the
/// specific authorizer is also accepted on unmarked versions.
pub fn restricted_version(
    default_authorizer: Authorizer,
    marker: &str,
    specific_authorizer: Authorizer,
    include_specific_in_default: bool,
) -> Result<Authorizer, AuthzError> {
    let unmarked = if include_specific_in_default {
        or(vec![default_authorizer, specific_authorizer.clone()])?
    } else {
        default_authorizer
    };
    or(vec![
        and(vec![not(version_contains(marker)), unmarked])?,
        and(vec![version_contains(marker), specific_authorizer])?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{http_method, jwt, oauth2};
    use crate::tree::HttpMethod;
    use authgate_core_types::{AuthKind, MethodDescriptor, Principal, RequestInfo};

    fn principal() -> Principal {
        Principal::new(AuthKind::Jwt)
    }

    #[tokio::test]
    async fn test_api_key_allows_listed_and_blocks_denied() {
        let gate = api_key(
            ListSource::explicit(["good", "revoked"]),
            ListSource::explicit(["revoked"]),
            jwt(),
        )
        .unwrap();
        let method = MethodDescriptor::new("GET", "v1");

        let good = RequestInfo::new("/x").with_query_param("key", "good");
        assert!(gate
            .evaluate(&principal(), &method, &good)
            .await
            .unwrap()
            .is_authorized());

        let revoked = RequestInfo::new("/x").with_query_param("key", "revoked");
        assert!(!gate
            .evaluate(&principal(), &method, &revoked)
            .await
            .unwrap()
            .is_authorized());

        let missing = RequestInfo::new("/x");
        assert!(!gate
            .evaluate(&principal(), &method, &missing)
            .await
            .unwrap()
            .is_authorized());
    }

    #[tokio::test]
    async fn test_restricted_version_routes_by_marker() {
        let gate = restricted_version(jwt(), "beta", oauth2(), false).unwrap();
        let request = RequestInfo::new("/x");

        let stable = MethodDescriptor::new("GET", "v1");
        let beta = MethodDescriptor::new("GET", "v1beta2");

        // Stable versions take the default (jwt-only) branch.
        assert!(gate
            .evaluate(&principal(), &stable, &request)
            .await
            .unwrap()
            .is_authorized());
        let mut oauth_caller = Principal::new(AuthKind::OAuth2);
        assert!(!gate
            .evaluate(&oauth_caller, &stable, &request)
            .await
            .unwrap()
            .is_authorized());

        // Beta versions take the specific (oauth2-only) branch.
        assert!(!gate
            .evaluate(&principal(), &beta, &request)
            .await
            .unwrap()
            .is_authorized());
        assert!(gate
            .evaluate(&oauth_caller, &beta, &request)
            .await
            .unwrap()
            .is_authorized());

        // With inclusion, the specific authorizer also passes on stable.
        let inclusive = restricted_version(jwt(), "beta", oauth2(), true).unwrap();
        oauth_caller = Principal::new(AuthKind::OAuth2);
        assert!(inclusive
            .evaluate(&oauth_caller, &stable, &request)
            .await
            .unwrap()
            .is_authorized());
    }

    #[tokio::test]
    async fn test_restricted_version_ignores_unrelated_leaves() {
        let gate = restricted_version(
            http_method(HttpMethod::Get),
            "internal",
            http_method(HttpMethod::Post),
            false,
        )
        .unwrap();
        let request = RequestInfo::new("/x");
        let internal_post = MethodDescriptor::new("POST", "v1internal");
        assert!(gate
            .evaluate(&principal(), &internal_post, &request)
            .await
            .unwrap()
            .is_authorized());
    }
}
