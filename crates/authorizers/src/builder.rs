//! Convenience constructors for assembling authorizer trees in code.
//! The DSL codec goes through the same entry points, so anything built
//! here round-trips through the serialized form.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use authgate_core_types::AuthzError;
use authgate_list_source::ListSource;
use authgate_role_resolver::ProjectRoleResolver;

use crate::claims::{ClaimExpectation, ClaimMap};
use crate::tree::{Authorizer, HttpMethod, VersionPattern};

/// All children must authorize. Requires at least one child.
pub fn and(children: Vec<Authorizer>) -> Result<Authorizer, AuthzError> {
    Authorizer::all(children)
}

/// Any child must authorize. Requires at least one child.
pub fn or(children: Vec<Authorizer>) -> Result<Authorizer, AuthzError> {
    Authorizer::any(children)
}

/// Inverts the child's result.
pub fn not(child: Authorizer) -> Authorizer {
    Authorizer::Not(Box::new(child))
}

/// Accepts only JWT authentication.
pub fn jwt() -> Authorizer {
    Authorizer::JwtOnly
}

/// Accepts only OAuth2 authentication.
pub fn oauth2() -> Authorizer {
    Authorizer::OAuth2Only
}

/// Client id (or Entra application id) must be in the list.
pub fn client_ids(values: ListSource) -> Authorizer {
    Authorizer::ClientIds(values)
}

/// Entra application id must be in the list.
pub fn entra_app_ids(values: ListSource) -> Authorizer {
    Authorizer::EntraAppIds(values)
}

/// Client id's project number must be in the list.
pub fn projects(values: ListSource) -> Authorizer {
    Authorizer::Projects(values)
}

/// API version must contain the substring. Useful to fence off beta
/// versions.
pub fn version_contains(fragment: impl Into<String>) -> Authorizer {
    Authorizer::VersionContains(fragment.into())
}

/// API version must match the pattern (whole-string match).
pub fn version_matches(pattern: &str) -> Result<Authorizer, AuthzError> {
    Ok(Authorizer::VersionMatches(VersionPattern::compile(pattern)?))
}

/// Query parameter must be present and non-empty.
pub fn required_query_param(name: impl Into<String>) -> Authorizer {
    Authorizer::QueryParam { name: name.into() }
}

/// Query parameter must be present with a listed value.
pub fn required_query_param_value(name: impl Into<String>, values: ListSource) -> Authorizer {
    Authorizer::QueryParamValue {
        name: name.into(),
        allow_if_absent: false,
        values,
    }
}

/// Query parameter must be absent, or present with a listed value.
pub fn optional_query_param_value(name: impl Into<String>, values: ListSource) -> Authorizer {
    Authorizer::QueryParamValue {
        name: name.into(),
        allow_if_absent: true,
        values,
    }
}

/// Request path must start with the prefix.
pub fn path_prefix(prefix: impl Into<String>) -> Authorizer {
    Authorizer::PathPrefix(prefix.into())
}

/// Request base path must equal the path. Useful when an API is mounted
/// on multiple paths.
pub fn base_path(path: impl Into<String>) -> Authorizer {
    Authorizer::BasePath(path.into())
}

/// Operation must use the given HTTP method. Useful for read-only access.
pub fn http_method(method: HttpMethod) -> Authorizer {
    Authorizer::HttpMethod(method)
}

/// Every configured claim must match the token payload.
pub fn all_jwt_claims<I, S>(claims: I) -> Result<Authorizer, AuthzError>
where
    I: IntoIterator<Item = (S, Value)>,
    S: Into<String>,
{
    Ok(Authorizer::AllJwtClaims(claim_map(claims)?))
}

/// At least one configured claim must match the token payload.
pub fn any_jwt_claim<I, S>(claims: I) -> Result<Authorizer, AuthzError>
where
    I: IntoIterator<Item = (S, Value)>,
    S: Into<String>,
{
    Ok(Authorizer::AnyJwtClaim(claim_map(claims)?))
}

fn claim_map<I, S>(claims: I) -> Result<ClaimMap, AuthzError>
where
    I: IntoIterator<Item = (S, Value)>,
    S: Into<String>,
{
    let mut map = ClaimMap::new();
    for (path, value) in claims {
        map.insert(path.into(), ClaimExpectation::from_value(&value)?);
    }
    Ok(map)
}

/// Caller must hold every given role on the host project.
pub fn has_project_roles<I, S>(resolver: Arc<ProjectRoleResolver>, roles: I) -> Authorizer
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Authorizer::ProjectRoles {
        roles: roles.into_iter().map(Into::into).collect::<BTreeSet<_>>(),
        resolver,
    }
}

/// Caller must hold at least one role on the host project.
pub fn project_member(resolver: Arc<ProjectRoleResolver>) -> Authorizer {
    Authorizer::ProjectMember(resolver)
}

/// Caller must be an owner of the host project.
pub fn project_owner(resolver: Arc<ProjectRoleResolver>) -> Authorizer {
    Authorizer::ProjectOwner(resolver)
}

/// Token must have been issued by a client id of the host project.
pub fn current_project_client_id(resolver: Arc<ProjectRoleResolver>) -> Authorizer {
    Authorizer::CurrentProjectClientId(resolver)
}
