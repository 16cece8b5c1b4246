use std::collections::BTreeSet;
use std::sync::Arc;

use async_recursion::async_recursion;
use regex::Regex;
use tracing::debug;

use authgate_core_types::{
    AuthKind, AuthorizationResult, AuthzError, MethodDescriptor, Principal, RequestInfo,
};
use authgate_list_source::ListSource;
use authgate_role_resolver::{extract_project_number, ProjectRoleResolver};

use crate::claims::{claim_matches, ClaimMap};

/// HTTP methods an authorizer can gate on. OPTIONS is CORS-only and HEAD
/// is not dispatched by the host framework.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Delete,
    Get,
    Patch,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Patch => "PATCH",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AuthzError> {
        match value.to_ascii_uppercase().as_str() {
            "DELETE" => Ok(Self::Delete),
            "GET" => Ok(Self::Get),
            "PATCH" => Ok(Self::Patch),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            other => Err(AuthzError::config(format!("unsupported http method: {other}"))),
        }
    }
}

/// Regular expression over the API version, compiled once at construction.
/// The pattern must match the whole version string.
#[derive(Clone, Debug)]
pub struct VersionPattern {
    pattern: String,
    regex: Regex,
}

impl VersionPattern {
    pub fn compile(pattern: &str) -> Result<Self, AuthzError> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|err| AuthzError::config(format!("invalid version pattern: {err}")))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, version: &str) -> bool {
        self.regex.is_match(version)
    }
}

impl PartialEq for VersionPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

/// A predicate over `(principal, method, request)`.
///
/// Combinators nest to any depth; the whole tree is immutable after
/// construction and safe to share across concurrent evaluations. The only
/// I/O happens behind list sources and the role resolver, both of which
/// serve cached data once warm.
#[derive(Clone, Debug)]
pub enum Authorizer {
    /// True iff every child authorizes. Children are all evaluated in
    /// declared order before the results are reduced.
    All(Vec<Authorizer>),
    /// True iff any child authorizes. Same evaluation order contract.
    Any(Vec<Authorizer>),
    /// Inverts the child's result.
    Not(Box<Authorizer>),

    /// Only principals authenticated with a first-party ID token.
    JwtOnly,
    /// Only principals authenticated with an opaque access token.
    OAuth2Only,

    /// Principal's client id is in the list. For Entra principals the
    /// first audience entry stands in for the missing client id.
    ClientIds(ListSource),
    /// Entra application id (first audience entry) is in the list.
    EntraAppIds(ListSource),
    /// Project number embedded in the client id is in the list. Cannot
    /// identify service-account client ids.
    Projects(ListSource),

    /// Named query parameter is present and non-empty.
    QueryParam { name: String },
    /// Named query parameter is absent (when allowed) or holds a listed
    /// value.
    QueryParamValue {
        name: String,
        allow_if_absent: bool,
        values: ListSource,
    },
    /// Operation uses the given HTTP method.
    HttpMethod(HttpMethod),
    /// Request path starts with the prefix, after normalizing slashes on
    /// both sides.
    PathPrefix(String),
    /// Request base path equals the given path, after normalization.
    BasePath(String),
    /// API version contains the substring.
    VersionContains(String),
    /// API version matches the pattern.
    VersionMatches(VersionPattern),

    /// JWT principal whose claims all match the expectations.
    AllJwtClaims(ClaimMap),
    /// JWT principal with at least one matching claim.
    AnyJwtClaim(ClaimMap),

    /// Caller holds every role in the set on the host project.
    ProjectRoles {
        roles: BTreeSet<String>,
        resolver: Arc<ProjectRoleResolver>,
    },
    /// Caller holds at least one role on the host project.
    ProjectMember(Arc<ProjectRoleResolver>),
    /// Caller holds the owner role on the host project.
    ProjectOwner(Arc<ProjectRoleResolver>),
    /// Token was issued by a client id belonging to the host project.
    CurrentProjectClientId(Arc<ProjectRoleResolver>),
}

impl Authorizer {
    /// Conjunction over one or more children. An empty child list is a
    /// configuration error, caught here rather than at evaluation time.
    pub fn all(children: Vec<Authorizer>) -> Result<Self, AuthzError> {
        if children.is_empty() {
            return Err(AuthzError::config("'and' requires at least one child"));
        }
        Ok(Self::All(children))
    }

    /// Disjunction over one or more children.
    pub fn any(children: Vec<Authorizer>) -> Result<Self, AuthzError> {
        if children.is_empty() {
            return Err(AuthzError::config("'or' requires at least one child"));
        }
        Ok(Self::Any(children))
    }

    /// Evaluates the tree. Expected "not matched" conditions produce a
    /// not-authorized result; only unexpected conditions (such as a JWT
    /// principal without a claims payload, or a failing cold list fetch)
    /// produce an error.
    #[async_recursion]
    pub async fn evaluate(
        &self,
        principal: &Principal,
        method: &MethodDescriptor,
        request: &RequestInfo,
    ) -> Result<AuthorizationResult, AuthzError> {
        match self {
            Authorizer::All(children) => {
                let mut authorized = true;
                for child in children {
                    // Every child runs even once the outcome is decided;
                    // leaves are side-effect-free but the declared
                    // contract is evaluate-all-then-reduce.
                    authorized &= child.evaluate(principal, method, request).await?.is_authorized();
                }
                Ok(authorized.into())
            }
            Authorizer::Any(children) => {
                let mut authorized = false;
                for child in children {
                    authorized |= child.evaluate(principal, method, request).await?.is_authorized();
                }
                Ok(authorized.into())
            }
            Authorizer::Not(child) => {
                let inner = child.evaluate(principal, method, request).await?;
                Ok((!inner.is_authorized()).into())
            }

            Authorizer::JwtOnly => Ok((principal.kind == AuthKind::Jwt).into()),
            Authorizer::OAuth2Only => Ok((principal.kind == AuthKind::OAuth2).into()),

            Authorizer::ClientIds(values) => {
                let allowed = values.get().await?;
                let presented = match principal.kind {
                    AuthKind::EntraJwt => principal.audience.first(),
                    _ => principal.client_id.as_ref(),
                };
                match presented {
                    None => Ok(AuthorizationResult::not_authorized()),
                    Some(id) => {
                        debug!(client_id = %id, allowed = allowed.len(), "client id check");
                        Ok(allowed.iter().any(|allowed| allowed == id).into())
                    }
                }
            }
            Authorizer::EntraAppIds(values) => {
                if principal.kind != AuthKind::EntraJwt {
                    return Ok(AuthorizationResult::not_authorized());
                }
                match principal.audience.first() {
                    None => Ok(AuthorizationResult::not_authorized()),
                    Some(app_id) => {
                        let allowed = values.get().await?;
                        debug!(app_id = %app_id, allowed = allowed.len(), "entra app id check");
                        Ok(allowed.iter().any(|allowed| allowed == app_id).into())
                    }
                }
            }
            Authorizer::Projects(values) => match &principal.client_id {
                None => Ok(AuthorizationResult::not_authorized()),
                Some(client_id) => match extract_project_number(client_id) {
                    None => Ok(AuthorizationResult::not_authorized()),
                    Some(number) => {
                        let allowed = values.get().await?;
                        Ok(allowed.iter().any(|allowed| allowed == number).into())
                    }
                },
            },

            Authorizer::QueryParam { name } => Ok(request
                .query_param(name)
                .map(|value| !value.is_empty())
                .unwrap_or(false)
                .into()),
            Authorizer::QueryParamValue {
                name,
                allow_if_absent,
                values,
            } => match request.query_param(name) {
                None => Ok((*allow_if_absent).into()),
                Some(value) => {
                    let allowed = values.get().await?;
                    Ok(allowed.iter().any(|allowed| allowed == value).into())
                }
            },
            Authorizer::HttpMethod(expected) => Ok(method
                .http_method
                .eq_ignore_ascii_case(expected.as_str())
                .into()),
            Authorizer::PathPrefix(prefix) => {
                Ok(normalize_path(&request.path)
                    .starts_with(&normalize_path(prefix))
                    .into())
            }
            Authorizer::BasePath(path) => {
                Ok((normalize_path(&request.base_path) == normalize_path(path)).into())
            }
            Authorizer::VersionContains(fragment) => {
                Ok(method.api_version.contains(fragment).into())
            }
            Authorizer::VersionMatches(pattern) => {
                Ok(pattern.matches(&method.api_version).into())
            }

            Authorizer::AllJwtClaims(claims) => check_claims(principal, claims, true),
            Authorizer::AnyJwtClaim(claims) => check_claims(principal, claims, false),

            Authorizer::ProjectRoles { roles, resolver } => match &principal.email {
                None => Ok(AuthorizationResult::not_authorized()),
                Some(email) => {
                    let held = resolver.roles_for(email).await?;
                    Ok(roles.iter().all(|role| held.contains(role)).into())
                }
            },
            Authorizer::ProjectMember(resolver) => match &principal.email {
                None => Ok(AuthorizationResult::not_authorized()),
                Some(email) => Ok((!resolver.roles_for(email).await?.is_empty()).into()),
            },
            Authorizer::ProjectOwner(resolver) => match &principal.email {
                None => Ok(AuthorizationResult::not_authorized()),
                Some(email) => Ok(resolver.roles_for(email).await?.contains("owner").into()),
            },
            Authorizer::CurrentProjectClientId(resolver) => match &principal.client_id {
                None => Ok(AuthorizationResult::not_authorized()),
                Some(client_id) => Ok(resolver.is_project_client_id(client_id).await?.into()),
            },
        }
    }
}

// Equality compares configuration; resolver handles compare by identity,
// which holds whenever two trees were built against the same environment.
impl PartialEq for Authorizer {
    fn eq(&self, other: &Self) -> bool {
        use Authorizer::*;
        match (self, other) {
            (All(a), All(b)) | (Any(a), Any(b)) => a == b,
            (Not(a), Not(b)) => a == b,
            (JwtOnly, JwtOnly) | (OAuth2Only, OAuth2Only) => true,
            (ClientIds(a), ClientIds(b))
            | (EntraAppIds(a), EntraAppIds(b))
            | (Projects(a), Projects(b)) => a == b,
            (QueryParam { name: a }, QueryParam { name: b }) => a == b,
            (
                QueryParamValue {
                    name: a,
                    allow_if_absent: a_absent,
                    values: a_values,
                },
                QueryParamValue {
                    name: b,
                    allow_if_absent: b_absent,
                    values: b_values,
                },
            ) => a == b && a_absent == b_absent && a_values == b_values,
            (HttpMethod(a), HttpMethod(b)) => a == b,
            (PathPrefix(a), PathPrefix(b))
            | (BasePath(a), BasePath(b))
            | (VersionContains(a), VersionContains(b)) => a == b,
            (VersionMatches(a), VersionMatches(b)) => a == b,
            (AllJwtClaims(a), AllJwtClaims(b)) | (AnyJwtClaim(a), AnyJwtClaim(b)) => a == b,
            (
                ProjectRoles {
                    roles: a,
                    resolver: a_resolver,
                },
                ProjectRoles {
                    roles: b,
                    resolver: b_resolver,
                },
            ) => a == b && Arc::ptr_eq(a_resolver, b_resolver),
            (ProjectMember(a), ProjectMember(b))
            | (ProjectOwner(a), ProjectOwner(b))
            | (CurrentProjectClientId(a), CurrentProjectClientId(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn check_claims(
    principal: &Principal,
    claims: &ClaimMap,
    require_all: bool,
) -> Result<AuthorizationResult, AuthzError> {
    if principal.kind != AuthKind::Jwt {
        return Ok(AuthorizationResult::not_authorized());
    }
    let payload = principal.claims.as_ref().ok_or_else(|| {
        AuthzError::evaluation("jwt principal is missing its claims payload")
    })?;
    let matched = if require_all {
        claims.iter().all(|(path, expected)| claim_matches(payload, path, expected))
    } else {
        claims.iter().any(|(path, expected)| claim_matches(payload, path, expected))
    };
    Ok(matched.into())
}

/// Trims leading/trailing slashes and collapses runs of slashes, so
/// `/a//b/` and `a/b` compare equal.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
