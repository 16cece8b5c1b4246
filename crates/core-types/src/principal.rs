use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::claims::ClaimsPayload;

/// Kind of credential the caller authenticated with.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthKind {
    /// Opaque access token (scope-bearing).
    OAuth2,
    /// First-party signed ID token with a claims payload.
    Jwt,
    /// Token issued by the secondary (Entra) authority. These tokens carry
    /// no client id field, only an audience list.
    EntraJwt,
}

/// Read-only view of the authenticated caller, assembled once per request
/// by the host framework and threaded through every check evaluated for
/// that request.
#[derive(Clone, Debug, PartialEq)]
pub struct Principal {
    pub kind: AuthKind,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub verified_email: Option<bool>,
    pub hosted_domain: Option<String>,
    pub client_id: Option<String>,
    pub audience: Vec<String>,
    pub scopes: BTreeSet<String>,
    pub expires_in_seconds: Option<u64>,
    /// Token payload. Present for JWT kinds, absent for opaque tokens.
    pub claims: Option<ClaimsPayload>,
}

impl Principal {
    pub fn new(kind: AuthKind) -> Self {
        Self {
            kind,
            user_id: None,
            email: None,
            verified_email: None,
            hosted_domain: None,
            client_id: None,
            audience: Vec::new(),
            scopes: BTreeSet::new(),
            expires_in_seconds: None,
            claims: None,
        }
    }
}
