use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use authgate_core_types::AuthzError;

/// Typed identity appearing in a role binding, in the `type:value` member
/// syntax of the policy source (`user:a@x.com`, `domain:y.com`,
/// `allUsers`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrincipalId {
    User(String),
    ServiceAccount(String),
    Group(String),
    Domain(String),
    AllUsers,
    AllAuthenticatedUsers,
}

impl PrincipalId {
    pub fn parse(member: &str) -> Result<Self, AuthzError> {
        match member {
            "allUsers" => return Ok(Self::AllUsers),
            "allAuthenticatedUsers" => return Ok(Self::AllAuthenticatedUsers),
            _ => {}
        }
        let (kind, value) = member
            .split_once(':')
            .ok_or_else(|| AuthzError::config(format!("malformed policy member: {member}")))?;
        match kind {
            "user" => Ok(Self::User(value.to_string())),
            "serviceAccount" => Ok(Self::ServiceAccount(value.to_string())),
            "group" => Ok(Self::Group(value.to_string())),
            "domain" => Ok(Self::Domain(value.to_string())),
            _ => Err(AuthzError::config(format!(
                "unsupported policy member type: {member}"
            ))),
        }
    }

    /// Whether this identity covers the given email address.
    ///
    /// User, service-account and group identities match on literal value
    /// equality (group membership is not expanded). Domain identities
    /// match the part after `@`. The wildcard identities match any email.
    pub fn matches_email(&self, email: &str) -> bool {
        match self {
            Self::User(value) | Self::ServiceAccount(value) | Self::Group(value) => value == email,
            Self::Domain(value) => email
                .rsplit_once('@')
                .map(|(_, domain)| domain == value)
                .unwrap_or(false),
            Self::AllUsers | Self::AllAuthenticatedUsers => true,
        }
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(value) => write!(f, "user:{value}"),
            Self::ServiceAccount(value) => write!(f, "serviceAccount:{value}"),
            Self::Group(value) => write!(f, "group:{value}"),
            Self::Domain(value) => write!(f, "domain:{value}"),
            Self::AllUsers => write!(f, "allUsers"),
            Self::AllAuthenticatedUsers => write!(f, "allAuthenticatedUsers"),
        }
    }
}

/// Service-account identity as reported by the policy source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceAccountInfo {
    pub email: String,
    pub oauth2_client_id: String,
}

/// Immutable view of the project's role bindings, swapped whole on
/// refresh so readers never observe a partial update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleSnapshot {
    /// Role name (possibly `roles/`-prefixed) to the identities bound to it.
    pub bindings: BTreeMap<String, Vec<PrincipalId>>,
    /// Service-account email to its OAuth2 client id.
    pub service_account_client_ids: BTreeMap<String, String>,
}

impl RoleSnapshot {
    /// Roles held by the given email, canonical `roles/` prefix stripped.
    /// Returns an empty set for an email with no matching bindings.
    pub fn roles_for(&self, email: &str) -> BTreeSet<String> {
        let mut roles = BTreeSet::new();
        for (role, identities) in &self.bindings {
            if identities.iter().any(|id| id.matches_email(email)) {
                let name = role.strip_prefix("roles/").unwrap_or(role);
                roles.insert(name.to_string());
            }
        }
        roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> RoleSnapshot {
        let mut bindings = BTreeMap::new();
        bindings.insert(
            "roles/roleA".to_string(),
            vec![
                PrincipalId::User("a@x.com".into()),
                PrincipalId::Domain("y.com".into()),
            ],
        );
        bindings.insert(
            "roles/owner".to_string(),
            vec![PrincipalId::ServiceAccount("robot@x.iam.test".into())],
        );
        RoleSnapshot {
            bindings,
            service_account_client_ids: BTreeMap::new(),
        }
    }

    #[test]
    fn test_exact_and_domain_and_miss() {
        let snapshot = snapshot();
        assert_eq!(
            snapshot.roles_for("a@x.com"),
            BTreeSet::from(["roleA".to_string()])
        );
        assert_eq!(
            snapshot.roles_for("b@y.com"),
            BTreeSet::from(["roleA".to_string()])
        );
        assert!(snapshot.roles_for("c@z.com").is_empty());
    }

    #[test]
    fn test_wildcard_identities_match_any_email() {
        let mut bindings = BTreeMap::new();
        bindings.insert("roles/viewer".to_string(), vec![PrincipalId::AllUsers]);
        let snapshot = RoleSnapshot {
            bindings,
            service_account_client_ids: BTreeMap::new(),
        };
        assert_eq!(
            snapshot.roles_for("anyone@anywhere.test"),
            BTreeSet::from(["viewer".to_string()])
        );
    }

    #[test]
    fn test_member_parse_roundtrip() {
        for raw in [
            "user:a@x.com",
            "serviceAccount:sa@x.test",
            "group:team@x.com",
            "domain:y.com",
            "allUsers",
            "allAuthenticatedUsers",
        ] {
            assert_eq!(PrincipalId::parse(raw).unwrap().to_string(), raw);
        }
        assert!(PrincipalId::parse("deleted:user:a@x.com").is_err());
        assert!(PrincipalId::parse("nonsense").is_err());
    }

    #[test]
    fn test_domain_requires_full_domain_match() {
        let id = PrincipalId::Domain("y.com".into());
        assert!(id.matches_email("b@y.com"));
        assert!(!id.matches_email("b@my.com"));
        assert!(!id.matches_email("no-at-sign"));
    }
}
