//! authgate: request-authorization policy engine.
//!
//! Policies are trees of small predicates (authorizers) combined with
//! and/or/not, declared in a JSON/YAML DSL, and backed by externally
//! sourced allow/deny lists and project role bindings that refresh in the
//! background without blocking the request path.
//!
//! ```no_run
//! use authgate::{Engine, Environment, Format};
//! use authgate::{AuthKind, MethodDescriptor, Principal, RequestInfo};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(Environment::offline());
//! let policy = engine.load_policy(r#"{"and":["jwt",{"httpMethod":"GET"}]}"#, Format::Json)?;
//!
//! let principal = Principal::new(AuthKind::Jwt);
//! let method = MethodDescriptor::new("GET", "v1");
//! let request = RequestInfo::new("/things");
//! let decision = policy.is_authorized(&principal, &method, &request).await?;
//! assert!(decision.is_authorized());
//! # Ok(())
//! # }
//! ```

pub use authgate_authorizers::{builder, combined, Authorizer, ClaimMap, HttpMethod};
pub use authgate_core_types::{
    AuthKind, AuthorizationResult, AuthzError, ClaimLookup, ClaimsPayload, MethodDescriptor,
    Principal, RequestInfo,
};
pub use authgate_list_source::{
    BlobStore, EntityKeyStore, ListSource, StaticBlobStore, StaticEntityKeyStore,
};
pub use authgate_policy_dsl::{decode_policy, encode_policy, DslError, Environment, Format};
pub use authgate_refresh_cache::{AsyncRefreshCache, RefreshSource};
pub use authgate_role_resolver::{
    ProjectRoleResolver, RoleBindingSource, RoleSnapshot, StaticRoleSource,
};

/// Entry point tying the codec to a set of collaborators. One engine is
/// typically built at startup and used to load every policy the server
/// needs.
#[derive(Clone)]
pub struct Engine {
    env: Environment,
}

impl Engine {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Parses policy text into an evaluable policy. Configuration errors
    /// surface here, at load time.
    pub fn load_policy(&self, text: &str, format: Format) -> Result<Policy, DslError> {
        Ok(Policy {
            root: decode_policy(text, format, &self.env)?,
        })
    }

    /// Wraps an already-built tree.
    pub fn policy_from_tree(&self, root: Authorizer) -> Policy {
        Policy { root }
    }
}

/// A loaded policy: an immutable authorizer tree plus its canonical text
/// form. Safe to share and evaluate concurrently.
#[derive(Clone, Debug, PartialEq)]
pub struct Policy {
    root: Authorizer,
}

impl Policy {
    pub fn root(&self) -> &Authorizer {
        &self.root
    }

    pub async fn is_authorized(
        &self,
        principal: &Principal,
        method: &MethodDescriptor,
        request: &RequestInfo,
    ) -> Result<AuthorizationResult, AuthzError> {
        self.root.evaluate(principal, method, request).await
    }

    pub fn encode(&self, format: Format) -> Result<String, DslError> {
        encode_policy(&self.root, format)
    }
}
