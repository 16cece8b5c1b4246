//! End-to-end checks: a policy loaded from DSL text, evaluated against
//! fabricated principals and requests, with list and role data served by
//! the in-memory backends.

use std::fs;
use std::sync::Arc;

use serde_json::json;

use authgate::{
    builder, combined, AuthKind, ClaimsPayload, Engine, Environment, Format, ListSource,
    MethodDescriptor, Principal, ProjectRoleResolver, RequestInfo, StaticBlobStore,
    StaticEntityKeyStore, StaticRoleSource,
};

const POLICY: &str = r#"
and:
  - "jwt"
  - httpMethod: "GET"
  - not:
      versionContains: "beta"
  - clientIds:
      datastoreEntity: "AllowedClientIds"
      ttlInSeconds: 60
"#;

async fn engine() -> Engine {
    let blob_store = StaticBlobStore::new();
    let entity_store = StaticEntityKeyStore::new();
    entity_store
        .put(
            "AllowedClientIds",
            None,
            vec!["good-client".into(), "other-client".into()],
        )
        .await;
    let role_source = StaticRoleSource::new();
    role_source
        .bind("roles/owner", vec!["user:admin@x.com".into()])
        .await;
    let resolver = Arc::new(ProjectRoleResolver::new("428563709008", role_source, None));
    Engine::new(Environment::new(blob_store, entity_store, resolver))
}

fn jwt_principal(client_id: &str) -> Principal {
    let mut principal = Principal::new(AuthKind::Jwt);
    principal.client_id = Some(client_id.to_string());
    principal.email = Some("admin@x.com".to_string());
    principal.claims = Some(ClaimsPayload::new(json!({"aud": client_id})));
    principal
}

#[tokio::test]
async fn test_yaml_policy_end_to_end() {
    let engine = engine().await;
    let policy = engine.load_policy(POLICY, Format::Yaml).unwrap();

    let request = RequestInfo::new("/things");
    let get_v1 = MethodDescriptor::new("GET", "v1");

    let allowed = policy
        .is_authorized(&jwt_principal("good-client"), &get_v1, &request)
        .await
        .unwrap();
    assert!(allowed.is_authorized());

    let unknown_client = policy
        .is_authorized(&jwt_principal("stranger"), &get_v1, &request)
        .await
        .unwrap();
    assert!(!unknown_client.is_authorized());

    let beta = MethodDescriptor::new("GET", "v2beta1");
    let beta_denied = policy
        .is_authorized(&jwt_principal("good-client"), &beta, &request)
        .await
        .unwrap();
    assert!(!beta_denied.is_authorized());

    let post = MethodDescriptor::new("POST", "v1");
    let post_denied = policy
        .is_authorized(&jwt_principal("good-client"), &post, &request)
        .await
        .unwrap();
    assert!(!post_denied.is_authorized());

    let mut oauth_caller = jwt_principal("good-client");
    oauth_caller.kind = AuthKind::OAuth2;
    let wrong_kind = policy
        .is_authorized(&oauth_caller, &get_v1, &request)
        .await
        .unwrap();
    assert!(!wrong_kind.is_authorized());
}

#[tokio::test]
async fn test_policy_reencodes_canonically() {
    let engine = engine().await;
    let policy = engine.load_policy(POLICY, Format::Yaml).unwrap();
    let canonical = policy.encode(Format::Yaml).unwrap();
    let reloaded = engine.load_policy(&canonical, Format::Yaml).unwrap();
    assert_eq!(reloaded, policy);
    assert_eq!(reloaded.encode(Format::Yaml).unwrap(), canonical);
}

#[tokio::test]
async fn test_allow_deny_composition() {
    let blob_store = StaticBlobStore::new();
    blob_store
        .put(
            "gs://authconfig/deny/clientIds.txt",
            vec!["banned-client".into()],
        )
        .await;

    let dir = tempfile::tempdir().unwrap();
    let allow_dir = dir.path().join("allow");
    fs::create_dir_all(&allow_dir).unwrap();
    fs::write(
        allow_dir.join("clientIds.txt"),
        "good-client # partner\nbanned-client\n",
    )
    .unwrap();

    let role_source = StaticRoleSource::new();
    let resolver = Arc::new(ProjectRoleResolver::new("428563709008", role_source, None));

    let lists = combined::CombinedListBuilder::new(
        dir.path().to_string_lossy(),
        "gs://authconfig",
        blob_store,
    );
    let gate = combined::allow_deny(resolver, &lists).unwrap();

    let method = MethodDescriptor::new("GET", "v1");
    let request = RequestInfo::new("/things");

    let good = gate
        .evaluate(&jwt_principal("good-client"), &method, &request)
        .await
        .unwrap();
    assert!(good.is_authorized());

    // Allowed by the file list but struck by the deny blob.
    let banned = gate
        .evaluate(&jwt_principal("banned-client"), &method, &request)
        .await
        .unwrap();
    assert!(!banned.is_authorized());

    // Same-project client ids pass without any listing.
    let own_project = gate
        .evaluate(
            &jwt_principal("428563709008-web.apps.googleusercontent.com"),
            &method,
            &request,
        )
        .await
        .unwrap();
    assert!(own_project.is_authorized());

    let stranger = gate
        .evaluate(&jwt_principal("stranger"), &method, &request)
        .await
        .unwrap();
    assert!(!stranger.is_authorized());
}

#[tokio::test]
async fn test_role_policy_end_to_end() {
    let engine = engine().await;
    let policy = engine
        .load_policy(r#"{"or":["projectOwner",{"projectRoles":["auditor"]}]}"#, Format::Json)
        .unwrap();

    let method = MethodDescriptor::new("GET", "v1");
    let request = RequestInfo::new("/things");

    let owner = policy
        .is_authorized(&jwt_principal("good-client"), &method, &request)
        .await
        .unwrap();
    assert!(owner.is_authorized());

    let mut outsider = jwt_principal("good-client");
    outsider.email = Some("nobody@elsewhere.test".to_string());
    let denied = policy
        .is_authorized(&outsider, &method, &request)
        .await
        .unwrap();
    assert!(!denied.is_authorized());
}

#[tokio::test]
async fn test_builder_and_dsl_trees_are_interchangeable() {
    let engine = engine().await;
    let env = engine.environment();
    let built = builder::and(vec![
        builder::jwt(),
        builder::client_ids(ListSource::entity_keys(
            env.entity_key_store.clone(),
            "AllowedClientIds",
            None,
            None,
            Some(60),
        )),
    ])
    .unwrap();
    let policy = engine.policy_from_tree(built);
    let text = policy.encode(Format::Json).unwrap();
    let reloaded = engine.load_policy(&text, Format::Json).unwrap();
    assert_eq!(reloaded, policy);
}
