use serde_json::{Map, Value};

use authgate_authorizers::claims::claim_map_from_object;
use authgate_authorizers::{builder, Authorizer, HttpMethod};
use authgate_list_source::{ListSource, DEFAULT_ENTITY_LIMIT};
use authgate_refresh_cache::DEFAULT_TTL_SECONDS;

use crate::env::Environment;
use crate::errors::DslError;

/// Text representation of a policy document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

/// Parses policy text into an authorizer tree, wiring remote sources and
/// role leaves to the environment's collaborators.
pub fn decode_policy(
    text: &str,
    format: Format,
    env: &Environment,
) -> Result<Authorizer, DslError> {
    let node = parse_value(text, format)?;
    decode_node(&AUTHORIZER_FAMILY, env, &node)
}

/// Emits the canonical text form of a tree. Canonical encodings are a
/// fixed point of decode-then-encode: object keys are sorted and fields
/// holding their default value are omitted.
pub fn encode_policy(tree: &Authorizer, format: Format) -> Result<String, DslError> {
    let value = encode_authorizer(tree);
    match format {
        Format::Json => serde_json::to_string(&value).map_err(|err| DslError::Parse {
            format: "json",
            message: err.to_string(),
        }),
        Format::Yaml => serde_yaml::to_string(&value).map_err(|err| DslError::Parse {
            format: "yaml",
            message: err.to_string(),
        }),
    }
}

fn parse_value(text: &str, format: Format) -> Result<Value, DslError> {
    match format {
        Format::Json => serde_json::from_str(text).map_err(|err| DslError::Parse {
            format: "json",
            message: err.to_string(),
        }),
        Format::Yaml => {
            // YAML rides through the JSON tree so both formats share one
            // codec.
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(text).map_err(|err| DslError::Parse {
                    format: "yaml",
                    message: err.to_string(),
                })?;
            serde_json::to_value(yaml).map_err(|err| DslError::Parse {
                format: "yaml",
                message: err.to_string(),
            })
        }
    }
}

type DecodeObjectFn<T> = fn(&Environment, &Map<String, Value>) -> Result<T, DslError>;
type MakeSingletonFn<T> = fn(&Environment) -> Result<T, DslError>;
type DecodeArrayFn<T> = fn(&Environment, &[Value]) -> Result<T, DslError>;

/// Lookup tables describing one polymorphic family of the DSL.
struct Family<T: 'static> {
    name: &'static str,
    discriminators: &'static [(&'static str, DecodeObjectFn<T>)],
    singletons: &'static [(&'static str, MakeSingletonFn<T>)],
    array: Option<DecodeArrayFn<T>>,
}

/// The single three-shape dispatcher: object nodes resolve through the
/// discriminator table (first recognized key wins), string nodes through
/// the singleton table, array nodes through the family's designated array
/// type. Anything else names the offending node and the family.
fn decode_node<T>(family: &Family<T>, env: &Environment, node: &Value) -> Result<T, DslError> {
    match node {
        Value::Object(map) => {
            for (key, decode) in family.discriminators {
                if map.contains_key(*key) {
                    return decode(env, map);
                }
            }
            Err(unrecognized(family.name, node))
        }
        Value::String(name) => {
            for (singleton, make) in family.singletons {
                if singleton == name {
                    return make(env);
                }
            }
            Err(unrecognized(family.name, node))
        }
        Value::Array(items) => match family.array {
            Some(decode) => decode(env, items),
            None => Err(unrecognized(family.name, node)),
        },
        _ => Err(unrecognized(family.name, node)),
    }
}

fn unrecognized(family: &'static str, node: &Value) -> DslError {
    DslError::UnrecognizedNode {
        family,
        node: node.to_string(),
    }
}

static AUTHORIZER_FAMILY: Family<Authorizer> = Family {
    name: "authorizer",
    discriminators: &[
        ("and", decode_and),
        ("or", decode_or),
        ("not", decode_not),
        ("versionMatches", decode_version_matches),
        ("versionContains", decode_version_contains),
        ("httpMethod", decode_http_method),
        ("clientIds", decode_client_ids),
        ("entraIdAppIds", decode_entra_app_ids),
        ("projects", decode_projects),
        ("anyJwtClaim", decode_any_jwt_claim),
        ("allJwtClaims", decode_all_jwt_claims),
        ("queryParam", decode_query_param),
        ("queryParamValue", decode_query_param_value),
        ("pathPrefix", decode_path_prefix),
        ("basePath", decode_base_path),
        ("projectRoles", decode_project_roles),
    ],
    singletons: &[
        ("jwt", make_jwt),
        ("oauth2", make_oauth2),
        ("currentProjectClientId", make_current_project_client_id),
        ("projectMember", make_project_member),
        ("projectOwner", make_project_owner),
    ],
    array: None,
};

static LIST_SOURCE_FAMILY: Family<ListSource> = Family {
    name: "list source",
    discriminators: &[
        ("merge", decode_merge),
        ("file", decode_file),
        ("datastoreEntity", decode_entity_keys),
        ("cloudStorageUrl", decode_blob),
    ],
    singletons: &[],
    array: Some(decode_explicit),
};

// Field helpers -------------------------------------------------------------

fn only_keys(
    family: &'static str,
    map: &Map<String, Value>,
    allowed: &[&str],
) -> Result<(), DslError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(DslError::InvalidField {
                family,
                key: key.clone(),
                message: "unexpected field".to_string(),
            });
        }
    }
    Ok(())
}

fn str_field<'a>(
    family: &'static str,
    map: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, DslError> {
    map.get(key).and_then(Value::as_str).ok_or_else(|| {
        DslError::InvalidField {
            family,
            key: key.to_string(),
            message: "expected a string".to_string(),
        }
    })
}

fn array_field<'a>(
    family: &'static str,
    map: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Vec<Value>, DslError> {
    match map.get(key) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(DslError::InvalidField {
            family,
            key: key.to_string(),
            message: "expected an array".to_string(),
        }),
    }
}

fn object_field<'a>(
    family: &'static str,
    map: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Map<String, Value>, DslError> {
    match map.get(key) {
        Some(Value::Object(object)) => Ok(object),
        _ => Err(DslError::InvalidField {
            family,
            key: key.to_string(),
            message: "expected an object".to_string(),
        }),
    }
}

fn opt_bool_field(
    family: &'static str,
    map: &Map<String, Value>,
    key: &str,
    default: bool,
) -> Result<bool, DslError> {
    match map.get(key) {
        None => Ok(default),
        Some(Value::Bool(value)) => Ok(*value),
        Some(_) => Err(DslError::InvalidField {
            family,
            key: key.to_string(),
            message: "expected a boolean".to_string(),
        }),
    }
}

fn opt_u64_field(
    family: &'static str,
    map: &Map<String, Value>,
    key: &str,
) -> Result<Option<u64>, DslError> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| DslError::InvalidField {
            family,
            key: key.to_string(),
            message: "expected a non-negative integer".to_string(),
        }),
    }
}

// Authorizer decoders -------------------------------------------------------

fn decode_children(env: &Environment, items: &[Value]) -> Result<Vec<Authorizer>, DslError> {
    items
        .iter()
        .map(|item| decode_node(&AUTHORIZER_FAMILY, env, item))
        .collect()
}

fn decode_and(env: &Environment, map: &Map<String, Value>) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["and"])?;
    let children = decode_children(env, array_field("authorizer", map, "and")?)?;
    Ok(builder::and(children)?)
}

fn decode_or(env: &Environment, map: &Map<String, Value>) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["or"])?;
    let children = decode_children(env, array_field("authorizer", map, "or")?)?;
    Ok(builder::or(children)?)
}

fn decode_not(env: &Environment, map: &Map<String, Value>) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["not"])?;
    let child = map.get("not").map(|node| decode_node(&AUTHORIZER_FAMILY, env, node));
    match child {
        Some(child) => Ok(builder::not(child?)),
        None => Err(DslError::InvalidField {
            family: "authorizer",
            key: "not".to_string(),
            message: "expected a child authorizer".to_string(),
        }),
    }
}

fn decode_version_matches(
    _env: &Environment,
    map: &Map<String, Value>,
) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["versionMatches"])?;
    Ok(builder::version_matches(str_field("authorizer", map, "versionMatches")?)?)
}

fn decode_version_contains(
    _env: &Environment,
    map: &Map<String, Value>,
) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["versionContains"])?;
    Ok(builder::version_contains(str_field("authorizer", map, "versionContains")?))
}

fn decode_http_method(_env: &Environment, map: &Map<String, Value>) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["httpMethod"])?;
    let method = HttpMethod::parse(str_field("authorizer", map, "httpMethod")?)?;
    Ok(builder::http_method(method))
}

fn decode_client_ids(env: &Environment, map: &Map<String, Value>) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["clientIds"])?;
    let values = decode_list_value(env, map, "clientIds")?;
    Ok(builder::client_ids(values))
}

fn decode_entra_app_ids(
    env: &Environment,
    map: &Map<String, Value>,
) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["entraIdAppIds"])?;
    let values = decode_list_value(env, map, "entraIdAppIds")?;
    Ok(builder::entra_app_ids(values))
}

fn decode_projects(env: &Environment, map: &Map<String, Value>) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["projects"])?;
    let values = decode_list_value(env, map, "projects")?;
    Ok(builder::projects(values))
}

fn decode_list_value(
    env: &Environment,
    map: &Map<String, Value>,
    key: &str,
) -> Result<ListSource, DslError> {
    match map.get(key) {
        Some(node) => decode_node(&LIST_SOURCE_FAMILY, env, node),
        None => Err(DslError::InvalidField {
            family: "authorizer",
            key: key.to_string(),
            message: "expected a list source".to_string(),
        }),
    }
}

fn decode_any_jwt_claim(
    _env: &Environment,
    map: &Map<String, Value>,
) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["anyJwtClaim"])?;
    let claims = claim_map_from_object(object_field("authorizer", map, "anyJwtClaim")?)?;
    Ok(Authorizer::AnyJwtClaim(claims))
}

fn decode_all_jwt_claims(
    _env: &Environment,
    map: &Map<String, Value>,
) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["allJwtClaims"])?;
    let claims = claim_map_from_object(object_field("authorizer", map, "allJwtClaims")?)?;
    Ok(Authorizer::AllJwtClaims(claims))
}

fn decode_query_param(_env: &Environment, map: &Map<String, Value>) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["queryParam"])?;
    Ok(builder::required_query_param(str_field("authorizer", map, "queryParam")?))
}

fn decode_query_param_value(
    env: &Environment,
    map: &Map<String, Value>,
) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["queryParamValue"])?;
    let config = object_field("authorizer", map, "queryParamValue")?;
    only_keys("authorizer", config, &["name", "allowIfAbsent", "values"])?;
    let name = str_field("authorizer", config, "name")?;
    let allow_if_absent = opt_bool_field("authorizer", config, "allowIfAbsent", false)?;
    let values = decode_list_value(env, config, "values")?;
    if allow_if_absent {
        Ok(builder::optional_query_param_value(name, values))
    } else {
        Ok(builder::required_query_param_value(name, values))
    }
}

fn decode_path_prefix(_env: &Environment, map: &Map<String, Value>) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["pathPrefix"])?;
    Ok(builder::path_prefix(str_field("authorizer", map, "pathPrefix")?))
}

fn decode_base_path(_env: &Environment, map: &Map<String, Value>) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["basePath"])?;
    Ok(builder::base_path(str_field("authorizer", map, "basePath")?))
}

fn decode_project_roles(
    env: &Environment,
    map: &Map<String, Value>,
) -> Result<Authorizer, DslError> {
    only_keys("authorizer", map, &["projectRoles"])?;
    let items = array_field("authorizer", map, "projectRoles")?;
    let mut roles = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(role) => roles.push(role.to_string()),
            None => {
                return Err(DslError::InvalidField {
                    family: "authorizer",
                    key: "projectRoles".to_string(),
                    message: "expected role names".to_string(),
                })
            }
        }
    }
    Ok(builder::has_project_roles(env.role_resolver.clone(), roles))
}

// Authorizer singletons -----------------------------------------------------

fn make_jwt(_env: &Environment) -> Result<Authorizer, DslError> {
    Ok(builder::jwt())
}

fn make_oauth2(_env: &Environment) -> Result<Authorizer, DslError> {
    Ok(builder::oauth2())
}

fn make_current_project_client_id(env: &Environment) -> Result<Authorizer, DslError> {
    Ok(builder::current_project_client_id(env.role_resolver.clone()))
}

fn make_project_member(env: &Environment) -> Result<Authorizer, DslError> {
    Ok(builder::project_member(env.role_resolver.clone()))
}

fn make_project_owner(env: &Environment) -> Result<Authorizer, DslError> {
    Ok(builder::project_owner(env.role_resolver.clone()))
}

// List-source decoders ------------------------------------------------------

fn decode_explicit(_env: &Environment, items: &[Value]) -> Result<ListSource, DslError> {
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(value) => values.push(value.to_string()),
            None => {
                return Err(DslError::InvalidField {
                    family: "list source",
                    key: "explicit".to_string(),
                    message: "expected string entries".to_string(),
                })
            }
        }
    }
    Ok(ListSource::explicit(values))
}

fn decode_merge(env: &Environment, map: &Map<String, Value>) -> Result<ListSource, DslError> {
    only_keys("list source", map, &["merge"])?;
    let sources = array_field("list source", map, "merge")?
        .iter()
        .map(|item| decode_node(&LIST_SOURCE_FAMILY, env, item))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ListSource::merge(sources))
}

fn decode_file(_env: &Environment, map: &Map<String, Value>) -> Result<ListSource, DslError> {
    only_keys("list source", map, &["file", "failOnMissing"])?;
    let path = str_field("list source", map, "file")?;
    let fail_on_missing = opt_bool_field("list source", map, "failOnMissing", true)?;
    Ok(ListSource::file(path, fail_on_missing)?)
}

fn decode_blob(env: &Environment, map: &Map<String, Value>) -> Result<ListSource, DslError> {
    only_keys("list source", map, &["cloudStorageUrl", "ttlInSeconds", "failOnMissing"])?;
    let url = str_field("list source", map, "cloudStorageUrl")?;
    let ttl_seconds = opt_u64_field("list source", map, "ttlInSeconds")?;
    let fail_on_missing = opt_bool_field("list source", map, "failOnMissing", true)?;
    Ok(ListSource::blob(
        env.blob_store.clone(),
        url,
        ttl_seconds,
        fail_on_missing,
    ))
}

fn decode_entity_keys(env: &Environment, map: &Map<String, Value>) -> Result<ListSource, DslError> {
    only_keys(
        "list source",
        map,
        &["datastoreEntity", "namespace", "limit", "ttlInSeconds"],
    )?;
    let kind = str_field("list source", map, "datastoreEntity")?;
    let namespace = match map.get("namespace") {
        None => None,
        Some(Value::String(namespace)) => Some(namespace.clone()),
        Some(_) => {
            return Err(DslError::InvalidField {
                family: "list source",
                key: "namespace".to_string(),
                message: "expected a string".to_string(),
            })
        }
    };
    let limit = opt_u64_field("list source", map, "limit")?.map(|limit| limit as usize);
    let ttl_seconds = opt_u64_field("list source", map, "ttlInSeconds")?;
    Ok(ListSource::entity_keys(
        env.entity_key_store.clone(),
        kind,
        namespace,
        limit,
        ttl_seconds,
    ))
}

// Encoders ------------------------------------------------------------------

fn object(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

pub(crate) fn encode_authorizer(tree: &Authorizer) -> Value {
    match tree {
        Authorizer::All(children) => object("and", encode_children(children)),
        Authorizer::Any(children) => object("or", encode_children(children)),
        Authorizer::Not(child) => object("not", encode_authorizer(child)),
        Authorizer::JwtOnly => Value::from("jwt"),
        Authorizer::OAuth2Only => Value::from("oauth2"),
        Authorizer::ClientIds(values) => object("clientIds", encode_list_source(values)),
        Authorizer::EntraAppIds(values) => object("entraIdAppIds", encode_list_source(values)),
        Authorizer::Projects(values) => object("projects", encode_list_source(values)),
        Authorizer::QueryParam { name } => object("queryParam", Value::from(name.clone())),
        Authorizer::QueryParamValue {
            name,
            allow_if_absent,
            values,
        } => {
            let mut config = Map::new();
            config.insert("name".to_string(), Value::from(name.clone()));
            if *allow_if_absent {
                config.insert("allowIfAbsent".to_string(), Value::from(true));
            }
            config.insert("values".to_string(), encode_list_source(values));
            object("queryParamValue", Value::Object(config))
        }
        Authorizer::HttpMethod(method) => object("httpMethod", Value::from(method.as_str())),
        Authorizer::PathPrefix(prefix) => object("pathPrefix", Value::from(prefix.clone())),
        Authorizer::BasePath(path) => object("basePath", Value::from(path.clone())),
        Authorizer::VersionContains(fragment) => {
            object("versionContains", Value::from(fragment.clone()))
        }
        Authorizer::VersionMatches(pattern) => {
            object("versionMatches", Value::from(pattern.pattern()))
        }
        Authorizer::AllJwtClaims(claims) => object("allJwtClaims", encode_claims(claims)),
        Authorizer::AnyJwtClaim(claims) => object("anyJwtClaim", encode_claims(claims)),
        Authorizer::ProjectRoles { roles, .. } => object(
            "projectRoles",
            Value::Array(roles.iter().map(|role| Value::from(role.clone())).collect()),
        ),
        Authorizer::ProjectMember(_) => Value::from("projectMember"),
        Authorizer::ProjectOwner(_) => Value::from("projectOwner"),
        Authorizer::CurrentProjectClientId(_) => Value::from("currentProjectClientId"),
    }
}

fn encode_children(children: &[Authorizer]) -> Value {
    Value::Array(children.iter().map(encode_authorizer).collect())
}

fn encode_claims(claims: &authgate_authorizers::ClaimMap) -> Value {
    let mut map = Map::new();
    for (path, expectation) in claims {
        map.insert(path.clone(), expectation.to_value());
    }
    Value::Object(map)
}

pub(crate) fn encode_list_source(source: &ListSource) -> Value {
    match source {
        ListSource::Explicit { values } => Value::Array(
            values
                .iter()
                .map(|value| Value::from(value.clone()))
                .collect(),
        ),
        ListSource::File(file) => {
            let mut map = Map::new();
            map.insert("file".to_string(), Value::from(file.path.clone()));
            if !file.fail_on_missing {
                map.insert("failOnMissing".to_string(), Value::from(false));
            }
            Value::Object(map)
        }
        ListSource::Merge { sources } => object(
            "merge",
            Value::Array(sources.iter().map(encode_list_source).collect()),
        ),
        ListSource::Blob(blob) => {
            let mut map = Map::new();
            map.insert(
                "cloudStorageUrl".to_string(),
                Value::from(blob.url.clone()),
            );
            if blob.ttl_seconds != DEFAULT_TTL_SECONDS {
                map.insert("ttlInSeconds".to_string(), Value::from(blob.ttl_seconds));
            }
            if !blob.fail_on_missing {
                map.insert("failOnMissing".to_string(), Value::from(false));
            }
            Value::Object(map)
        }
        ListSource::EntityKeys(keys) => {
            let mut map = Map::new();
            map.insert(
                "datastoreEntity".to_string(),
                Value::from(keys.kind.clone()),
            );
            if let Some(namespace) = &keys.namespace {
                map.insert("namespace".to_string(), Value::from(namespace.clone()));
            }
            if keys.limit != DEFAULT_ENTITY_LIMIT {
                map.insert("limit".to_string(), Value::from(keys.limit as u64));
            }
            if keys.ttl_seconds != DEFAULT_TTL_SECONDS {
                map.insert("ttlInSeconds".to_string(), Value::from(keys.ttl_seconds));
            }
            Value::Object(map)
        }
    }
}

// Used by tests to decode a bare list-source document.
#[cfg(test)]
pub(crate) fn decode_list_source_node(
    env: &Environment,
    node: &Value,
) -> Result<ListSource, DslError> {
    decode_node(&LIST_SOURCE_FAMILY, env, node)
}
