use std::collections::BTreeMap;

use serde_json::Value;

use authgate_core_types::{AuthzError, ClaimLookup, ClaimsPayload};

/// Expected value for a single claim. `Null` matches a claim that is
/// absent or explicitly null.
#[derive(Clone, Debug, PartialEq)]
pub enum ClaimExpectation {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl ClaimExpectation {
    /// Builds an expectation from a DSL value. Only primitives are
    /// accepted, and numbers must be integral; anything else is a
    /// configuration error.
    pub fn from_value(value: &Value) -> Result<Self, AuthzError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => n.as_i64().map(Self::Int).ok_or_else(|| {
                AuthzError::config(format!("claim expectation must be integral, got {n}"))
            }),
            Value::String(s) => Ok(Self::Str(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(AuthzError::config(
                "claim expectations must be primitive values".to_string(),
            )),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::from(*n),
            Self::Str(s) => Value::from(s.clone()),
        }
    }
}

/// Claim path to expectation, ordered deterministically so encodings are
/// canonical. All/any semantics are order-independent.
pub type ClaimMap = BTreeMap<String, ClaimExpectation>;

/// Type-aware comparison of one claim against its expectation.
pub(crate) fn claim_matches(
    payload: &ClaimsPayload,
    path: &str,
    expected: &ClaimExpectation,
) -> bool {
    match (payload.lookup(path), expected) {
        (ClaimLookup::Absent, ClaimExpectation::Null) => true,
        (ClaimLookup::Bool(actual), ClaimExpectation::Bool(expected)) => actual == *expected,
        (ClaimLookup::Int(actual), ClaimExpectation::Int(expected)) => actual == *expected,
        (ClaimLookup::Str(actual), ClaimExpectation::Str(expected)) => actual == *expected,
        _ => false,
    }
}

/// Parses a DSL claim object into a [`ClaimMap`].
pub fn claim_map_from_object(object: &serde_json::Map<String, Value>) -> Result<ClaimMap, AuthzError> {
    let mut claims = ClaimMap::new();
    for (path, value) in object {
        claims.insert(path.clone(), ClaimExpectation::from_value(value)?);
    }
    Ok(claims)
}
