use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Result of resolving a claim path against a token payload.
#[derive(Clone, Debug, PartialEq)]
pub enum ClaimLookup {
    /// The path is missing, or points at an explicit `null`.
    Absent,
    Bool(bool),
    /// Integral numbers only; non-integral numerics resolve as
    /// [`ClaimLookup::Unsupported`].
    Int(i64),
    Str(String),
    /// Object, array or non-integral node. Claim matching is defined over
    /// primitive leaves only; these never match and are logged.
    Unsupported,
}

/// Wraps a token payload (a JSON tree) and resolves claim paths against it.
///
/// Paths are either bare field names (`aud`, `email_verified`) or
/// pointer-style expressions for nested fields
/// (`firebase/identities/email/0`); the leading `/` is optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClaimsPayload(Value);

impl ClaimsPayload {
    pub fn new(payload: Value) -> Self {
        Self(payload)
    }

    pub fn lookup(&self, path: &str) -> ClaimLookup {
        let pointer = normalize_pointer(path);
        let node = match self.0.pointer(&pointer) {
            None => return ClaimLookup::Absent,
            Some(node) => node,
        };
        match node {
            Value::Null => ClaimLookup::Absent,
            Value::Bool(b) => ClaimLookup::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(n) => ClaimLookup::Int(n),
                None => {
                    warn!(path, value = %n, "cannot compare non-integral claim value");
                    ClaimLookup::Unsupported
                }
            },
            Value::String(s) => ClaimLookup::Str(s.clone()),
            Value::Array(_) | Value::Object(_) => {
                warn!(path, "cannot compare claim node of non-primitive type");
                ClaimLookup::Unsupported
            }
        }
    }
}

fn normalize_pointer(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
