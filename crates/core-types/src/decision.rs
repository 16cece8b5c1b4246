/// Outcome of an authorization check.
///
/// Kept as a distinct type rather than a bare `bool` so the decision can
/// grow additional context without touching every call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthorizationResult {
    authorized: bool,
}

impl AuthorizationResult {
    pub fn authorized() -> Self {
        Self { authorized: true }
    }

    pub fn not_authorized() -> Self {
        Self { authorized: false }
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized
    }
}

impl From<bool> for AuthorizationResult {
    fn from(authorized: bool) -> Self {
        Self { authorized }
    }
}
