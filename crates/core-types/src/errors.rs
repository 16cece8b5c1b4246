use thiserror::Error;

/// Error taxonomy shared by all engine crates.
///
/// `Config` failures are raised at load/construction time and never deferred
/// to evaluation. `Source` failures come from external list/role backends.
/// `Evaluation` failures are unexpected conditions inside a check; they are
/// surfaced to the caller rather than mapped to an allow/deny decision.
#[derive(Debug, Error, Clone)]
pub enum AuthzError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("data source error: {0}")]
    Source(String),
    #[error("evaluation error: {0}")]
    Evaluation(String),
}

impl AuthzError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn source(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }
}
