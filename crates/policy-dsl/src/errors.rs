use thiserror::Error;

use authgate_core_types::AuthzError;

/// Errors raised while loading or emitting policy text. All of these are
/// configuration errors: they surface at load time, never during request
/// evaluation.
#[derive(Debug, Error)]
pub enum DslError {
    #[error("invalid {format} document: {message}")]
    Parse { format: &'static str, message: String },
    #[error("don't know how to decode {node} as {family}")]
    UnrecognizedNode { family: &'static str, node: String },
    #[error("invalid {family} field '{key}': {message}")]
    InvalidField {
        family: &'static str,
        key: String,
        message: String,
    },
    #[error(transparent)]
    Config(#[from] AuthzError),
}
