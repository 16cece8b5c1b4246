//! Bidirectional mapping between policy text (JSON or YAML) and
//! authorizer trees.
//!
//! The grammar supports three node shapes per polymorphic family:
//! an object whose single recognized key picks the concrete type
//! (`{"httpMethod": "GET"}`), a bare string naming a zero-configuration
//! singleton (`"jwt"`), and an array reserved for one designated type per
//! family (an explicit string list). One generic dispatcher drives all
//! three shapes from static registration tables.

pub mod codec;
pub mod env;
pub mod errors;

pub use codec::{decode_policy, encode_policy, Format};
pub use env::Environment;
pub use errors::DslError;
