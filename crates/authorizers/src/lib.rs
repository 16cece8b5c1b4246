//! The authorizer tree: logical combinators (all/any/not) over a closed
//! family of leaf predicates, evaluated against the per-request principal,
//! method descriptor and raw request view.

pub mod builder;
pub mod claims;
pub mod combined;
pub mod tree;

pub use claims::{ClaimExpectation, ClaimMap};
pub use combined::CombinedListBuilder;
pub use tree::{Authorizer, HttpMethod, VersionPattern};
