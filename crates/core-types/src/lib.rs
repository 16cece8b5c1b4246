//! Shared vocabulary for the authgate engine: the authorization decision
//! type, the per-request principal view, and the claims payload accessor.

pub mod claims;
pub mod decision;
pub mod errors;
pub mod principal;
pub mod request;

pub use claims::{ClaimLookup, ClaimsPayload};
pub use decision::AuthorizationResult;
pub use errors::AuthzError;
pub use principal::{AuthKind, Principal};
pub use request::{MethodDescriptor, RequestInfo};
