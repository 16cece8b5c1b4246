//! Role-binding snapshots for the host project, refreshed in the
//! background, and the matching rules that map an email address to the
//! roles it holds.

pub mod model;
pub mod resolver;

pub use model::{PrincipalId, RoleSnapshot, ServiceAccountInfo};
pub use resolver::{
    extract_project_number, ProjectRoleResolver, RoleBindingSource, StaticRoleSource,
};
