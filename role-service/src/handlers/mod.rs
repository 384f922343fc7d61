//! HTTP handlers for role-service.

pub mod metrics;
pub mod permissions;
pub mod roles;
pub mod users;

pub use permissions::*;
pub use roles::*;
pub use users::*;
