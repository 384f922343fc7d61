//! Services layer for role-service.
//!
//! Role catalog and validation rules, the provider-backed role directory,
//! and the assignment and provisioning policies built on them.

pub mod assignment;
pub mod catalog;
pub mod directory;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod provisioning;
pub mod validator;

pub use assignment::RoleAssigner;
pub use directory::RoleDirectory;
pub use error::{ProviderError, RoleError};
pub use provider::{Auth0Client, IdentityProvider, MockIdentityProvider, ProviderOperation};
pub use provisioning::{Delegation, ProvisioningService};
