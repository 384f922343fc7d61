pub mod role;
pub mod user;

pub use role::{compose, prefix_bound, CompositeRole, ProviderRole, ROLE_SEPARATOR};
pub use user::{NewUser, Password, ProviderUser};
