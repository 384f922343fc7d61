//! Identity provider boundary.
//!
//! The service never stores users or roles itself; every read and mutation
//! goes through an [`IdentityProvider`].

mod auth0;
mod mock;

pub use auth0::Auth0Client;
pub use mock::{MockIdentityProvider, ProviderOperation};

use async_trait::async_trait;

use crate::models::{NewUser, ProviderRole, ProviderUser};
use crate::services::ProviderError;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> Result<ProviderUser, ProviderError>;

    async fn delete_user(&self, user_id: &str) -> Result<(), ProviderError>;

    async fn list_users(&self) -> Result<Vec<ProviderUser>, ProviderError>;

    /// Every role in the system, sorted ascending by composite name.
    ///
    /// The sort order is a precondition of the range lookups in
    /// [`crate::services::directory`].
    async fn list_roles(&self) -> Result<Vec<ProviderRole>, ProviderError>;

    async fn read_role(&self, role_id: &str) -> Result<ProviderRole, ProviderError>;

    async fn assign_roles(&self, user_id: &str, role_ids: &[String]) -> Result<(), ProviderError>;

    /// Roles currently held by a user, sorted ascending by composite name.
    async fn user_roles(&self, user_id: &str) -> Result<Vec<ProviderRole>, ProviderError>;

    async fn remove_roles(&self, user_id: &str, role_ids: &[String]) -> Result<(), ProviderError>;

    async fn health_check(&self) -> Result<(), ProviderError>;
}
