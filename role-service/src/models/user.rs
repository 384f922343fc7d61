use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A user record as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderUser {
    #[serde(rename = "user_id")]
    #[schema(example = "auth0|65f0c1d2e3a4b5c6d7e8f901")]
    pub id: String,
    #[serde(default)]
    #[schema(example = "user@example.com")]
    pub email: String,
}

/// Password newtype so credentials never end up in Debug output.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

/// Input for user creation at the provider.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: Password,
}
