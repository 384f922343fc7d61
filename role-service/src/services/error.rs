use service_core::error::AppError;
use thiserror::Error;

use crate::services::catalog::Division;

/// Failures talking to the identity provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider authentication failed: {0}")]
    Auth(String),

    #[error("Provider resource not found: {0}")]
    NotFound(String),

    #[error("Provider conflict: {0}")]
    Conflict(String),

    #[error("Provider rate limit exceeded")]
    RateLimited { retry_after: Option<u64> },

    #[error("Provider error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid provider response: {0}")]
    Decode(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Role validation and assignment failures.
///
/// `MalformedRole` aborts a whole assignment call. Every other variant is
/// collected per organizational-unit partition.
#[derive(Error, Debug)]
pub enum RoleError {
    #[error("Role {0} is not in correct format")]
    MalformedRole(String),

    #[error("Role not found: {0}")]
    UnknownRole(String),

    #[error("User's roles in {prefix} may not cross-function different division: {first}, {second}")]
    CrossDivision {
        prefix: String,
        first: Division,
        second: Division,
    },

    #[error("User's roles in {prefix} may not contain {first} and {second} at the same time")]
    Exclusivity {
        prefix: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("Role {0} does not exist in the identity provider")]
    UnresolvedRole(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl RoleError {
    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RoleError::MalformedRole(_) => "malformed_role",
            RoleError::UnknownRole(_) => "unknown_role",
            RoleError::CrossDivision { .. } => "cross_division",
            RoleError::Exclusivity { .. } => "exclusivity",
            RoleError::UnresolvedRole(_) => "unresolved_role",
            RoleError::Provider(_) => "provider",
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ProviderError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            ProviderError::RateLimited { retry_after } => AppError::TooManyRequests(
                "Identity provider rate limit exceeded".to_string(),
                retry_after,
            ),
            ProviderError::Unavailable(_) => AppError::ServiceUnavailable,
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

impl From<RoleError> for AppError {
    fn from(err: RoleError) -> Self {
        match err {
            RoleError::Provider(e) => AppError::from(e),
            other => AppError::BadRequest(anyhow::anyhow!(other.to_string())),
        }
    }
}
