use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::ProviderUser;
use crate::services::RoleError;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Role PPK is not in correct format")]
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Successfully deleted user")]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email)]
    #[schema(example = "user@example.com")]
    pub email: String,
    #[validate(length(min = 1))]
    #[schema(example = "Test123!")]
    pub password: String,
    /// Composite roles to assign after creation.
    #[serde(default)]
    #[schema(example = json!(["A1:Admin PPE", "A2:PP"]))]
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateUserResponse {
    #[schema(example = "New user successfully created with ID: auth0|65f0c1d2e3a4b5c6d7e8f901")]
    pub message: String,
    pub user_id: String,
    /// Roles that could not be assigned; the user exists either way.
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RolesRequest {
    #[schema(example = json!(["A1:Admin PPE", "A1:Admin Agency"]))]
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleMutationResponse {
    pub message: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PermissionQueryRequest {
    #[schema(example = "auth0|65f0c1d2e3a4b5c6d7e8f901")]
    pub assigner_uid: String,
    #[schema(example = "A1:PPK")]
    pub create_role: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PermissionQueryResponse {
    pub allowed: bool,
    #[schema(example = "Action allowed")]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<ProviderUser>,
    pub total: usize,
}

pub fn error_strings(errors: &[RoleError]) -> Vec<String> {
    errors.iter().map(ToString::to_string).collect()
}
