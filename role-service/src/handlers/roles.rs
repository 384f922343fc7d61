use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{error_strings, ErrorResponse, RoleMutationResponse, RolesRequest},
    utils::ValidatedJson,
    AppState,
};

const ERRORS_HINT: &str =
    "Roles that could not be assigned are listed in \"errors\"; it is empty when every role was assigned.";

/// Add roles on top of those the user already holds
#[utoipa::path(
    post,
    path = "/users/{user_id}/roles",
    params(
        ("user_id" = String, Path, description = "Identity provider user id")
    ),
    request_body = RolesRequest,
    responses(
        (status = 200, description = "Addition processed", body = RoleMutationResponse),
        (status = 400, description = "Empty role list", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 502, description = "Identity provider error", body = ErrorResponse)
    ),
    tag = "Roles"
)]
pub async fn add_roles(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ValidatedJson(req): ValidatedJson<RolesRequest>,
) -> Result<Json<RoleMutationResponse>, AppError> {
    if req.roles.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "At least one role is required"
        )));
    }

    let errors = state.provisioning.add_roles(&user_id, &req.roles).await?;

    Ok(Json(RoleMutationResponse {
        message: format!("Role addition completed. {}", ERRORS_HINT),
        errors: error_strings(&errors),
    }))
}

/// Replace every role the user holds
///
/// An empty list removes all of the user's roles.
#[utoipa::path(
    put,
    path = "/users/{user_id}/roles",
    params(
        ("user_id" = String, Path, description = "Identity provider user id")
    ),
    request_body = RolesRequest,
    responses(
        (status = 200, description = "Rewrite processed", body = RoleMutationResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 502, description = "Identity provider error", body = ErrorResponse)
    ),
    tag = "Roles"
)]
pub async fn rewrite_roles(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ValidatedJson(req): ValidatedJson<RolesRequest>,
) -> Result<Json<RoleMutationResponse>, AppError> {
    let errors = state.provisioning.rewrite_roles(&user_id, &req.roles).await?;

    Ok(Json(RoleMutationResponse {
        message: format!("Role rewrite completed. {}", ERRORS_HINT),
        errors: error_strings(&errors),
    }))
}
