use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        error_strings, CreateUserRequest, CreateUserResponse, ErrorResponse, MessageResponse,
        UserListResponse,
    },
    models::{NewUser, Password},
    utils::ValidatedJson,
    AppState,
};

/// Create a user and optionally assign initial roles
///
/// Roles that fail validation or assignment are reported in `errors`; the user
/// is created regardless.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = CreateUserResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 409, description = "User already exists", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 502, description = "Identity provider error", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), AppError> {
    let user = NewUser {
        email: req.email,
        password: Password::new(req.password),
    };

    let (created, errors) = state.provisioning.create_user(user, &req.roles).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            message: format!("New user successfully created with ID: {}", created.id),
            user_id: created.id,
            errors: error_strings(&errors),
        }),
    ))
}

/// List users known to the identity provider
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Users", body = UserListResponse),
        (status = 502, description = "Identity provider error", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<UserListResponse>, AppError> {
    let users = state.provisioning.list_users().await?;
    Ok(Json(UserListResponse {
        total: users.len(),
        users,
    }))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    params(
        ("user_id" = String, Path, description = "Identity provider user id")
    ),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 502, description = "Identity provider error", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.provisioning.delete_user(&user_id).await?;
    Ok(Json(MessageResponse {
        message: "Successfully deleted user".to_string(),
    }))
}
