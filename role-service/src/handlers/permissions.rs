use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::{ErrorResponse, PermissionQueryRequest, PermissionQueryResponse},
    utils::ValidatedJson,
    AppState,
};

/// Check whether a user may create a given role
///
/// The decision only considers the requester's roles under the target role's
/// prefix.
#[utoipa::path(
    post,
    path = "/permissions/query",
    request_body = PermissionQueryRequest,
    responses(
        (status = 200, description = "Decision", body = PermissionQueryResponse),
        (status = 400, description = "Missing field or malformed role", body = ErrorResponse),
        (status = 404, description = "Requester not found", body = ErrorResponse),
        (status = 502, description = "Identity provider error", body = ErrorResponse)
    ),
    tag = "Permissions"
)]
pub async fn query_permission(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PermissionQueryRequest>,
) -> Result<Json<PermissionQueryResponse>, AppError> {
    if req.assigner_uid.is_empty() || req.create_role.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "assigner_uid and create_role are required"
        )));
    }

    let decision = state
        .provisioning
        .can_create_role(&req.assigner_uid, &req.create_role)
        .await?;

    let message = if decision.allowed {
        "Action allowed"
    } else {
        "Action not allowed"
    };

    Ok(Json(PermissionQueryResponse {
        allowed: decision.allowed,
        message: message.to_string(),
    }))
}
