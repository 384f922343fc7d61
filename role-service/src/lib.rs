pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    http::{header, HeaderValue, Method, Request},
    middleware::from_fn,
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::config::RoleServiceConfig;
use crate::services::{IdentityProvider, ProvisioningService};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::users::create_user,
        handlers::users::list_users,
        handlers::users::delete_user,
        handlers::roles::add_roles,
        handlers::roles::rewrite_roles,
        handlers::permissions::query_permission,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::CreateUserRequest,
            dtos::CreateUserResponse,
            dtos::UserListResponse,
            dtos::RolesRequest,
            dtos::RoleMutationResponse,
            dtos::PermissionQueryRequest,
            dtos::PermissionQueryResponse,
            models::ProviderUser,
            models::ProviderRole,
        )
    ),
    tags(
        (name = "Users", description = "User provisioning"),
        (name = "Roles", description = "Composite role assignment"),
        (name = "Permissions", description = "Role delegation checks"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: RoleServiceConfig,
    pub provider: Arc<dyn IdentityProvider>,
    pub provisioning: ProvisioningService,
}

impl AppState {
    pub fn new(config: RoleServiceConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            config,
            provisioning: ProvisioningService::new(provider.clone()),
            provider,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route(
            "/users",
            post(handlers::create_user).get(handlers::list_users),
        )
        .route(
            "/users/:user_id",
            service_core::axum::routing::delete(handlers::delete_user),
        )
        .route(
            "/users/:user_id/roles",
            post(handlers::add_roles).put(handlers::rewrite_roles),
        )
        .route("/permissions/query", post(handlers::query_permission))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

/// Service health check
///
/// Healthy only while the identity provider accepts our credentials.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Identity provider unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.provider.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Identity provider health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "identity_provider": "up"
        }
    })))
}
