//! Shared setup for role-service integration tests.

#![allow(dead_code)]

use role_service::{
    build_router,
    config::{Auth0Config, Environment, RoleServiceConfig, SecurityConfig, DEFAULT_CONNECTION},
    services::MockIdentityProvider,
    AppState,
};
use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Organizational units seeded with every catalog role.
pub const TEST_PREFIXES: &[&str] = &["A1", "A2", "A3"];

pub struct TestApp {
    pub address: String,
    pub provider: Arc<MockIdentityProvider>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        role_service::services::metrics::init_metrics();

        let provider = Arc::new(MockIdentityProvider::with_catalog_roles(TEST_PREFIXES));
        let state = AppState::new(test_config(), provider.clone());
        let app = build_router(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            service_core::axum::serve(listener, app).await.ok();
        });

        TestApp {
            address: format!("http://127.0.0.1:{}", port),
            provider,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create a user through the API and return its id.
    pub async fn create_user(&self, email: &str, roles: &[&str]) -> String {
        let response = self
            .post_json(
                "/users",
                &serde_json::json!({
                    "email": email,
                    "password": "Test123!",
                    "roles": roles,
                }),
            )
            .await;
        assert_eq!(response.status(), 201);
        let body: serde_json::Value = response.json().await.unwrap();
        body["user_id"].as_str().unwrap().to_string()
    }
}

pub fn roles_path(user_id: &str) -> String {
    format!("/users/{}/roles", encode_segment(user_id))
}

/// Provider ids contain `|`, which must be escaped in a path segment.
pub fn encode_segment(segment: &str) -> String {
    segment.replace('|', "%7C")
}

pub fn test_config() -> RoleServiceConfig {
    RoleServiceConfig {
        common: CoreConfig { port: 0 },
        environment: Environment::Dev,
        service_name: "role-service".to_string(),
        service_version: "0.1.0".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        auth0: Auth0Config {
            domain: "tenant.example.com".to_string(),
            base_url: "https://tenant.example.com".to_string(),
            client_id: "test-client".to_string(),
            client_secret: Secret::new("test-secret".to_string()),
            connection: DEFAULT_CONNECTION.to_string(),
            timeout_seconds: 5,
        },
    }
}
