//! Auth0 Management API v2 client.
//!
//! Authenticates with the client-credentials grant and caches the management
//! access token until shortly before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::IdentityProvider;
use crate::config::Auth0Config;
use crate::models::{NewUser, ProviderRole, ProviderUser};
use crate::services::metrics::record_provider_request;
use crate::services::ProviderError;

const PAGE_SIZE: usize = 100;

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

#[derive(Debug, Serialize)]
struct CreateUserBody<'a> {
    connection: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RoleIdsBody<'a> {
    roles: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RolePage {
    roles: Vec<ProviderRole>,
    #[serde(default)]
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct UserPage {
    users: Vec<ProviderUser>,
    #[serde(default)]
    total: Option<usize>,
}

/// Error body returned by the management API.
#[derive(Debug, Deserialize)]
struct Auth0ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct Auth0Client {
    client: Client,
    config: Auth0Config,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    grace_period: Duration,
}

impl Auth0Client {
    pub fn new(config: Auth0Config) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            cached_token: Arc::new(RwLock::new(None)),
            grace_period: Duration::seconds(60),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/v2{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    fn user_url(&self, user_id: &str, suffix: &str) -> String {
        self.api_url(&format!(
            "/users/{}{}",
            urlencoding::encode(user_id),
            suffix
        ))
    }

    /// Valid management token, refreshed when missing or about to expire.
    async fn access_token(&self) -> Result<String, ProviderError> {
        {
            let cache = self.cached_token.read().await;
            if let Some(token) = cache.as_ref() {
                if !token.is_expired(self.grace_period) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let token = self.acquire_token().await?;
        let access_token = token.access_token.clone();
        *self.cached_token.write().await = Some(token);
        Ok(access_token)
    }

    #[tracing::instrument(skip(self), fields(domain = %self.config.domain))]
    async fn acquire_token(&self) -> Result<CachedToken, ProviderError> {
        let url = format!("{}/oauth/token", self.config.base_url.trim_end_matches('/'));
        let audience = self.config.audience();
        let body = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.config.client_id,
            client_secret: self.config.client_secret.expose_secret(),
            audience: &audience,
        };

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            record_provider_request("token", "error");
            ProviderError::Auth(format!("Token request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            record_provider_request("token", "error");
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Auth(format!(
                "Token request failed with status {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Auth(format!("Failed to parse token response: {}", e)))?;
        record_provider_request("token", "ok");

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        tracing::debug!(expires_at = %expires_at, "Acquired management API token");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }

    async fn invalidate_token(&self) {
        *self.cached_token.write().await = None;
    }

    /// Send an authenticated request and map non-success statuses.
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ProviderError> {
        let token = self.access_token().await?;
        let response = request.bearer_auth(token).send().await.map_err(|e| {
            record_provider_request(operation, "error");
            tracing::error!(operation, error = %e, "Provider request failed");
            ProviderError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            record_provider_request(operation, "ok");
            return Ok(response);
        }

        record_provider_request(operation, "error");
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
        }
        let err = error_from_response(response).await;
        tracing::warn!(operation, status = %status, error = %err, "Provider rejected request");
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = self.send(operation, request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(format!("{}: {}", operation, e)))
    }

    /// Walk a paginated listing until the reported total is reached or a page
    /// comes back short.
    async fn fetch_pages<P, T>(
        &self,
        operation: &'static str,
        url: &str,
        split: impl Fn(P) -> (Vec<T>, Option<usize>),
    ) -> Result<Vec<T>, ProviderError>
    where
        P: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page = 0usize;
        loop {
            let request = self.client.get(url).query(&[
                ("page", page.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("include_totals", "true".to_string()),
            ]);
            let (batch, total) = split(self.send_json::<P>(operation, request).await?);
            let fetched = batch.len();
            items.extend(batch);

            let done = match total {
                Some(total) => items.len() >= total,
                None => fetched < PAGE_SIZE,
            };
            if done || fetched == 0 {
                return Ok(items);
            }
            page += 1;
        }
    }
}

async fn error_from_response(response: Response) -> ProviderError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Auth0ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or(body);

    match status {
        StatusCode::NOT_FOUND => ProviderError::NotFound(message),
        StatusCode::CONFLICT => ProviderError::Conflict(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth(message),
        _ => ProviderError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl IdentityProvider for Auth0Client {
    #[tracing::instrument(skip(self, user), fields(email = %user.email))]
    async fn create_user(&self, user: &NewUser) -> Result<ProviderUser, ProviderError> {
        let body = CreateUserBody {
            connection: &self.config.connection,
            email: &user.email,
            password: user.password.as_str(),
        };
        let request = self.client.post(self.api_url("/users")).json(&body);
        let created: ProviderUser = self.send_json("create_user", request).await?;
        tracing::info!(user_id = %created.id, "Provider user created");
        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_user(&self, user_id: &str) -> Result<(), ProviderError> {
        let request = self.client.delete(self.user_url(user_id, ""));
        self.send("delete_user", request).await?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<ProviderUser>, ProviderError> {
        self.fetch_pages("list_users", &self.api_url("/users"), |p: UserPage| {
            (p.users, p.total)
        })
        .await
    }

    async fn list_roles(&self) -> Result<Vec<ProviderRole>, ProviderError> {
        let mut roles = self
            .fetch_pages("list_roles", &self.api_url("/roles"), |p: RolePage| {
                (p.roles, p.total)
            })
            .await?;
        // Range lookups rely on name order across page boundaries.
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn read_role(&self, role_id: &str) -> Result<ProviderRole, ProviderError> {
        let url = self.api_url(&format!("/roles/{}", urlencoding::encode(role_id)));
        self.send_json("read_role", self.client.get(url)).await
    }

    #[tracing::instrument(skip(self))]
    async fn assign_roles(&self, user_id: &str, role_ids: &[String]) -> Result<(), ProviderError> {
        let request = self
            .client
            .post(self.user_url(user_id, "/roles"))
            .json(&RoleIdsBody { roles: role_ids });
        self.send("assign_roles", request).await?;
        Ok(())
    }

    async fn user_roles(&self, user_id: &str) -> Result<Vec<ProviderRole>, ProviderError> {
        let mut roles = self
            .fetch_pages(
                "user_roles",
                &self.user_url(user_id, "/roles"),
                |p: RolePage| (p.roles, p.total),
            )
            .await?;
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    #[tracing::instrument(skip(self))]
    async fn remove_roles(&self, user_id: &str, role_ids: &[String]) -> Result<(), ProviderError> {
        let request = self
            .client
            .delete(self.user_url(user_id, "/roles"))
            .json(&RoleIdsBody { roles: role_ids });
        self.send("remove_roles", request).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.access_token().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn test_config() -> Auth0Config {
        Auth0Config {
            domain: "tenant.example.com".to_string(),
            base_url: "https://tenant.example.com/".to_string(),
            client_id: "client".to_string(),
            client_secret: Secret::new("secret".to_string()),
            connection: crate::config::DEFAULT_CONNECTION.to_string(),
            timeout_seconds: 5,
        }
    }

    #[test]
    fn test_cached_token_expiry() {
        let token = CachedToken {
            access_token: "test".to_string(),
            expires_at: Utc::now() + Duration::minutes(10),
        };
        assert!(!token.is_expired(Duration::minutes(5)));
        assert!(token.is_expired(Duration::minutes(15)));
    }

    #[test]
    fn test_user_url_encodes_identifier() {
        let client = Auth0Client::new(test_config()).unwrap();
        assert_eq!(
            client.user_url("auth0|abc", "/roles"),
            "https://tenant.example.com/api/v2/users/auth0%7Cabc/roles"
        );
        assert_eq!(client.api_url("/roles"), "https://tenant.example.com/api/v2/roles");
    }
}
