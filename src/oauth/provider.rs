//! Token acquisition with lazy, safety-margin based refresh.
//!
//! One `TokenProvider` serves every outbound client: it records client
//! registrations, caches exchanged tokens keyed by destination and grant,
//! and replaces cache entries wholesale after each completed exchange.
//! Concurrent cache misses may each reach the token endpoint; the last
//! finished exchange wins. No lock is ever held across network I/O, so a
//! canceled acquisition leaves the cache untouched.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{ConfigError, TokenError};
use crate::oauth::authorizations::{AuthorizationStore, UserAuthorization};
use crate::oauth::types::{
    AuthorizedClient, ClientAuthMethod, ClientRegistration, GrantType, RegistrationKey,
    TokenEndpointErrorResponse, TokenEndpointResponse, expiry_timestamp,
};

/// Seconds subtracted from token lifetimes before a cached token is
/// considered expired
pub const DEFAULT_SAFETY_MARGIN_SECONDS: i64 = 60;

pub type Result<T> = std::result::Result<T, TokenError>;

/// Acquires and caches OAuth tokens for registered destinations
pub struct TokenProvider {
    http_client: reqwest::Client,
    authorizations: Arc<dyn AuthorizationStore>,
    registrations: std::sync::RwLock<HashMap<RegistrationKey, Arc<ClientRegistration>>>,
    tokens: tokio::sync::RwLock<HashMap<RegistrationKey, AuthorizedClient>>,
    safety_margin: Duration,
}

impl TokenProvider {
    pub fn new(http_client: reqwest::Client, authorizations: Arc<dyn AuthorizationStore>) -> Self {
        Self {
            http_client,
            authorizations,
            registrations: std::sync::RwLock::new(HashMap::new()),
            tokens: tokio::sync::RwLock::new(HashMap::new()),
            safety_margin: Duration::seconds(DEFAULT_SAFETY_MARGIN_SECONDS),
        }
    }

    /// Override the default expiry safety margin
    pub fn with_safety_margin(mut self, safety_margin: Duration) -> Self {
        self.safety_margin = safety_margin;
        self
    }

    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// Record a registration. Re-registering identical parameters returns the
    /// existing entry; a conflicting duplicate is a configuration error.
    pub fn register(
        &self,
        registration: ClientRegistration,
    ) -> std::result::Result<Arc<ClientRegistration>, ConfigError> {
        let key = registration.key();
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = registrations.get(&key) {
            if **existing == registration {
                return Ok(existing.clone());
            }
            return Err(ConfigError::ConflictingRegistration(key.to_string()));
        }
        let registration = Arc::new(registration);
        registrations.insert(key, registration.clone());
        Ok(registration)
    }

    /// Look up a recorded registration
    pub fn registration(&self, key: &RegistrationKey) -> Option<Arc<ClientRegistration>> {
        let registrations = self
            .registrations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        registrations.get(key).cloned()
    }

    /// Inspect the cached token for a registration, if any
    pub async fn cached_token(&self, key: &RegistrationKey) -> Option<AuthorizedClient> {
        let tokens = self.tokens.read().await;
        tokens.get(key).cloned()
    }

    /// Return a usable token for the registration, exchanging with the token
    /// endpoint only when no unexpired token is available.
    ///
    /// `principal` is required for authorization_code registrations and
    /// ignored for client_credentials ones.
    pub async fn acquire(
        &self,
        registration: &ClientRegistration,
        principal: Option<&str>,
    ) -> Result<AuthorizedClient> {
        match registration.grant_type {
            GrantType::ClientCredentials => self.acquire_client_credentials(registration).await,
            GrantType::AuthorizationCode => {
                self.acquire_authorization_code(registration, principal).await
            }
            GrantType::RefreshToken => Err(TokenError::AuthenticationFailed(
                "refresh_token cannot be used as a client grant".to_string(),
            )),
        }
    }

    async fn acquire_client_credentials(
        &self,
        registration: &ClientRegistration,
    ) -> Result<AuthorizedClient> {
        let key = registration.key();
        {
            let tokens = self.tokens.read().await;
            if let Some(token) = tokens.get(&key) {
                if !token.is_expired(self.safety_margin) {
                    tracing::debug!(key = %key, "using cached token");
                    return Ok(token.clone());
                }
            }
        }

        tracing::debug!(key = %key, "requesting client_credentials token");
        let mut params: Vec<(&str, &str)> =
            vec![("grant_type", GrantType::ClientCredentials.as_str())];
        if let Some(scope) = &registration.scope {
            params.push(("scope", scope.as_str()));
        }
        let response = self.post_token_request(registration, params).await?;
        let token = AuthorizedClient::from_response(key.clone(), &response, Utc::now())?;
        tracing::info!(key = %key, expires_at = %token.expires_at, "token acquired");

        let mut tokens = self.tokens.write().await;
        tokens.insert(key, token.clone());
        Ok(token)
    }

    async fn acquire_authorization_code(
        &self,
        registration: &ClientRegistration,
        principal: Option<&str>,
    ) -> Result<AuthorizedClient> {
        let key = registration.key();
        let principal = principal.ok_or_else(|| {
            TokenError::AuthorizationRequired(format!("no principal bound for {}", key))
        })?;

        let authorization = self
            .authorizations
            .get_authorization(&key, principal)
            .await?
            .ok_or_else(|| {
                TokenError::AuthorizationRequired(format!(
                    "no stored authorization for principal '{}' at {}",
                    principal, key
                ))
            })?;

        if !authorization.is_expired(self.safety_margin) {
            tracing::debug!(key = %key, principal = %principal, "using stored authorization");
            return Ok(authorization.to_authorized_client());
        }

        let Some(refresh_token) = authorization.refresh_token.clone() else {
            return Err(TokenError::AuthorizationRequired(format!(
                "authorization for principal '{}' at {} expired without a refresh token",
                principal, key
            )));
        };

        tracing::debug!(key = %key, principal = %principal, "refreshing authorization");
        let params: Vec<(&str, &str)> = vec![
            ("grant_type", GrantType::RefreshToken.as_str()),
            ("refresh_token", refresh_token.as_str()),
        ];
        let response = match self.post_token_request(registration, params).await {
            Ok(response) => response,
            Err(TokenError::AuthenticationFailed(reason)) => {
                // The grant was revoked server-side; drop it so the next call
                // fails fast without another network round trip
                tracing::warn!(key = %key, principal = %principal, reason = %reason, "refresh rejected");
                self.authorizations.remove_authorization(&key, principal).await?;
                return Err(TokenError::AuthorizationRequired(format!(
                    "refresh rejected for principal '{}' at {}: {}",
                    principal, key, reason
                )));
            }
            Err(other) => return Err(other),
        };

        let now = Utc::now();
        let refreshed = UserAuthorization {
            key: key.clone(),
            principal: principal.to_string(),
            access_token: response.access_token.clone(),
            token_type: response.token_type.clone(),
            refresh_token: response.refresh_token.clone().or(Some(refresh_token)),
            scope: response.scope.clone().or(authorization.scope),
            issued_at: now,
            expires_at: expiry_timestamp(now, response.expires_in)?,
        };
        self.authorizations.put_authorization(&refreshed).await?;
        tracing::info!(key = %key, principal = %principal, expires_at = %refreshed.expires_at, "authorization refreshed");
        Ok(refreshed.to_authorized_client())
    }

    /// POST the token endpoint with client authentication per the
    /// registration's method. 4xx responses become authentication failures
    /// carrying the OAuth error body; 5xx and connectivity failures stay
    /// transient.
    async fn post_token_request(
        &self,
        registration: &ClientRegistration,
        mut params: Vec<(&str, &str)>,
    ) -> Result<TokenEndpointResponse> {
        let request = self.http_client.post(registration.token_endpoint.clone());
        let request = match registration.auth_method {
            ClientAuthMethod::ClientSecretBasic => {
                request.basic_auth(&registration.client_id, Some(&registration.client_secret))
            }
            ClientAuthMethod::ClientSecretPost => {
                params.push(("client_id", registration.client_id.as_str()));
                params.push(("client_secret", registration.client_secret.as_str()));
                request
            }
        };

        let response = request
            .form(&params)
            .send()
            .await
            .map_err(|e| TokenError::EndpointUnavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TokenEndpointResponse>()
                .await
                .map_err(|e| TokenError::MalformedResponse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            let summary = serde_json::from_str::<TokenEndpointErrorResponse>(&body)
                .map(|error| error.summary())
                .unwrap_or_else(|_| format!("status {}", status));
            Err(TokenError::AuthenticationFailed(summary))
        } else {
            Err(TokenError::EndpointUnavailable(format!("status {}", status)))
        }
    }
}
