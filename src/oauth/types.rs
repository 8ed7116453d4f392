//! OAuth 2.0 client-side core types.
//!
//! Defines grant enums, client registrations, cached tokens, and the token endpoint wire format.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{ConfigError, TokenError};

/// OAuth 2.0 Grant Types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    ClientCredentials,
    RefreshToken,
}

impl GrantType {
    /// Wire value sent in token endpoint request forms
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for GrantType {
    type Error = ConfigError;

    // Only grants a client entry may be configured with; the refresh_token
    // grant is a wire detail of the authorization_code flow.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "client_credentials" => Ok(GrantType::ClientCredentials),
            "authorization_code" => Ok(GrantType::AuthorizationCode),
            other => Err(ConfigError::UnknownGrantType(other.to_string())),
        }
    }
}

/// OAuth 2.0 Client Authentication Methods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    ClientSecretBasic,
    ClientSecretPost,
}

impl TryFrom<&str> for ClientAuthMethod {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "client_secret_basic" => Ok(ClientAuthMethod::ClientSecretBasic),
            "client_secret_post" => Ok(ClientAuthMethod::ClientSecretPost),
            other => Err(ConfigError::InvalidClientEntry(format!(
                "unknown auth method '{}': expected client_secret_basic/client_secret_post",
                other
            ))),
        }
    }
}

/// Cache and registration key: one registration per destination and grant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationKey {
    pub destination: String,
    pub grant_type: GrantType,
}

impl RegistrationKey {
    pub fn new(destination: impl Into<String>, grant_type: GrantType) -> Self {
        Self {
            destination: destination.into(),
            grant_type,
        }
    }
}

impl std::fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.destination, self.grant_type)
    }
}

/// Credentials and endpoint for one destination and grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRegistration {
    /// Logical destination service name
    pub destination: String,
    /// Grant used to obtain tokens for this destination
    pub grant_type: GrantType,
    /// Token endpoint of the authorization server
    pub token_endpoint: Url,
    /// Client identifier
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Requested scope (optional)
    pub scope: Option<String>,
    /// How client credentials are presented to the token endpoint
    pub auth_method: ClientAuthMethod,
}

impl ClientRegistration {
    pub fn key(&self) -> RegistrationKey {
        RegistrationKey::new(self.destination.clone(), self.grant_type.clone())
    }
}

/// Cached product of a completed token exchange
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    /// Registration this token belongs to
    pub key: RegistrationKey,
    /// The access token
    pub access_token: String,
    /// Token type as reported by the endpoint, normally "Bearer"
    pub token_type: String,
    /// Granted scope
    pub scope: Option<String>,
    /// Exchange completion timestamp
    pub issued_at: DateTime<Utc>,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
}

impl AuthorizedClient {
    /// Build a cached entry from a successful token endpoint response.
    /// A lifetime that cannot be represented as a timestamp is a
    /// malformed response, not a panic.
    pub fn from_response(
        key: RegistrationKey,
        response: &TokenEndpointResponse,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, TokenError> {
        Ok(Self {
            key,
            access_token: response.access_token.clone(),
            token_type: response.token_type.clone(),
            scope: response.scope.clone(),
            issued_at,
            expires_at: expiry_timestamp(issued_at, response.expires_in)?,
        })
    }

    /// A token counts as expired once it enters the safety margin before
    /// its actual expiration
    pub fn is_expired(&self, safety_margin: Duration) -> bool {
        self.expires_at <= Utc::now() + safety_margin
    }
}

/// Expiration timestamp for a token lifetime reported by the endpoint.
/// `expires_in` values that overflow the representable range are rejected
/// instead of wrapping.
pub(crate) fn expiry_timestamp(
    issued_at: DateTime<Utc>,
    expires_in: u64,
) -> Result<DateTime<Utc>, TokenError> {
    i64::try_from(expires_in)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
        .ok_or_else(|| {
            TokenError::MalformedResponse(format!("expires_in {} out of range", expires_in))
        })
}

/// Token endpoint success payload (RFC 6749 section 5.1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEndpointResponse {
    /// Access token
    pub access_token: String,
    /// Token type
    pub token_type: String,
    /// Expires in seconds
    pub expires_in: u64,
    /// Refresh token (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Granted scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Token endpoint error payload (RFC 6749 section 5.2)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEndpointErrorResponse {
    /// Error code
    pub error: String,
    /// Error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// Error URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl TokenEndpointErrorResponse {
    /// Render as "error: description" for error messages
    pub fn summary(&self) -> String {
        match &self.error_description {
            Some(description) => format!("{}: {}", self.error, description),
            None => self.error.clone(),
        }
    }
}
