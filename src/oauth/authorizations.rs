//! Principal-bound authorization grants and their storage.
//!
//! The authorization_code flow never initiates interactive authorization from
//! this layer; it only consumes grants that were completed elsewhere and
//! stored here, refreshing them when a refresh token is available.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::errors::StorageError;
use crate::oauth::types::{AuthorizedClient, RegistrationKey};

pub type Result<T> = std::result::Result<T, StorageError>;

/// One principal's stored grant for a destination
#[derive(Debug, Clone)]
pub struct UserAuthorization {
    /// Registration this grant belongs to
    pub key: RegistrationKey,
    /// Principal the grant was issued for
    pub principal: String,
    /// The access token
    pub access_token: String,
    /// Token type as reported by the endpoint, normally "Bearer"
    pub token_type: String,
    /// Refresh token, when the authorization server issued one
    pub refresh_token: Option<String>,
    /// Granted scope
    pub scope: Option<String>,
    /// Exchange completion timestamp
    pub issued_at: DateTime<Utc>,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
}

impl UserAuthorization {
    /// A token counts as expired once it enters the safety margin before
    /// its actual expiration
    pub fn is_expired(&self, safety_margin: Duration) -> bool {
        self.expires_at <= Utc::now() + safety_margin
    }

    /// View the stored grant as a cacheable authorized client
    pub fn to_authorized_client(&self) -> AuthorizedClient {
        AuthorizedClient {
            key: self.key.clone(),
            access_token: self.access_token.clone(),
            token_type: self.token_type.clone(),
            scope: self.scope.clone(),
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        }
    }
}

/// Trait for storing and retrieving principal-bound authorizations
#[async_trait]
pub trait AuthorizationStore: Send + Sync {
    /// Retrieve the stored authorization for a principal, if any
    async fn get_authorization(
        &self,
        key: &RegistrationKey,
        principal: &str,
    ) -> Result<Option<UserAuthorization>>;

    /// Store or replace a principal's authorization
    async fn put_authorization(&self, authorization: &UserAuthorization) -> Result<()>;

    /// Remove a principal's authorization
    async fn remove_authorization(&self, key: &RegistrationKey, principal: &str) -> Result<()>;
}

/// In-memory implementation for authorization storage
#[derive(Default)]
pub struct MemoryAuthorizationStore {
    authorizations: tokio::sync::RwLock<HashMap<String, UserAuthorization>>,
}

impl MemoryAuthorizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a unique entry key from registration key and principal
    fn entry_key(key: &RegistrationKey, principal: &str) -> String {
        format!("{}:{}", key, principal)
    }
}

#[async_trait]
impl AuthorizationStore for MemoryAuthorizationStore {
    async fn get_authorization(
        &self,
        key: &RegistrationKey,
        principal: &str,
    ) -> Result<Option<UserAuthorization>> {
        let authorizations = self.authorizations.read().await;
        Ok(authorizations
            .get(&Self::entry_key(key, principal))
            .cloned())
    }

    async fn put_authorization(&self, authorization: &UserAuthorization) -> Result<()> {
        let mut authorizations = self.authorizations.write().await;
        authorizations.insert(
            Self::entry_key(&authorization.key, &authorization.principal),
            authorization.clone(),
        );
        Ok(())
    }

    async fn remove_authorization(&self, key: &RegistrationKey, principal: &str) -> Result<()> {
        let mut authorizations = self.authorizations.write().await;
        authorizations.remove(&Self::entry_key(key, principal));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::types::GrantType;

    fn authorization(principal: &str) -> UserAuthorization {
        let now = Utc::now();
        UserAuthorization {
            key: RegistrationKey::new("param-service", GrantType::AuthorizationCode),
            principal: principal.to_string(),
            access_token: "user-token".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            scope: None,
            issued_at: now,
            expires_at: now + Duration::seconds(3600),
        }
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryAuthorizationStore::new();
        let key = RegistrationKey::new("param-service", GrantType::AuthorizationCode);

        assert!(
            store
                .get_authorization(&key, "alice")
                .await
                .unwrap()
                .is_none()
        );

        store
            .put_authorization(&authorization("alice"))
            .await
            .unwrap();
        let stored = store
            .get_authorization(&key, "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_token, "user-token");
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));

        // Principals do not see each other's grants
        assert!(
            store
                .get_authorization(&key, "bob")
                .await
                .unwrap()
                .is_none()
        );

        store.remove_authorization(&key, "alice").await.unwrap();
        assert!(
            store
                .get_authorization(&key, "alice")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_put_replaces_existing_grant() {
        let store = MemoryAuthorizationStore::new();
        let key = RegistrationKey::new("param-service", GrantType::AuthorizationCode);

        store
            .put_authorization(&authorization("alice"))
            .await
            .unwrap();
        let mut updated = authorization("alice");
        updated.access_token = "rotated".to_string();
        store.put_authorization(&updated).await.unwrap();

        let stored = store
            .get_authorization(&key, "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_token, "rotated");
    }

    #[test]
    fn test_to_authorized_client_carries_expiry() {
        let grant = authorization("alice");
        let client = grant.to_authorized_client();
        assert_eq!(client.access_token, grant.access_token);
        assert_eq!(client.expires_at, grant.expires_at);
        assert_eq!(client.key, grant.key);
    }
}
