//! Client manager: validated construction and idempotent handle lookup.
//!
//! The manager is the composition root of the layer. It is built once at
//! startup from the configuration, registers every distinct destination and
//! grant with the token provider (entries sharing a key share one
//! registration), and hands out the same shared handle on every lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::client::handle::ClientHandle;
use crate::client::interceptor::{FilterMode, Interceptor, standard_chain};
use crate::config::Config;
use crate::errors::ConfigError;
use crate::oauth::TokenProvider;
use crate::oauth::types::ClientRegistration;
use crate::routing::ClientRouter;

/// Builds and hands out authenticated client handles by name
pub struct ClientManager {
    handles: HashMap<String, ClientHandle>,
}

impl ClientManager {
    /// Validate the configured entries and build one handle per entry.
    /// Conflicting registrations for the same destination and grant are
    /// rejected; identical ones are shared.
    pub fn new(
        config: &Config,
        tokens: Arc<TokenProvider>,
        router: Arc<ClientRouter>,
        http_client: reqwest::Client,
    ) -> Result<Self, ConfigError> {
        let mut handles = HashMap::new();
        for entry in config.outbound_clients.as_ref() {
            let registration = tokens.register(ClientRegistration {
                destination: entry.destination.clone(),
                grant_type: entry.grant_type.clone(),
                token_endpoint: entry.token_endpoint.clone(),
                client_id: entry
                    .client_id
                    .clone()
                    .unwrap_or_else(|| config.oauth_client_id.clone()),
                client_secret: entry
                    .client_secret
                    .clone()
                    .unwrap_or_else(|| config.oauth_client_secret.clone()),
                scope: entry.scope.clone(),
                auth_method: entry.auth_method.clone(),
            })?;

            let interceptors: Vec<Arc<dyn Interceptor>> = match entry.filters {
                FilterMode::Enabled => standard_chain(),
                FilterMode::Disabled => Vec::new(),
            };

            let handle = ClientHandle::new(
                entry.name.clone(),
                registration,
                entry.base_url.clone(),
                entry.routing_mode.clone(),
                entry.filters.clone(),
                interceptors,
                tokens.clone(),
                router.clone(),
                http_client.clone(),
            );
            if handles.insert(entry.name.clone(), handle).is_some() {
                return Err(ConfigError::DuplicateClientName(entry.name.clone()));
            }
        }

        tracing::info!(clients = handles.len(), "outbound clients configured");
        Ok(Self { handles })
    }

    /// Look up a handle by its configured name. Repeated calls return the
    /// same shared handle.
    pub fn get_client(&self, name: &str) -> Result<ClientHandle, ConfigError> {
        self.handles
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownClient(name.to_string()))
    }

    /// Configured client names, sorted for stable listings
    pub fn client_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.keys().cloned().collect();
        names.sort();
        names
    }
}
