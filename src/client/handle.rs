//! Client handles and the outbound request pipeline.
//!
//! Every request runs the same fixed sequence: resolve the destination,
//! acquire a token (skipped entirely for filter-disabled clients), build the
//! HTTP request with the bearer attached, then hand it to the interceptor
//! chain whose terminal step is the transport call. Errors are tagged by the
//! stage that produced them.

use std::sync::Arc;
use url::Url;

use crate::client::interceptor::{FilterMode, Interceptor, Next};
use crate::errors::{RequestError, RoutingError, TokenError, TransportError};
use crate::oauth::TokenProvider;
use crate::oauth::types::{AuthorizedClient, ClientRegistration, GrantType};
use crate::routing::{ClientRouter, RoutingMode};

/// A configured, shared handle for one outbound client entry.
///
/// Cloning is cheap; clones share the same state, so repeated manager
/// lookups hand out the same underlying client.
#[derive(Clone)]
pub struct ClientHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    name: String,
    registration: Arc<ClientRegistration>,
    base_url: Url,
    routing_mode: RoutingMode,
    filters: FilterMode,
    interceptors: Vec<Arc<dyn Interceptor>>,
    tokens: Arc<TokenProvider>,
    router: Arc<ClientRouter>,
    http_client: reqwest::Client,
}

impl ClientHandle {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        registration: Arc<ClientRegistration>,
        base_url: Url,
        routing_mode: RoutingMode,
        filters: FilterMode,
        interceptors: Vec<Arc<dyn Interceptor>>,
        tokens: Arc<TokenProvider>,
        router: Arc<ClientRouter>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                name,
                registration,
                base_url,
                routing_mode,
                filters,
                interceptors,
                tokens,
                router,
                http_client,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn destination(&self) -> &str {
        &self.inner.registration.destination
    }

    pub fn grant_type(&self) -> &GrantType {
        &self.inner.registration.grant_type
    }

    pub fn routing_mode(&self) -> &RoutingMode {
        &self.inner.routing_mode
    }

    pub fn filter_mode(&self) -> &FilterMode {
        &self.inner.filters
    }

    /// Whether two handles share the same underlying client state
    pub fn ptr_eq(&self, other: &ClientHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Acquire or reuse a token without sending a request
    pub async fn acquire_token(
        &self,
        principal: Option<&str>,
    ) -> std::result::Result<AuthorizedClient, TokenError> {
        self.inner
            .tokens
            .acquire(&self.inner.registration, principal)
            .await
    }

    /// Start a request against the destination; `path` is absolute
    pub fn request(&self, method: http::Method, path: impl Into<String>) -> OutboundRequest {
        OutboundRequest {
            handle: self.clone(),
            method,
            path: path.into(),
            headers: http::HeaderMap::new(),
            body: None,
            principal: None,
        }
    }

    pub fn get(&self, path: impl Into<String>) -> OutboundRequest {
        self.request(http::Method::GET, path)
    }

    pub fn post(&self, path: impl Into<String>) -> OutboundRequest {
        self.request(http::Method::POST, path)
    }
}

enum BodyState {
    Json(serde_json::Value),
    Invalid(String),
}

/// Builder for one outbound exchange through a handle
pub struct OutboundRequest {
    handle: ClientHandle,
    method: http::Method,
    path: String,
    headers: http::HeaderMap,
    body: Option<BodyState>,
    principal: Option<String>,
}

impl OutboundRequest {
    pub fn header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a JSON body; serialization failures surface at send time
    pub fn json<T: serde::Serialize>(mut self, json: &T) -> Self {
        self.body = Some(match serde_json::to_value(json) {
            Ok(value) => BodyState::Json(value),
            Err(e) => BodyState::Invalid(e.to_string()),
        });
        self
    }

    /// Bind the request to a principal; required for authorization_code
    /// clients, ignored by client_credentials ones
    pub fn on_behalf_of(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Run the pipeline: resolve, acquire token, attach bearer, interceptors,
    /// transport
    pub async fn send(self) -> std::result::Result<reqwest::Response, RequestError> {
        let inner = &self.handle.inner;

        // Routing errors surface before any token work
        let base = inner
            .router
            .resolve(
                &inner.registration.destination,
                &inner.routing_mode,
                &inner.base_url,
            )
            .await?;
        let target = base.join(&self.path).map_err(|e| {
            RoutingError::InvalidTarget(format!("{} + {}: {}", base, self.path, e))
        })?;

        // Filter-disabled clients never touch the token endpoint
        let token = match inner.filters {
            FilterMode::Enabled => Some(
                inner
                    .tokens
                    .acquire(&inner.registration, self.principal.as_deref())
                    .await?,
            ),
            FilterMode::Disabled => None,
        };

        let mut builder = inner
            .http_client
            .request(self.method, target)
            .headers(self.headers);
        if let Some(token) = &token {
            builder = builder.bearer_auth(&token.access_token);
        }
        if let Some(body) = self.body {
            match body {
                BodyState::Json(value) => builder = builder.json(&value),
                BodyState::Invalid(reason) => {
                    return Err(TransportError::Body(reason).into());
                }
            }
        }
        let request = builder.build().map_err(TransportError::classify)?;

        let response = Next::new(&inner.http_client, &inner.interceptors)
            .run(request)
            .await?;
        Ok(response)
    }
}
