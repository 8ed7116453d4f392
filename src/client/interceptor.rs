//! Outbound request interceptors.
//!
//! Interceptors run as an ordered chain around the terminal transport call.
//! The standard chain translates non-success upstream statuses into errors
//! and logs each exchange under a correlation id; a client configured with
//! filters disabled runs an empty chain and sees raw transport results.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::{ConfigError, TransportError};

pub type Result<T> = std::result::Result<T, TransportError>;

/// Correlation id header attached to every logged exchange
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Whether a client runs the standard interceptor chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterMode {
    /// Standard chain plus token acquisition
    Enabled,
    /// Empty chain, raw transport semantics, no token acquisition
    Disabled,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::Enabled => "enabled",
            FilterMode::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for FilterMode {
    type Error = ConfigError;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "enabled" => Ok(FilterMode::Enabled),
            "disabled" => Ok(FilterMode::Disabled),
            other => Err(ConfigError::UnknownFilterMode(other.to_string())),
        }
    }
}

/// Trait for decorating the outbound exchange
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(
        &self,
        request: reqwest::Request,
        next: Next<'_>,
    ) -> Result<reqwest::Response>;
}

/// Remainder of the chain after the current interceptor, ending with the
/// transport call
pub struct Next<'a> {
    client: &'a reqwest::Client,
    chain: &'a [Arc<dyn Interceptor>],
}

impl<'a> Next<'a> {
    pub fn new(client: &'a reqwest::Client, chain: &'a [Arc<dyn Interceptor>]) -> Self {
        Self { client, chain }
    }

    /// Run the rest of the chain
    pub fn run(
        self,
        request: reqwest::Request,
    ) -> Pin<Box<dyn Future<Output = Result<reqwest::Response>> + Send + 'a>> {
        Box::pin(async move {
            match self.chain.split_first() {
                Some((head, rest)) => {
                    head.intercept(request, Next::new(self.client, rest)).await
                }
                None => self
                    .client
                    .execute(request)
                    .await
                    .map_err(TransportError::classify),
            }
        })
    }
}

/// The standard chain for clients with filters enabled.
///
/// Status translation sits outermost so the logging interceptor observes the
/// raw upstream status before it is turned into an error.
pub fn standard_chain() -> Vec<Arc<dyn Interceptor>> {
    vec![Arc::new(StatusTranslation), Arc::new(RequestLogging)]
}

/// Logs each exchange and ensures a correlation id header is present
pub struct RequestLogging;

#[async_trait]
impl Interceptor for RequestLogging {
    async fn intercept(
        &self,
        mut request: reqwest::Request,
        next: Next<'_>,
    ) -> Result<reqwest::Response> {
        let correlation_id = match request.headers().get(CORRELATION_ID_HEADER) {
            Some(value) => value.to_str().unwrap_or("invalid").to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                if let Ok(value) = http::HeaderValue::from_str(&id) {
                    request.headers_mut().insert(CORRELATION_ID_HEADER, value);
                }
                id
            }
        };
        tracing::debug!(
            correlation_id = %correlation_id,
            method = %request.method(),
            url = %request.url(),
            "outbound request"
        );

        let started = std::time::Instant::now();
        let result = next.run(request).await;
        let elapsed_ms = started.elapsed().as_millis();
        match &result {
            Ok(response) => tracing::debug!(
                correlation_id = %correlation_id,
                status = %response.status(),
                elapsed_ms = %elapsed_ms,
                "outbound response"
            ),
            Err(error) => tracing::warn!(
                correlation_id = %correlation_id,
                error = %error,
                elapsed_ms = %elapsed_ms,
                "outbound request failed"
            ),
        }
        result
    }
}

/// Translates non-success upstream statuses into errors
pub struct StatusTranslation;

#[async_trait]
impl Interceptor for StatusTranslation {
    async fn intercept(
        &self,
        request: reqwest::Request,
        next: Next<'_>,
    ) -> Result<reqwest::Response> {
        let response = next.run(request).await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(TransportError::UpstreamStatus(status))
        }
    }
}
