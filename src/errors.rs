//! Standardized error types following the `error-courier-<domain>-<number>` format.

use thiserror::Error;

/// Configuration errors that occur during startup and client lookup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-courier-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when version information is not available
    #[error("error-courier-config-2 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when HTTP client timeout cannot be parsed
    #[error("error-courier-config-3 Failed to parse HTTP client timeout: {0}")]
    TimeoutParsingFailed(std::num::ParseIntError),

    /// Error when duration string cannot be parsed
    #[error("error-courier-config-4 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when a URL value cannot be parsed
    #[error("error-courier-config-5 Unable to parse URL '{0}': {1}")]
    UrlParsingFailed(String, url::ParseError),

    /// Error when an OUTBOUND_CLIENTS entry is malformed
    #[error("error-courier-config-6 Invalid outbound client entry: {0}")]
    InvalidClientEntry(String),

    /// Error when a grant type string is not recognized
    #[error(
        "error-courier-config-7 Unknown grant type '{0}': expected client_credentials/authorization_code"
    )]
    UnknownGrantType(String),

    /// Error when a routing mode string is not recognized
    #[error("error-courier-config-8 Unknown routing mode '{0}': expected direct/load_balanced")]
    UnknownRoutingMode(String),

    /// Error when a filter mode string is not recognized
    #[error("error-courier-config-9 Unknown filter mode '{0}': expected enabled/disabled")]
    UnknownFilterMode(String),

    /// Error when two client entries share a name
    #[error("error-courier-config-10 Duplicate outbound client name: {0}")]
    DuplicateClientName(String),

    /// Error when two entries register the same destination and grant with different parameters
    #[error("error-courier-config-11 Conflicting registration for {0}")]
    ConflictingRegistration(String),

    /// Error when a client name is not configured
    #[error("error-courier-config-12 Unknown outbound client: {0}")]
    UnknownClient(String),

    /// Error when a SERVICE_REGISTRY entry is malformed
    #[error("error-courier-config-13 Invalid service registry entry: {0}")]
    InvalidRegistryEntry(String),
}

/// Token acquisition errors
#[derive(Debug, Error)]
pub enum TokenError {
    /// Token endpoint rejected the exchange with a 4xx response
    #[error("error-courier-token-1 Token endpoint rejected the exchange: {0}")]
    AuthenticationFailed(String),

    /// No usable authorization is bound for the requesting principal
    #[error("error-courier-token-2 Authorization required: {0}")]
    AuthorizationRequired(String),

    /// Token endpoint unreachable or failing server-side
    #[error("error-courier-token-3 Token endpoint unavailable: {0}")]
    EndpointUnavailable(String),

    /// Token endpoint returned a body that could not be decoded
    #[error("error-courier-token-4 Malformed token response: {0}")]
    MalformedResponse(String),

    /// Authorization store failed while looking up or saving a grant
    #[error("error-courier-token-5 Authorization store failure: {0}")]
    StoreFailure(#[from] StorageError),
}

impl TokenError {
    /// Whether a retry by the caller could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, TokenError::EndpointUnavailable(_))
    }
}

/// Authorization storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when the backing store cannot be reached
    #[error("error-courier-storage-1 Storage unavailable: {0}")]
    Unavailable(String),

    /// Error when stored data cannot be decoded
    #[error("error-courier-storage-2 Invalid stored data: {0}")]
    InvalidData(String),
}

/// Destination resolution errors
#[derive(Debug, Error)]
pub enum RoutingError {
    /// No healthy instances are registered for the service
    #[error("error-courier-routing-1 No available instance for service: {0}")]
    NoAvailableInstance(String),

    /// Resolved base URL and request path do not combine into a valid target
    #[error("error-courier-routing-2 Invalid request target: {0}")]
    InvalidTarget(String),
}

/// Transport-layer errors from the terminal HTTP call
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connectivity failure reaching the destination
    #[error("error-courier-transport-1 Destination unreachable: {0}")]
    Transient(reqwest::Error),

    /// Non-connectivity transport failure
    #[error("error-courier-transport-2 Request failed: {0}")]
    Request(reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("error-courier-transport-3 Upstream returned {0}")]
    UpstreamStatus(http::StatusCode),

    /// Request body could not be serialized
    #[error("error-courier-transport-4 Request body could not be serialized: {0}")]
    Body(String),
}

impl TransportError {
    /// Sort a transport failure into the transient or terminal bucket
    pub fn classify(error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() {
            TransportError::Transient(error)
        } else {
            TransportError::Request(error)
        }
    }

    /// Whether a retry by the caller could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Transient(_) => true,
            TransportError::Request(_) => false,
            TransportError::UpstreamStatus(status) => status.is_server_error(),
            TransportError::Body(_) => false,
        }
    }
}

/// Outbound request errors, tagged by the pipeline stage that produced them
#[derive(Debug, Error)]
pub enum RequestError {
    /// Destination resolution failed before any network traffic
    #[error("error-courier-request-1 Routing failed: {0}")]
    Routing(#[from] RoutingError),

    /// Token acquisition failed before the destination was contacted
    #[error("error-courier-request-2 Authentication failed: {0}")]
    Authentication(#[from] TokenError),

    /// The destination call itself failed
    #[error("error-courier-request-3 Transport failed: {0}")]
    Transport(#[from] TransportError),
}

impl RequestError {
    /// Whether a retry by the caller could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RequestError::Routing(_) => false,
            RequestError::Authentication(error) => error.is_transient(),
            RequestError::Transport(error) => error.is_transient(),
        }
    }
}

/// Embedded GraphQL schema errors
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Error when no schema with the given name is embedded
    #[error("error-courier-schema-1 Schema not found: {0}")]
    NotFound(String),

    /// Error when an embedded schema is not valid UTF-8
    #[error("error-courier-schema-2 Schema is not valid UTF-8: {0}")]
    InvalidEncoding(String),
}

/// Template client errors
#[derive(Debug, Error)]
pub enum ParamError {
    /// Error when the GraphQL document could not be loaded
    #[error("error-courier-param-1 Schema loading failed: {0}")]
    Schema(#[from] SchemaError),

    /// Error from the outbound request pipeline
    #[error("error-courier-param-2 Request failed: {0}")]
    Request(#[from] RequestError),

    /// Error when the response body could not be decoded
    #[error("error-courier-param-3 Response decoding failed: {0}")]
    Decode(String),

    /// Error reported by the service inside the GraphQL envelope
    #[error("error-courier-param-4 GraphQL errors: {0}")]
    Graphql(String),
}

pub type Result<T> = std::result::Result<T, RequestError>;
