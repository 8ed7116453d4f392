//! OAuth 2.0 client-side token acquisition, caching, and stored authorizations.

pub mod authorizations;
pub mod provider;
pub mod types;

// Re-export frequently used items from each module
pub use authorizations::{AuthorizationStore, MemoryAuthorizationStore, UserAuthorization};
pub use provider::{DEFAULT_SAFETY_MARGIN_SECONDS, TokenProvider};
pub use types::{
    AuthorizedClient, ClientAuthMethod, ClientRegistration, GrantType, RegistrationKey,
    TokenEndpointErrorResponse, TokenEndpointResponse,
};
