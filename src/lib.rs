//! Courier outbound HTTP library crate.
//!
//! Builds authenticated clients for the services a notification pipeline
//! talks to: OAuth2 token acquisition and caching, destination routing,
//! and request interception for logging and error translation.

pub mod client;
pub mod config;
pub mod errors;
pub mod messages;
pub mod oauth;
pub mod param;
pub mod routing;
pub mod schema;
