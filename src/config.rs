//! Environment-based configuration types for the outbound client layer.

use anyhow::Result;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::client::FilterMode;
use crate::errors::ConfigError;
use crate::oauth::types::{ClientAuthMethod, GrantType};
use crate::routing::RoutingMode;

/// HTTP client timeout configuration
#[derive(Clone)]
pub struct HttpClientTimeout(Duration);

/// Safety margin subtracted from token lifetimes before lazy refresh
#[derive(Clone)]
pub struct TokenSafetyMargin(chrono::Duration);

/// Configured outbound client entries
#[derive(Debug, Clone)]
pub struct OutboundClients(Vec<OutboundClientConfig>);

/// Static service registry seed, keyed by logical service name
#[derive(Clone, Default)]
pub struct RegistrySeed(HashMap<String, Vec<Url>>);

/// One named outbound client entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundClientConfig {
    pub name: String,
    pub destination: String,
    pub grant_type: GrantType,
    pub token_endpoint: Url,
    pub base_url: Url,
    pub routing_mode: RoutingMode,
    pub filters: FilterMode,
    pub auth_method: ClientAuthMethod,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub user_agent: String,
    pub oauth_client_id: String,
    pub oauth_client_secret: String,
    pub outbound_clients: OutboundClients,
    pub service_registry: RegistrySeed,
    pub token_safety_margin: TokenSafetyMargin,
    pub http_client_timeout: HttpClientTimeout,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let default_user_agent = format!("courier/{}", version()?);
        let http_client_timeout: HttpClientTimeout =
            default_env("HTTP_CLIENT_TIMEOUT", "10s").try_into()?;
        let oauth_client_id = require_env("OAUTH_CLIENT_ID")?;
        let oauth_client_secret = require_env("OAUTH_CLIENT_SECRET")?;
        let outbound_clients: OutboundClients = require_env("OUTBOUND_CLIENTS")?.try_into()?;
        let service_registry: RegistrySeed = optional_env("SERVICE_REGISTRY").try_into()?;
        let token_safety_margin: TokenSafetyMargin =
            default_env("TOKEN_SAFETY_MARGIN", "60s").try_into()?;
        let user_agent = default_env("USER_AGENT", &default_user_agent);

        Ok(Self {
            version: version()?,
            user_agent,
            oauth_client_id,
            oauth_client_secret,
            outbound_clients,
            service_registry,
            token_safety_margin,
            http_client_timeout,
        })
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired(name.to_string()).into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self(Duration::from_secs(10)));
        }

        // Parse duration strings like "10s", "5m", etc.
        if value.ends_with('s') {
            let seconds = value
                .trim_end_matches('s')
                .parse::<u64>()
                .map_err(ConfigError::TimeoutParsingFailed)?;
            Ok(Self(Duration::from_secs(seconds)))
        } else if value.ends_with('m') {
            let minutes = value
                .trim_end_matches('m')
                .parse::<u64>()
                .map_err(ConfigError::TimeoutParsingFailed)?;
            Ok(Self(Duration::from_secs(minutes * 60)))
        } else {
            // Default to seconds if no suffix
            let seconds = value
                .parse::<u64>()
                .map_err(ConfigError::TimeoutParsingFailed)?;
            Ok(Self(Duration::from_secs(seconds)))
        }
    }
}

impl AsRef<Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<String> for TokenSafetyMargin {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))?;
        Ok(Self(chrono::Duration::from_std(duration)?))
    }
}

impl AsRef<chrono::Duration> for TokenSafetyMargin {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for OutboundClients {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let entries = value
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(parse_client_entry)
            .collect::<Result<Vec<OutboundClientConfig>, ConfigError>>()?;

        if entries.is_empty() {
            return Err(
                ConfigError::InvalidClientEntry("at least one entry is required".to_string())
                    .into(),
            );
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name.clone()) {
                return Err(ConfigError::DuplicateClientName(entry.name.clone()).into());
            }
        }

        Ok(Self(entries))
    }
}

impl AsRef<Vec<OutboundClientConfig>> for OutboundClients {
    fn as_ref(&self) -> &Vec<OutboundClientConfig> {
        &self.0
    }
}

/// Parse one `key=value,key=value` client entry
fn parse_client_entry(entry: &str) -> Result<OutboundClientConfig, ConfigError> {
    let mut fields: HashMap<&str, &str> = HashMap::new();
    for field in entry.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, value) = field.split_once('=').ok_or_else(|| {
            ConfigError::InvalidClientEntry(format!("expected key=value, got '{}'", field))
        })?;
        fields.insert(key.trim(), value.trim());
    }

    let required = |key: &str| -> Result<&str, ConfigError> {
        fields
            .get(key)
            .copied()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::InvalidClientEntry(format!("missing field '{}'", key)))
    };

    let name = required("name")?.to_string();
    let destination = required("destination")?.to_string();
    let grant_type = GrantType::try_from(required("grant_type")?)?;
    let token_endpoint = parse_url(required("token_endpoint")?)?;
    let base_url = parse_url(required("base_url")?)?;
    let routing_mode = match fields.get("routing_mode") {
        Some(value) => RoutingMode::try_from(*value)?,
        None => RoutingMode::Direct,
    };
    let filters = match fields.get("filters") {
        Some(value) => FilterMode::try_from(*value)?,
        None => FilterMode::Enabled,
    };
    let auth_method = match fields.get("auth_method") {
        Some(value) => ClientAuthMethod::try_from(*value)?,
        None => ClientAuthMethod::ClientSecretBasic,
    };
    let client_id = fields.get("client_id").map(|s| s.to_string());
    let client_secret = fields.get("client_secret").map(|s| s.to_string());
    let scope = fields.get("scope").map(|s| s.to_string());

    let known = [
        "name",
        "destination",
        "grant_type",
        "token_endpoint",
        "base_url",
        "routing_mode",
        "filters",
        "auth_method",
        "client_id",
        "client_secret",
        "scope",
    ];
    for key in fields.keys() {
        if !known.contains(key) {
            return Err(ConfigError::InvalidClientEntry(format!(
                "unknown field '{}'",
                key
            )));
        }
    }

    Ok(OutboundClientConfig {
        name,
        destination,
        grant_type,
        token_endpoint,
        base_url,
        routing_mode,
        filters,
        auth_method,
        client_id,
        client_secret,
        scope,
    })
}

fn parse_url(value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::UrlParsingFailed(value.to_string(), e))
}

impl TryFrom<Option<String>> for RegistrySeed {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let value = match value {
            None => return Ok(Self(HashMap::new())),
            Some(v) if v.is_empty() => return Ok(Self(HashMap::new())),
            Some(v) => v,
        };

        let mut services: HashMap<String, Vec<Url>> = HashMap::new();
        for entry in value.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (service, addresses) = entry.split_once('=').ok_or_else(|| {
                ConfigError::InvalidRegistryEntry(format!("expected service=url, got '{}'", entry))
            })?;
            let urls = addresses
                .split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(parse_url)
                .collect::<Result<Vec<Url>, ConfigError>>()?;
            if urls.is_empty() {
                return Err(ConfigError::InvalidRegistryEntry(format!(
                    "no addresses for service '{}'",
                    service
                ))
                .into());
            }
            services.insert(service.trim().to_string(), urls);
        }

        Ok(Self(services))
    }
}

impl TryFrom<String> for RegistrySeed {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(Some(value))
    }
}

impl AsRef<HashMap<String, Vec<Url>>> for RegistrySeed {
    fn as_ref(&self) -> &HashMap<String, Vec<Url>> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_clients_full_entry() {
        let value = "name=client_credentials,destination=param-service,\
                     grant_type=client_credentials,token_endpoint=https://idp.example/oauth2/token,\
                     base_url=http://param-service:8080,routing_mode=direct,filters=enabled,\
                     scope=templates.read";
        let clients = OutboundClients::try_from(value.to_string()).unwrap();
        let entries = clients.as_ref();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.name, "client_credentials");
        assert_eq!(entry.destination, "param-service");
        assert_eq!(entry.grant_type, GrantType::ClientCredentials);
        assert_eq!(
            entry.token_endpoint.as_str(),
            "https://idp.example/oauth2/token"
        );
        assert_eq!(entry.routing_mode, RoutingMode::Direct);
        assert_eq!(entry.filters, FilterMode::Enabled);
        assert_eq!(entry.scope.as_deref(), Some("templates.read"));
        assert!(entry.client_id.is_none());
    }

    #[test]
    fn test_outbound_clients_defaults() {
        let value = "name=a,destination=svc,grant_type=client_credentials,\
                     token_endpoint=https://idp.example/token,base_url=http://svc:8080";
        let clients = OutboundClients::try_from(value.to_string()).unwrap();
        let entry = &clients.as_ref()[0];
        assert_eq!(entry.routing_mode, RoutingMode::Direct);
        assert_eq!(entry.filters, FilterMode::Enabled);
        assert_eq!(entry.auth_method, ClientAuthMethod::ClientSecretBasic);
    }

    #[test]
    fn test_outbound_clients_multiple_entries() {
        let value = "name=a,destination=svc,grant_type=client_credentials,\
                     token_endpoint=https://idp.example/token,base_url=http://svc:8080;\
                     name=b,destination=svc,grant_type=client_credentials,\
                     token_endpoint=https://idp.example/token,base_url=http://svc:8080,\
                     routing_mode=load_balanced";
        let clients = OutboundClients::try_from(value.to_string()).unwrap();
        assert_eq!(clients.as_ref().len(), 2);
        assert_eq!(clients.as_ref()[1].routing_mode, RoutingMode::LoadBalanced);
    }

    #[test]
    fn test_outbound_clients_rejects_unknown_grant() {
        let value = "name=a,destination=svc,grant_type=implicit,\
                     token_endpoint=https://idp.example/token,base_url=http://svc:8080";
        let result = OutboundClients::try_from(value.to_string());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("grant type"));
    }

    #[test]
    fn test_outbound_clients_rejects_missing_field() {
        let value = "name=a,grant_type=client_credentials,\
                     token_endpoint=https://idp.example/token,base_url=http://svc:8080";
        let result = OutboundClients::try_from(value.to_string());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("destination"));
    }

    #[test]
    fn test_outbound_clients_rejects_duplicate_names() {
        let value = "name=a,destination=svc,grant_type=client_credentials,\
                     token_endpoint=https://idp.example/token,base_url=http://svc:8080;\
                     name=a,destination=other,grant_type=client_credentials,\
                     token_endpoint=https://idp.example/token,base_url=http://other:8080";
        let result = OutboundClients::try_from(value.to_string());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Duplicate"));
    }

    #[test]
    fn test_outbound_clients_rejects_unknown_field() {
        let value = "name=a,destination=svc,grant_type=client_credentials,\
                     token_endpoint=https://idp.example/token,base_url=http://svc:8080,\
                     retries=3";
        let result = OutboundClients::try_from(value.to_string());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unknown field"));
    }

    #[test]
    fn test_http_client_timeout_suffixes() {
        let seconds = HttpClientTimeout::try_from("30s".to_string()).unwrap();
        assert_eq!(*seconds.as_ref(), Duration::from_secs(30));

        let minutes = HttpClientTimeout::try_from("5m".to_string()).unwrap();
        assert_eq!(*minutes.as_ref(), Duration::from_secs(300));

        let bare = HttpClientTimeout::try_from("7".to_string()).unwrap();
        assert_eq!(*bare.as_ref(), Duration::from_secs(7));

        assert!(HttpClientTimeout::try_from("soon".to_string()).is_err());
    }

    #[test]
    fn test_token_safety_margin_parsing() {
        let margin = TokenSafetyMargin::try_from("60s".to_string()).unwrap();
        assert_eq!(*margin.as_ref(), chrono::Duration::seconds(60));

        assert!(TokenSafetyMargin::try_from("whenever".to_string()).is_err());
    }

    #[test]
    fn test_registry_seed_parsing() {
        let seed = RegistrySeed::try_from(Some(
            "param-service=http://10.0.0.1:8080|http://10.0.0.2:8080;audit=http://audit:9090"
                .to_string(),
        ))
        .unwrap();
        assert_eq!(seed.as_ref().len(), 2);
        assert_eq!(seed.as_ref()["param-service"].len(), 2);
        assert_eq!(seed.as_ref()["audit"][0].as_str(), "http://audit:9090/");

        let empty = RegistrySeed::try_from(None).unwrap();
        assert!(empty.as_ref().is_empty());
    }
}
