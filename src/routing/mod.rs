//! Destination resolution: direct base URLs or registry-backed client-side
//! load balancing.

pub mod registry;

pub use registry::{ServiceInstance, ServiceRegistry, StaticServiceRegistry};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

use crate::errors::{ConfigError, RoutingError};

/// How a destination address is chosen for each request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingMode {
    /// Use the configured base URL verbatim
    Direct,
    /// Resolve the logical service name through the registry per request
    LoadBalanced,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::Direct => "direct",
            RoutingMode::LoadBalanced => "load_balanced",
        }
    }
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RoutingMode {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "direct" => Ok(RoutingMode::Direct),
            "load_balanced" => Ok(RoutingMode::LoadBalanced),
            other => Err(ConfigError::UnknownRoutingMode(other.to_string())),
        }
    }
}

/// Resolves a destination to a concrete base address, once per request
pub struct ClientRouter {
    registry: Arc<dyn ServiceRegistry>,
    cursors: Mutex<HashMap<String, usize>>,
}

impl ClientRouter {
    pub fn new(registry: Arc<dyn ServiceRegistry>) -> Self {
        Self {
            registry,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the base address for one request. Direct mode returns the
    /// configured base URL without consulting the registry; load-balanced
    /// mode picks one healthy instance round-robin.
    pub async fn resolve(
        &self,
        destination: &str,
        mode: &RoutingMode,
        base_url: &Url,
    ) -> Result<Url, RoutingError> {
        match mode {
            RoutingMode::Direct => Ok(base_url.clone()),
            RoutingMode::LoadBalanced => {
                let instances = self.registry.lookup(destination).await;
                if instances.is_empty() {
                    return Err(RoutingError::NoAvailableInstance(destination.to_string()));
                }
                let index = self.next_index(destination, instances.len());
                let instance = &instances[index];
                tracing::debug!(destination = %destination, instance = %instance.id, "resolved instance");
                Ok(instance.address.clone())
            }
        }
    }

    // Cursor survives instance-set changes; modulo keeps it in range
    fn next_index(&self, destination: &str, len: usize) -> usize {
        let mut cursors = self
            .cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let cursor = cursors.entry(destination.to_string()).or_insert(0);
        let index = *cursor % len;
        *cursor = cursor.wrapping_add(1);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("http://param-service:8080").unwrap()
    }

    fn instance(id: &str, address: &str) -> ServiceInstance {
        ServiceInstance::new(id, Url::parse(address).unwrap())
    }

    #[test]
    fn test_routing_mode_parsing() {
        assert_eq!(RoutingMode::try_from("direct").unwrap(), RoutingMode::Direct);
        assert_eq!(
            RoutingMode::try_from("load_balanced").unwrap(),
            RoutingMode::LoadBalanced
        );
        assert!(RoutingMode::try_from("sticky").is_err());
    }

    #[tokio::test]
    async fn test_direct_ignores_registry() {
        // Registry intentionally left empty
        let router = ClientRouter::new(Arc::new(StaticServiceRegistry::new()));
        let resolved = router
            .resolve("param-service", &RoutingMode::Direct, &base_url())
            .await
            .unwrap();
        assert_eq!(resolved, base_url());
    }

    #[tokio::test]
    async fn test_load_balanced_with_no_instances_fails() {
        let router = ClientRouter::new(Arc::new(StaticServiceRegistry::new()));
        let result = router
            .resolve("param-service", &RoutingMode::LoadBalanced, &base_url())
            .await;
        assert!(matches!(
            result,
            Err(RoutingError::NoAvailableInstance(ref service)) if service == "param-service"
        ));
    }

    #[tokio::test]
    async fn test_load_balanced_alternates_between_instances() {
        let registry = Arc::new(StaticServiceRegistry::new());
        registry
            .set_instances(
                "param-service",
                vec![
                    instance("a", "http://10.0.0.1:8080"),
                    instance("b", "http://10.0.0.2:8080"),
                ],
            )
            .await;
        let router = ClientRouter::new(registry);

        let mut resolved = Vec::new();
        for _ in 0..4 {
            let url = router
                .resolve("param-service", &RoutingMode::LoadBalanced, &base_url())
                .await
                .unwrap();
            resolved.push(url.to_string());
        }
        assert_eq!(resolved[0], resolved[2]);
        assert_eq!(resolved[1], resolved[3]);
        assert_ne!(resolved[0], resolved[1]);
    }

    #[tokio::test]
    async fn test_cursor_tolerates_shrinking_instance_set() {
        let registry = Arc::new(StaticServiceRegistry::new());
        registry
            .set_instances(
                "param-service",
                vec![
                    instance("a", "http://10.0.0.1:8080"),
                    instance("b", "http://10.0.0.2:8080"),
                ],
            )
            .await;
        let router = ClientRouter::new(registry.clone());

        for _ in 0..3 {
            router
                .resolve("param-service", &RoutingMode::LoadBalanced, &base_url())
                .await
                .unwrap();
        }

        registry
            .set_instances(
                "param-service",
                vec![instance("a", "http://10.0.0.1:8080")],
            )
            .await;
        let resolved = router
            .resolve("param-service", &RoutingMode::LoadBalanced, &base_url())
            .await
            .unwrap();
        assert_eq!(resolved.to_string(), "http://10.0.0.1:8080/");
    }
}
