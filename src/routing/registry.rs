//! Service discovery abstraction and its in-memory implementation.
//!
//! The registry only reports healthy instances; instance selection is the
//! router's concern.

use async_trait::async_trait;
use std::collections::HashMap;
use url::Url;

use crate::config::RegistrySeed;

/// One healthy instance of a logical service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    /// Instance identifier, unique within its service
    pub id: String,
    /// Base address of the instance
    pub address: Url,
}

impl ServiceInstance {
    pub fn new(id: impl Into<String>, address: Url) -> Self {
        Self {
            id: id.into(),
            address,
        }
    }
}

/// Trait for resolving logical service names to healthy instances
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Return the currently healthy instances of a service; empty when none
    async fn lookup(&self, service: &str) -> Vec<ServiceInstance>;
}

/// In-memory registry seeded from configuration and mutable at runtime
#[derive(Default)]
pub struct StaticServiceRegistry {
    services: tokio::sync::RwLock<HashMap<String, Vec<ServiceInstance>>>,
}

impl StaticServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the configured seed
    pub fn from_seed(seed: &RegistrySeed) -> Self {
        let services = seed
            .as_ref()
            .iter()
            .map(|(service, addresses)| {
                let instances = addresses
                    .iter()
                    .enumerate()
                    .map(|(index, address)| {
                        ServiceInstance::new(format!("{}-{}", service, index), address.clone())
                    })
                    .collect();
                (service.clone(), instances)
            })
            .collect();
        Self {
            services: tokio::sync::RwLock::new(services),
        }
    }

    /// Replace the instance set for a service
    pub async fn set_instances(&self, service: &str, instances: Vec<ServiceInstance>) {
        let mut services = self.services.write().await;
        services.insert(service.to_string(), instances);
    }

    /// Drop every instance of a service
    pub async fn clear(&self, service: &str) {
        let mut services = self.services.write().await;
        services.remove(service);
    }
}

#[async_trait]
impl ServiceRegistry for StaticServiceRegistry {
    async fn lookup(&self, service: &str) -> Vec<ServiceInstance> {
        let services = self.services.read().await;
        services.get(service).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: &str, address: &str) -> ServiceInstance {
        ServiceInstance::new(id, Url::parse(address).unwrap())
    }

    #[tokio::test]
    async fn test_lookup_unknown_service_is_empty() {
        let registry = StaticServiceRegistry::new();
        assert!(registry.lookup("param-service").await.is_empty());
    }

    #[tokio::test]
    async fn test_set_and_clear_instances() {
        let registry = StaticServiceRegistry::new();
        registry
            .set_instances(
                "param-service",
                vec![
                    instance("a", "http://10.0.0.1:8080"),
                    instance("b", "http://10.0.0.2:8080"),
                ],
            )
            .await;
        assert_eq!(registry.lookup("param-service").await.len(), 2);

        registry.clear("param-service").await;
        assert!(registry.lookup("param-service").await.is_empty());
    }

    #[tokio::test]
    async fn test_from_seed_assigns_instance_ids() {
        let seed = crate::config::RegistrySeed::try_from(Some(
            "param-service=http://10.0.0.1:8080|http://10.0.0.2:8080".to_string(),
        ))
        .unwrap();
        let registry = StaticServiceRegistry::from_seed(&seed);
        let instances = registry.lookup("param-service").await;
        assert_eq!(instances.len(), 2);
        assert!(instances.iter().any(|i| i.id == "param-service-0"));
        assert!(instances.iter().any(|i| i.id == "param-service-1"));
    }
}
