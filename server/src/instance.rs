//! Per-server service instances and the registry that multiplexes them
//!
//! One server process hosts many logical governance services for many
//! tenants. Each `(server, service)` pair owns exactly one live
//! [`ServiceInstance`]; the [`InstanceRegistry`] resolves inbound requests
//! to the right instance without letting tenants see each other's state.
//!
//! The registry is pure process-local state: populated by bootstrap code
//! at startup, rebuilt from configuration on every process start, never
//! persisted.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use silta_core::{GovernanceError, GraphStore, Result, Topic};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

/// Teardown hook owned by a service instance
///
/// Topics, orchestrators and other components that hold resources register
/// one of these on the instance at wiring time. Hooks run when the
/// instance is removed; their errors are logged and swallowed — removal
/// must never hang or raise past its caller.
#[async_trait]
pub trait InstanceShutdown: Send + Sync {
    /// Hook name for teardown logging
    fn name(&self) -> &'static str;

    /// Release the component's resources
    async fn shutdown(&self) -> Result<()>;
}

/// One live governance service for one `(server, service)` pair
///
/// Owned exclusively by the [`InstanceRegistry`]; created on service
/// initialize, destroyed on service shutdown, never shared across server
/// names.
pub struct ServiceInstance {
    server_name: String,
    service_name: String,
    graph: Arc<dyn GraphStore>,
    supported_zones: Vec<String>,
    created_at: SystemTime,
    shutdown_hooks: Vec<Arc<dyn InstanceShutdown>>,
}

impl std::fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("server_name", &self.server_name)
            .field("service_name", &self.service_name)
            .field("supported_zones", &self.supported_zones)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl ServiceInstance {
    /// Create an instance with no zone restriction and no shutdown hooks
    pub fn new(
        server_name: impl Into<String>,
        service_name: impl Into<String>,
        graph: Arc<dyn GraphStore>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            service_name: service_name.into(),
            graph,
            supported_zones: Vec::new(),
            created_at: SystemTime::now(),
            shutdown_hooks: Vec::new(),
        }
    }

    /// Restrict the instance to assets tagged with the given zones
    ///
    /// An empty list means no restriction.
    pub fn with_zones(mut self, zones: Vec<String>) -> Self {
        self.supported_zones = zones;
        self
    }

    /// Register a component to tear down when the instance is removed
    ///
    /// Hooks run in registration order.
    pub fn with_shutdown_hook(mut self, hook: Arc<dyn InstanceShutdown>) -> Self {
        self.shutdown_hooks.push(hook);
        self
    }

    /// Server (tenant) name
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Service name
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The instance's graph store handle
    pub fn graph(&self) -> &Arc<dyn GraphStore> {
        &self.graph
    }

    /// Zones this instance may operate on; empty means unrestricted
    pub fn supported_zones(&self) -> &[String] {
        &self.supported_zones
    }

    /// When the instance was created
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Run every shutdown hook, logging failures
    async fn run_shutdown_hooks(&self) {
        for hook in &self.shutdown_hooks {
            if let Err(err) = hook.shutdown().await {
                warn!(
                    server = %self.server_name,
                    service = %self.service_name,
                    hook = hook.name(),
                    error = %err,
                    "instance shutdown hook failed"
                );
            }
        }
    }
}

/// Shutdown hook that stops a topic when its instance is removed
pub struct TopicShutdown {
    topic: Arc<dyn Topic>,
}

impl TopicShutdown {
    /// Wrap a topic for registration as an instance shutdown hook
    pub fn new(topic: Arc<dyn Topic>) -> Arc<Self> {
        Arc::new(Self { topic })
    }
}

#[async_trait]
impl InstanceShutdown for TopicShutdown {
    fn name(&self) -> &'static str {
        "topic"
    }

    async fn shutdown(&self) -> Result<()> {
        self.topic.stop().await
    }
}

/// Registry of live service instances, keyed by `(server, service)`
///
/// Backed by a sharded concurrent map so registration and resolution of
/// unrelated tenants never contend on one lock. Typically one registry per
/// server process, created by bootstrap and handed by reference to every
/// component that resolves tenants.
pub struct InstanceRegistry {
    instances: DashMap<(String, String), Arc<ServiceInstance>>,
}

impl InstanceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
        }
    }

    /// Store a new instance
    ///
    /// Fails with [`GovernanceError::DuplicateInstance`] when a live entry
    /// already exists for the pair; the existing entry is never touched.
    /// Check-and-insert is atomic, so concurrent registrations of the same
    /// pair cannot both succeed.
    pub fn register(&self, instance: Arc<ServiceInstance>) -> Result<()> {
        let key = (
            instance.server_name().to_string(),
            instance.service_name().to_string(),
        );
        match self.instances.entry(key) {
            Entry::Occupied(_) => Err(GovernanceError::DuplicateInstance {
                server: instance.server_name().to_string(),
                service: instance.service_name().to_string(),
            }),
            Entry::Vacant(slot) => {
                info!(
                    server = instance.server_name(),
                    service = instance.service_name(),
                    zones = ?instance.supported_zones(),
                    "registered service instance"
                );
                slot.insert(instance);
                Ok(())
            }
        }
    }

    /// Look up the live instance for a pair
    ///
    /// Fails with [`GovernanceError::InstanceNotFound`] when absent.
    pub fn resolve(&self, server_name: &str, service_name: &str) -> Result<Arc<ServiceInstance>> {
        self.instances
            .get(&(server_name.to_string(), service_name.to_string()))
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GovernanceError::InstanceNotFound {
                server: server_name.to_string(),
                service: service_name.to_string(),
            })
    }

    /// Remove an instance, running its shutdown hooks
    ///
    /// Idempotent: removing an absent pair does nothing. The entry is
    /// claimed atomically before hooks run, so a concurrent `resolve`
    /// never observes a half-shut instance and hooks run exactly once.
    /// Hook errors are logged, never propagated.
    pub async fn remove(&self, server_name: &str, service_name: &str) {
        let removed = self
            .instances
            .remove(&(server_name.to_string(), service_name.to_string()));
        match removed {
            Some((_, instance)) => {
                instance.run_shutdown_hooks().await;
                info!(
                    server = server_name,
                    service = service_name,
                    "removed service instance"
                );
            }
            None => {
                info!(
                    server = server_name,
                    service = service_name,
                    "remove of unregistered service instance ignored"
                );
            }
        }
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True when no instance is registered
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
