//! Instance registry integration tests
//!
//! The registry multiplexes many tenants inside one process; these tests
//! drive it the way bootstrap and request-handling code do, including the
//! wiring where removing an instance tears its topics down.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use bytes::Bytes;
use silta_core::{GovernanceError, InMemoryGraphStore, InMemoryTopic, Topic};
use silta_server::{InstanceRegistry, ServiceInstance, TopicShutdown};
use std::sync::Arc;

fn instance(server: &str, service: &str) -> Arc<ServiceInstance> {
    Arc::new(ServiceInstance::new(
        server,
        service,
        Arc::new(InMemoryGraphStore::new()),
    ))
}

#[tokio::test]
async fn register_resolve_remove_lifecycle() {
    let registry = InstanceRegistry::new();
    let inst = Arc::new(
        ServiceInstance::new("cocoMDS1", "asset-catalog", Arc::new(InMemoryGraphStore::new()))
            .with_zones(vec!["quarantine".to_string(), "trash-can".to_string()]),
    );
    registry.register(inst.clone()).unwrap();

    let resolved = registry.resolve("cocoMDS1", "asset-catalog").unwrap();
    assert!(Arc::ptr_eq(&inst, &resolved));
    assert_eq!(resolved.supported_zones().len(), 2);

    registry.remove("cocoMDS1", "asset-catalog").await;
    let err = registry.resolve("cocoMDS1", "asset-catalog").unwrap_err();
    assert!(matches!(err, GovernanceError::InstanceNotFound { .. }));
}

#[tokio::test]
async fn removing_an_instance_stops_its_topics() {
    let registry = InstanceRegistry::new();
    let inbound = Arc::new(InMemoryTopic::new("inbound"));
    inbound.start().await.unwrap();

    let inst = Arc::new(
        ServiceInstance::new("cocoMDS1", "pipeline", Arc::new(InMemoryGraphStore::new()))
            .with_shutdown_hook(TopicShutdown::new(inbound.clone())),
    );
    registry.register(inst).unwrap();
    assert!(inbound.send(Bytes::from_static(b"{}")).await.is_ok());

    registry.remove("cocoMDS1", "pipeline").await;
    // The hook stopped the topic; further sends fail at the transport
    assert!(inbound.send(Bytes::from_static(b"{}")).await.is_err());
}

#[tokio::test]
async fn tenants_are_isolated_under_concurrent_churn() {
    let registry = Arc::new(InstanceRegistry::new());

    // A long-lived tenant that must stay resolvable throughout
    registry.register(instance("anchor-tenant", "discovery")).unwrap();

    let mut handles = Vec::new();
    for i in 0..32 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let server = format!("tenant-{i}");
            registry.register(instance(&server, "discovery")).unwrap();
            registry.resolve(&server, "discovery").unwrap();
            registry.remove(&server, "discovery").await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Churn on unrelated tenants never disturbed the anchor
    assert!(registry.resolve("anchor-tenant", "discovery").is_ok());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn duplicate_registration_reports_the_pair() {
    let registry = InstanceRegistry::new();
    registry.register(instance("cocoMDS1", "discovery")).unwrap();

    match registry.register(instance("cocoMDS1", "discovery")) {
        Err(GovernanceError::DuplicateInstance { server, service }) => {
            assert_eq!(server, "cocoMDS1");
            assert_eq!(service, "discovery");
        }
        other => panic!("expected DuplicateInstance, got {other:?}"),
    }

    // Same service under a different server is a different pair
    registry.register(instance("cocoMDS2", "discovery")).unwrap();
}
