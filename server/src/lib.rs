//! SILTA server — per-server governance services
//!
//! Hosts the three core components of the metadata-governance runtime:
//!
//! ```text
//! requests ──► InstanceRegistry ──► ServiceInstance (per server, per service)
//!
//! inbound topic ──► EventPipeline ──► graph + outbound topic
//!
//! submit ──► DiscoveryOrchestrator ──► DiscoveryEngine ──► AnnotationStore
//! ```
//!
//! All durable state lives behind the [`silta_core::GraphStore`] port;
//! everything in this crate is process-local and rebuilt from
//! configuration at startup.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod discovery;
pub mod instance;
pub mod pipeline;

pub use discovery::{
    AnnotationStore, Authorizer, DiscoveryContext, DiscoveryEngine, DiscoveryOrchestrator,
    DiscoveryReport, DiscoveryRequestStatus, DiscoveryService, PermitAll, SchemaProfiler,
};
pub use instance::{InstanceRegistry, InstanceShutdown, ServiceInstance, TopicShutdown};
pub use pipeline::{
    ArtifactDeriver, ColumnViewDeriver, EventPipeline, LinkSpec, PipelineListener,
    PipelineOutcome, TableSourceDeriver,
};
