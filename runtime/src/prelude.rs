//! Convenience re-exports for server authors.
//!
//! ```rust
//! use silta_runtime::prelude::*;
//! ```

// Core types and ports
pub use silta_core::{
    Annotation, AnnotationStatus, ChangeEvent, Correlation, GovernanceError, GraphStore,
    InMemoryGraphStore, InMemoryTopic, Topic, TopicListener,
};

// Registry
pub use silta_server::{InstanceRegistry, InstanceShutdown, ServiceInstance, TopicShutdown};

// Pipeline
pub use silta_server::{
    ArtifactDeriver, ColumnViewDeriver, EventPipeline, LinkSpec, PipelineListener,
    PipelineOutcome, TableSourceDeriver,
};

// Discovery
pub use silta_server::{
    AnnotationStore, Authorizer, DiscoveryContext, DiscoveryEngine, DiscoveryOrchestrator,
    DiscoveryReport, DiscoveryRequestStatus, DiscoveryService, PermitAll, SchemaProfiler,
};

// Zero-copy payload
pub use bytes::Bytes;

// Runtime
pub use crate::{run, Config, GovernanceServer, LogFormat};
