//! SILTA Runtime — zero-boilerplate server bootstrap
//!
//! Provides [`run()`] for wiring a complete governance server from
//! environment configuration, and [`GovernanceServer`] for callers that
//! need to swap ports or register their own derivers, engines and
//! authorizer before startup.
//!
//! # Quick start
//!
//! ```ignore
//! use silta_runtime::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     silta_runtime::run(|server| async move {
//!         let engine = DiscoveryEngine::new("profiling");
//!         engine.register_service("Asset", std::sync::Arc::new(SchemaProfiler));
//!         Ok(server.engine(std::sync::Arc::new(engine)))
//!     })
//!     .await
//! }
//! ```
//!
//! The bootstrap plays the admin collaborator's role: it creates the
//! instance registry, wires each component to its ports, registers the
//! instance, and removes it again on ctrl-c — which tears the topics and
//! the orchestrator down through the instance's shutdown hooks.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod config;
pub mod prelude;

pub use config::{Config, LogFormat};

use silta_core::{GraphStore, InMemoryGraphStore, InMemoryTopic, Topic};
use silta_server::{
    ArtifactDeriver, Authorizer, DiscoveryEngine, DiscoveryOrchestrator, EventPipeline,
    InstanceRegistry, PermitAll, PipelineListener, ServiceInstance, TopicShutdown,
};
use std::future::Future;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialise tracing for the process
///
/// Honours `RUST_LOG`, defaulting to `info`. Safe to call twice; the
/// second call is a no-op.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = match config.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
    };
    // Already-initialised is fine (tests, embedded use)
    let _ = result;
}

/// A governance server being wired up
///
/// Starts with in-memory ports and permissive authorization; every piece
/// can be swapped before [`GovernanceServer::start`].
pub struct GovernanceServer {
    config: Config,
    graph: Arc<dyn GraphStore>,
    authorizer: Arc<dyn Authorizer>,
    inbound: Arc<dyn Topic>,
    outbound: Arc<dyn Topic>,
    derivers: Vec<Arc<dyn ArtifactDeriver>>,
    engines: Vec<Arc<DiscoveryEngine>>,
}

impl GovernanceServer {
    /// Start wiring a server from the given configuration
    pub fn new(config: Config) -> Self {
        let inbound = Arc::new(InMemoryTopic::new(config.inbound_topic.clone()));
        let outbound = Arc::new(InMemoryTopic::new(config.outbound_topic.clone()));
        Self {
            config,
            graph: Arc::new(InMemoryGraphStore::new()),
            authorizer: Arc::new(PermitAll),
            inbound,
            outbound,
            derivers: Vec::new(),
            engines: Vec::new(),
        }
    }

    /// Swap the graph store port
    pub fn graph(mut self, graph: Arc<dyn GraphStore>) -> Self {
        self.graph = graph;
        self
    }

    /// Swap the authorization collaborator
    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Swap the inbound topic port
    pub fn inbound_topic(mut self, topic: Arc<dyn Topic>) -> Self {
        self.inbound = topic;
        self
    }

    /// Swap the outbound topic port
    pub fn outbound_topic(mut self, topic: Arc<dyn Topic>) -> Self {
        self.outbound = topic;
        self
    }

    /// Register a pipeline derivation unit
    ///
    /// When none is registered the standard table-source/derived-view
    /// pair is used.
    pub fn deriver(mut self, deriver: Arc<dyn ArtifactDeriver>) -> Self {
        self.derivers.push(deriver);
        self
    }

    /// Register a discovery engine
    pub fn engine(mut self, engine: Arc<DiscoveryEngine>) -> Self {
        self.engines.push(engine);
        self
    }

    /// Wire everything, register the instance, start the topics
    pub async fn start(self, registry: &InstanceRegistry) -> anyhow::Result<StartedServer> {
        let Self {
            config,
            graph,
            authorizer,
            inbound,
            outbound,
            derivers,
            engines,
        } = self;

        let mut builder = if derivers.is_empty() {
            EventPipeline::with_default_derivers(Arc::clone(&graph), Arc::clone(&outbound))
        } else {
            let mut b = EventPipeline::builder(Arc::clone(&graph), Arc::clone(&outbound));
            for deriver in derivers {
                b = b.deriver(deriver);
            }
            b
        };
        builder = builder.derive_workers(config.derive_workers);
        inbound.subscribe(PipelineListener::new(builder.build()));

        let orchestrator = Arc::new(
            DiscoveryOrchestrator::new(
                config.server_name.clone(),
                Arc::clone(&graph),
                Arc::clone(&authorizer),
            )
            .with_page_size(config.page_size),
        );
        for engine in engines {
            orchestrator.register_engine(engine)?;
        }

        let instance = Arc::new(
            ServiceInstance::new(
                config.server_name.clone(),
                config.service_name.clone(),
                Arc::clone(&graph),
            )
            .with_zones(config.supported_zones.clone())
            .with_shutdown_hook(TopicShutdown::new(Arc::clone(&inbound)))
            .with_shutdown_hook(TopicShutdown::new(Arc::clone(&outbound)))
            .with_shutdown_hook(Arc::clone(&orchestrator) as _),
        );
        registry.register(instance)?;

        inbound.start().await?;
        outbound.start().await?;
        info!(
            server = %config.server_name,
            service = %config.service_name,
            inbound = inbound.name(),
            outbound = outbound.name(),
            "governance server started"
        );

        Ok(StartedServer {
            server_name: config.server_name,
            service_name: config.service_name,
            orchestrator,
        })
    }
}

/// Handle to a started server
pub struct StartedServer {
    server_name: String,
    service_name: String,
    orchestrator: Arc<DiscoveryOrchestrator>,
}

impl StartedServer {
    /// Server (tenant) name the instance was registered under
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Service name the instance was registered under
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The server's discovery orchestrator
    pub fn orchestrator(&self) -> &Arc<DiscoveryOrchestrator> {
        &self.orchestrator
    }
}

/// Run a governance server with default settings
///
/// Loads configuration from environment variables, initialises tracing,
/// calls your closure to finish wiring, starts the server, then waits for
/// ctrl-c and removes the instance — best-effort teardown through its
/// shutdown hooks.
pub async fn run<F, Fut>(configure: F) -> anyhow::Result<()>
where
    F: FnOnce(GovernanceServer) -> Fut,
    Fut: Future<Output = anyhow::Result<GovernanceServer>>,
{
    let config = Config::from_env();
    init_tracing(&config);

    let registry = InstanceRegistry::new();
    let server = configure(GovernanceServer::new(config)).await?;
    let started = server.start(&registry).await?;

    signal::ctrl_c().await?;
    info!(
        server = started.server_name(),
        "shutdown signal received; removing service instance"
    );
    registry
        .remove(started.server_name(), started.service_name())
        .await;
    Ok(())
}
