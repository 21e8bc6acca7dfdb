//! Discovery orchestration for SILTA
//!
//! A server registers one or more discovery engines; each engine maps
//! asset types to pluggable analysis jobs. Submitting a discovery request
//! validates it, persists a report, and runs the job asynchronously —
//! callers get the request GUID back immediately and poll the report.
//!
//! ```text
//! submit ──► validate ──► report (WAITING) ──► report (IN_PROGRESS) ──► return GUID
//!                                                    │
//!                                            spawned job task
//!                                                    │
//!                                  AnnotationStore findings, then
//!                                  report (COMPLETE | FAILED)
//! ```

pub mod annotations;
pub mod report;
mod service;

pub use annotations::{AnnotationStore, Authorizer, PermitAll, DEFAULT_PAGE_SIZE};
pub use report::{DiscoveryReport, DiscoveryRequestStatus};
pub use service::{DiscoveryContext, DiscoveryService, SchemaProfiler, SCHEMA_ANALYSIS};

use crate::instance::InstanceShutdown;
use async_trait::async_trait;
use dashmap::DashMap;
use report::now_unix_ns;
use silta_core::{type_names, GovernanceError, GraphStore, Properties, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// One discovery engine: a named set of analysis jobs keyed by asset type
///
/// Created at server startup, destroyed at shutdown; looked up by GUID
/// for every request, so the service map is a concurrent map shared
/// across request tasks.
pub struct DiscoveryEngine {
    guid: String,
    name: String,
    services: DashMap<String, Arc<dyn DiscoveryService>>,
}

impl std::fmt::Debug for DiscoveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryEngine")
            .field("guid", &self.guid)
            .field("name", &self.name)
            .field("service_count", &self.services.len())
            .finish()
    }
}

impl DiscoveryEngine {
    /// Create an engine with a fresh GUID and no services
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            guid: ulid::Ulid::new().to_string(),
            name: name.into(),
            services: DashMap::new(),
        }
    }

    /// Engine GUID
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// Engine display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Map an asset type to an analysis job
    ///
    /// Re-registering an asset type replaces the previous job.
    pub fn register_service(&self, asset_type: impl Into<String>, service: Arc<dyn DiscoveryService>) {
        let asset_type = asset_type.into();
        info!(
            engine = %self.name,
            asset_type = %asset_type,
            service = service.name(),
            "registered discovery service"
        );
        self.services.insert(asset_type, service);
    }

    /// The job registered for an asset type
    pub fn service_for(&self, asset_type: &str) -> Option<Arc<dyn DiscoveryService>> {
        self.services.get(asset_type).map(|e| Arc::clone(e.value()))
    }

    /// Number of registered services
    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}

/// Per-server owner of discovery engines and their requests
pub struct DiscoveryOrchestrator {
    server_name: String,
    graph: Arc<dyn GraphStore>,
    authorizer: Arc<dyn Authorizer>,
    engines: DashMap<String, Arc<DiscoveryEngine>>,
    accepting: AtomicBool,
    page_size: usize,
}

impl DiscoveryOrchestrator {
    /// Create an orchestrator for one server
    pub fn new(
        server_name: impl Into<String>,
        graph: Arc<dyn GraphStore>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            graph,
            authorizer,
            engines: DashMap::new(),
            accepting: AtomicBool::new(true),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the default page size handed to job annotation stores
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Register an engine on this server
    ///
    /// Registering the same GUID again replaces the engine (bootstrap
    /// convenience) and is never observable as a partial state.
    pub fn register_engine(&self, engine: Arc<DiscoveryEngine>) -> Result<()> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(GovernanceError::invalid_parameter(
                "discovery orchestrator is shut down",
            ));
        }
        let guid = engine.guid().to_string();
        if self.engines.insert(guid.clone(), engine).is_some() {
            warn!(server = %self.server_name, engine = %guid, "replaced discovery engine");
        } else {
            info!(server = %self.server_name, engine = %guid, "registered discovery engine");
        }
        Ok(())
    }

    /// Resolve an engine by GUID
    ///
    /// Fails with `UnknownDiscoveryEngine` when the GUID is not registered
    /// on this server — or for every call after `shutdown`.
    pub fn get_engine(&self, engine_guid: &str) -> Result<Arc<DiscoveryEngine>> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(GovernanceError::UnknownDiscoveryEngine {
                engine: engine_guid.to_string(),
            });
        }
        self.engines
            .get(engine_guid)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| GovernanceError::UnknownDiscoveryEngine {
                engine: engine_guid.to_string(),
            })
    }

    /// Accept a discovery request and run it asynchronously
    ///
    /// Validates the engine, the asset and the asset-type mapping, then
    /// persists the report (`Waiting` → `InProgress`) and returns the
    /// request GUID while the job runs on its own task. Callers poll
    /// [`DiscoveryOrchestrator::get_report`] for progress.
    pub async fn submit_discovery_request(
        &self,
        user_id: &str,
        engine_guid: &str,
        asset_guid: &str,
        asset_type: &str,
        analysis_parameters: HashMap<String, String>,
        annotation_types: Vec<String>,
    ) -> Result<String> {
        let engine = self.get_engine(engine_guid)?;
        if asset_guid.is_empty() {
            return Err(GovernanceError::invalid_parameter("asset GUID is empty"));
        }
        if self.graph.get_entity(asset_guid).await?.is_none() {
            return Err(GovernanceError::invalid_parameter(format!(
                "asset '{asset_guid}' does not exist"
            )));
        }
        let service = engine.service_for(asset_type).ok_or_else(|| {
            GovernanceError::invalid_parameter(format!(
                "engine '{}' has no discovery service for asset type '{asset_type}'",
                engine.name()
            ))
        })?;

        // Persist the acceptance before the job exists anywhere.
        let mut accepted = DiscoveryReport::accepted(asset_guid, engine_guid);
        let request_guid = self
            .graph
            .create_entity(type_names::DISCOVERY_REPORT, accepted.to_properties())
            .await?;
        accepted.request_guid = request_guid.clone();
        self.graph
            .create_relationship(
                type_names::ASSET_DISCOVERY_REPORT,
                asset_guid,
                &request_guid,
                Properties::new(),
            )
            .await?;
        accepted.status = DiscoveryRequestStatus::InProgress;
        self.graph
            .update_entity(&request_guid, accepted.to_properties())
            .await?;

        let ctx = DiscoveryContext {
            request_guid: request_guid.clone(),
            asset_guid: asset_guid.to_string(),
            asset_type: asset_type.to_string(),
            analysis_parameters,
            annotation_types,
        };
        let store = AnnotationStore::new(
            user_id,
            asset_guid,
            request_guid.clone(),
            Arc::clone(&self.graph),
            Arc::clone(&self.authorizer),
        )
        .with_default_page_size(self.page_size);
        info!(
            server = %self.server_name,
            engine = %engine_guid,
            asset = %asset_guid,
            request = %request_guid,
            service = service.name(),
            "discovery request accepted"
        );
        let graph = Arc::clone(&self.graph);
        let server_name = self.server_name.clone();
        tokio::spawn(async move {
            let outcome = service.run(&ctx, &store).await;
            finish_report(graph, &server_name, accepted, outcome).await;
        });

        Ok(request_guid)
    }

    /// Fetch the report for a request
    ///
    /// Reads through to the graph every time; `InvalidParameter` for an
    /// unknown GUID.
    pub async fn get_report(&self, request_guid: &str) -> Result<DiscoveryReport> {
        if request_guid.is_empty() {
            return Err(GovernanceError::invalid_parameter("request GUID is empty"));
        }
        let entity = self
            .graph
            .get_entity(request_guid)
            .await?
            .ok_or_else(|| {
                GovernanceError::invalid_parameter(format!(
                    "discovery request '{request_guid}' does not exist"
                ))
            })?;
        if entity.type_name != type_names::DISCOVERY_REPORT {
            return Err(GovernanceError::invalid_parameter(format!(
                "'{request_guid}' is not a discovery request"
            )));
        }
        Ok(DiscoveryReport::from_entity(&entity))
    }

    /// Terminate every registered engine
    ///
    /// The accepting gate flips first, so new `get_engine`/`submit` calls
    /// fail before any engine is torn down — a partially-terminated
    /// orchestrator is never observable. Idempotent. In-flight jobs run
    /// to completion; this core provides no cancellation.
    pub fn shutdown(&self) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            let count = self.engines.len();
            for entry in self.engines.iter() {
                info!(
                    server = %self.server_name,
                    engine = %entry.key(),
                    name = entry.value().name(),
                    "terminating discovery engine"
                );
            }
            self.engines.clear();
            info!(server = %self.server_name, engines = count, "discovery orchestrator shut down");
        }
    }
}

/// Record a job's terminal status on its report entity
async fn finish_report(
    graph: Arc<dyn GraphStore>,
    server_name: &str,
    mut report: DiscoveryReport,
    outcome: Result<()>,
) {
    report.completed_unix_ns = Some(now_unix_ns());
    match outcome {
        Ok(()) => {
            report.status = DiscoveryRequestStatus::Complete;
        }
        Err(err) => {
            error!(
                server = %server_name,
                request = %report.request_guid,
                error = %err,
                "discovery job failed"
            );
            report.status = DiscoveryRequestStatus::Failed;
            report.failure_message = Some(err.to_string());
        }
    }
    let request_guid = report.request_guid.clone();
    if let Err(err) = graph
        .update_entity(&request_guid, report.to_properties())
        .await
    {
        error!(
            request = %request_guid,
            error = %err,
            "failed to record discovery job completion"
        );
    }
}

#[async_trait]
impl InstanceShutdown for DiscoveryOrchestrator {
    fn name(&self) -> &'static str {
        "discovery-orchestrator"
    }

    async fn shutdown(&self) -> Result<()> {
        DiscoveryOrchestrator::shutdown(self);
        Ok(())
    }
}
