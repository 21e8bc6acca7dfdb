//! Event pipeline — inbound change notifications to linked graph artifacts
//!
//! Consumes one inbound topic, produces zero-or-one outbound event per
//! inbound message:
//!
//! ```text
//! inbound topic ──► parse ──► derive (concurrent, join-all) ──► link ──► outbound topic
//! ```
//!
//! Every path through a message is terminal. The topic listener contract
//! has no error channel, so nothing here ever propagates to a caller: a
//! failure is logged with the offending payload and the message is
//! dropped. The transport is at-most-once and offers no replay, so there
//! is no retry either — availability over completeness.
//!
//! Concurrency model: each inbound message is processed independently on
//! its own task; messages share nothing mutable except the thread-safe
//! graph store. Within one message, the derivation tasks run concurrently
//! on a bounded worker pool and the pipeline joins on all of them — a
//! partial artifact set never reaches the link step.

mod derive;

pub use derive::{
    ArtifactDeriver, ColumnViewDeriver, TableSourceDeriver, ROLE_ASSET_SOURCE, ROLE_DERIVED_VIEW,
};

use async_trait::async_trait;
use bytes::Bytes;
use silta_core::{type_names, ChangeEvent, GraphStore, Properties, Topic, TopicListener};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Which two derived roles the link step joins
#[derive(Debug, Clone)]
pub struct LinkSpec {
    /// Relationship type to create between the joined artifacts
    pub relationship_type: String,
    /// Role providing end one of the relationship
    pub from_role: String,
    /// Role providing end two of the relationship
    pub to_role: String,
}

impl Default for LinkSpec {
    fn default() -> Self {
        Self {
            relationship_type: type_names::ASSET_SCHEMA_DERIVATION.to_string(),
            from_role: ROLE_ASSET_SOURCE.to_string(),
            to_role: ROLE_DERIVED_VIEW.to_string(),
        }
    }
}

/// Terminal state of one message's trip through the pipeline
///
/// Returned for observability and tests; the topic listener discards it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Artifacts derived, relationship created, event republished
    Published,
    /// All derivations succeeded but the link ends were not both present;
    /// nothing was linked and nothing was published
    NothingToLink,
    /// Payload did not decode; message dropped
    ParseFailed,
    /// A derivation task (or the link write) failed; no relationship, no
    /// publish
    DeriveFailed,
    /// Relationship created but the outbound send failed; not retried
    PublishFailed,
}

/// Builder for [`EventPipeline`]
pub struct PipelineBuilder {
    graph: Arc<dyn GraphStore>,
    outbound: Arc<dyn Topic>,
    derivers: Vec<Arc<dyn ArtifactDeriver>>,
    link: LinkSpec,
    derive_workers: usize,
}

impl PipelineBuilder {
    /// Register a derivation unit
    pub fn deriver(mut self, deriver: Arc<dyn ArtifactDeriver>) -> Self {
        self.derivers.push(deriver);
        self
    }

    /// Override which roles the link step joins
    pub fn link(mut self, link: LinkSpec) -> Self {
        self.link = link;
        self
    }

    /// Bound the derivation worker pool
    ///
    /// Default is 8 concurrent derivation tasks across all in-flight
    /// messages.
    pub fn derive_workers(mut self, workers: usize) -> Self {
        self.derive_workers = workers.max(1);
        self
    }

    /// Finish the pipeline
    pub fn build(self) -> Arc<EventPipeline> {
        Arc::new(EventPipeline {
            graph: self.graph,
            outbound: self.outbound,
            derivers: self.derivers,
            link: self.link,
            derive_permits: Arc::new(Semaphore::new(self.derive_workers)),
        })
    }
}

/// The topic-driven event pipeline
pub struct EventPipeline {
    graph: Arc<dyn GraphStore>,
    outbound: Arc<dyn Topic>,
    derivers: Vec<Arc<dyn ArtifactDeriver>>,
    link: LinkSpec,
    derive_permits: Arc<Semaphore>,
}

impl EventPipeline {
    /// Start building a pipeline over the given graph store and outbound
    /// topic
    pub fn builder(graph: Arc<dyn GraphStore>, outbound: Arc<dyn Topic>) -> PipelineBuilder {
        PipelineBuilder {
            graph,
            outbound,
            derivers: Vec::new(),
            link: LinkSpec::default(),
            derive_workers: 8,
        }
    }

    /// Builder preloaded with the standard table-source/derived-view pair
    pub fn with_default_derivers(
        graph: Arc<dyn GraphStore>,
        outbound: Arc<dyn Topic>,
    ) -> PipelineBuilder {
        Self::builder(graph, outbound)
            .deriver(Arc::new(TableSourceDeriver))
            .deriver(Arc::new(ColumnViewDeriver))
    }

    /// Process one inbound payload to its terminal state
    pub async fn process(&self, payload: Bytes) -> PipelineOutcome {
        // RECEIVED → PARSED
        let event = match ChangeEvent::from_bytes(&payload) {
            Ok(event) => event,
            Err(err) => {
                error!(
                    error = %err,
                    payload = %String::from_utf8_lossy(&payload),
                    "inbound event failed to decode; message dropped"
                );
                return PipelineOutcome::ParseFailed;
            }
        };

        // PARSED → DERIVING: every deriver runs concurrently; join on all
        // of them. A partial artifact set must never reach the link step.
        let shared = Arc::new(event);
        let mut tasks: JoinSet<silta_core::Result<(&'static str, Option<String>)>> =
            JoinSet::new();
        for deriver in &self.derivers {
            let deriver = Arc::clone(deriver);
            let event = Arc::clone(&shared);
            let graph = Arc::clone(&self.graph);
            let permits = Arc::clone(&self.derive_permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.map_err(|_| {
                    silta_core::GovernanceError::property_server("derivation worker pool closed")
                })?;
                let artifact = deriver.derive(&event, graph.as_ref()).await?;
                Ok((deriver.role(), artifact))
            });
        }

        let mut derived: HashMap<String, String> = HashMap::new();
        let mut failed = false;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((role, Some(id)))) => {
                    derived.insert(role.to_string(), id);
                }
                Ok(Ok((_, None))) => {}
                Ok(Err(err)) => {
                    failed = true;
                    error!(
                        error = %err,
                        source_system = %shared.source_system,
                        payload = %String::from_utf8_lossy(&payload),
                        "derivation task failed; message dropped"
                    );
                }
                Err(join_err) => {
                    failed = true;
                    error!(
                        error = %join_err,
                        source_system = %shared.source_system,
                        payload = %String::from_utf8_lossy(&payload),
                        "derivation task did not complete; message dropped"
                    );
                }
            }
        }
        if failed {
            return PipelineOutcome::DeriveFailed;
        }

        // DERIVING → LINKED: only when both ends of the link were derived
        let (Some(from), Some(to)) = (
            derived.get(&self.link.from_role),
            derived.get(&self.link.to_role),
        ) else {
            debug!(
                source_system = %shared.source_system,
                derived = derived.len(),
                "event produced no linkable artifact pair"
            );
            return PipelineOutcome::NothingToLink;
        };
        let relationship_id = match self
            .graph
            .create_relationship(&self.link.relationship_type, from, to, Properties::new())
            .await
        {
            Ok(id) => id,
            Err(err) => {
                error!(
                    error = %err,
                    source_system = %shared.source_system,
                    payload = %String::from_utf8_lossy(&payload),
                    "link step failed; message dropped"
                );
                return PipelineOutcome::DeriveFailed;
            }
        };

        // The single mutation of the event: correlation fields in, then
        // republish.
        let mut event = Arc::unwrap_or_clone(shared);
        event.correlation.entity_ids = derived;
        event.correlation.relationship_id = Some(relationship_id);

        // LINKED → PUBLISHED
        let outbound_payload = match event.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(error = %err, "outbound event failed to encode");
                return PipelineOutcome::PublishFailed;
            }
        };
        match self.outbound.send(outbound_payload).await {
            Ok(()) => {
                debug!(
                    source_system = %event.source_system,
                    relationship = ?event.correlation.relationship_id,
                    "event linked and republished"
                );
                PipelineOutcome::Published
            }
            Err(err) => {
                error!(
                    error = %err,
                    topic = self.outbound.name(),
                    "outbound publish failed; not retried"
                );
                PipelineOutcome::PublishFailed
            }
        }
    }
}

/// Topic listener that runs each inbound message through a pipeline
///
/// Spawns one detached task per message, so multiple messages are in
/// flight simultaneously and a slow message never blocks the listener.
pub struct PipelineListener {
    pipeline: Arc<EventPipeline>,
}

impl PipelineListener {
    /// Wrap a pipeline for subscription on an inbound topic
    pub fn new(pipeline: Arc<EventPipeline>) -> Arc<Self> {
        Arc::new(Self { pipeline })
    }
}

#[async_trait]
impl TopicListener for PipelineListener {
    async fn on_message(&self, payload: Bytes) {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            let outcome = pipeline.process(payload).await;
            debug!(?outcome, "pipeline message reached terminal state");
        });
    }
}
