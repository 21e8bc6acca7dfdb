//! Discovery services — pluggable analysis jobs
//!
//! A discovery service is one analysis capability: it receives the asset
//! reference and an [`AnnotationStore`] scoped to its request, runs to
//! completion, and records its findings as annotations. Services are
//! registered on a [`DiscoveryEngine`](super::DiscoveryEngine) by asset
//! type; new analysis kinds are added by registering another
//! implementation, not by subclassing anything.

use super::annotations::AnnotationStore;
use async_trait::async_trait;
use silta_core::{Annotation, Result};
use std::collections::HashMap;
use tracing::debug;

/// Everything a discovery job needs to know about its request
#[derive(Debug, Clone)]
pub struct DiscoveryContext {
    /// GUID of the accepted request
    pub request_guid: String,
    /// Asset under analysis (read-only reference)
    pub asset_guid: String,
    /// Declared type of the asset
    pub asset_type: String,
    /// Free-form parameters from the caller
    pub analysis_parameters: HashMap<String, String>,
    /// Annotation types the caller asked for; empty means all
    pub annotation_types: Vec<String>,
}

impl DiscoveryContext {
    /// True when the caller asked for the given annotation type (or asked
    /// for everything)
    pub fn wants(&self, annotation_type: &str) -> bool {
        self.annotation_types.is_empty()
            || self.annotation_types.iter().any(|t| t == annotation_type)
    }
}

/// One pluggable analysis job
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// Service name, for registration logging
    fn name(&self) -> &'static str;

    /// Run the analysis to completion
    ///
    /// Findings go into the store; a returned error marks the whole
    /// request `Failed` with this error's message recorded on the report.
    async fn run(&self, ctx: &DiscoveryContext, store: &AnnotationStore) -> Result<()>;
}

/// Built-in sample service: records one schema-analysis annotation per run
///
/// Exists so deployments and tests can wire a working engine without
/// writing a service first; real analysis jobs replace it.
pub struct SchemaProfiler;

/// Annotation type produced by [`SchemaProfiler`]
pub const SCHEMA_ANALYSIS: &str = "SchemaAnalysis";

#[async_trait]
impl DiscoveryService for SchemaProfiler {
    fn name(&self) -> &'static str {
        "schema-profiler"
    }

    async fn run(&self, ctx: &DiscoveryContext, store: &AnnotationStore) -> Result<()> {
        if !ctx.wants(SCHEMA_ANALYSIS) {
            debug!(request = %ctx.request_guid, "schema analysis not requested; nothing to do");
            return Ok(());
        }
        let mut annotation = Annotation::new(
            SCHEMA_ANALYSIS,
            format!("schema profile of asset {}", ctx.asset_guid),
        );
        annotation.confidence_level = 100;
        annotation.explanation = format!(
            "profiled '{}' asset {} on request {}",
            ctx.asset_type, ctx.asset_guid, ctx.request_guid
        );
        store.add_annotation_to_discovery_report(&annotation).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn ctx(annotation_types: &[&str]) -> DiscoveryContext {
        DiscoveryContext {
            request_guid: "req".to_string(),
            asset_guid: "asset".to_string(),
            asset_type: "Asset".to_string(),
            analysis_parameters: HashMap::new(),
            annotation_types: annotation_types.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_empty_annotation_types_means_all() {
        assert!(ctx(&[]).wants(SCHEMA_ANALYSIS));
        assert!(ctx(&[]).wants("Anything"));
    }

    #[test]
    fn test_explicit_annotation_types_filter() {
        let ctx = ctx(&["ClassificationAnalysis"]);
        assert!(!ctx.wants(SCHEMA_ANALYSIS));
        assert!(ctx.wants("ClassificationAnalysis"));
    }
}
