//! Artifact derivers — pluggable derivation units for the event pipeline
//!
//! Each deriver computes one named sub-artifact from an inbound change
//! event: resolving or creating a graph entity and returning its GUID.
//! The pipeline runs every registered deriver concurrently and joins on
//! all of them; derivers therefore share nothing mutable and talk only to
//! the thread-safe graph store.
//!
//! New artifact kinds are added by registering another deriver with the
//! pipeline builder, not by subclassing anything.

use async_trait::async_trait;
use silta_core::event::{SECTION_COLUMNS, SECTION_TABLE_SOURCE};
use silta_core::{type_names, ChangeEvent, GovernanceError, GraphStore, Properties, Result};
use tracing::debug;

/// Derivation unit producing one named sub-artifact per event
#[async_trait]
pub trait ArtifactDeriver: Send + Sync {
    /// Role of the artifact this deriver produces
    ///
    /// Doubles as the correlation key the pipeline writes the resulting
    /// GUID under, and as the role the link step joins on.
    fn role(&self) -> &'static str;

    /// Resolve or create this deriver's artifact for one event
    ///
    /// Returns the graph GUID of the artifact, or `None` when the event
    /// carries nothing for this deriver (not an error — the event simply
    /// has no matching section). Any returned error aborts the whole
    /// message: the pipeline's link step is all-or-nothing.
    async fn derive(&self, event: &ChangeEvent, graph: &dyn GraphStore) -> Result<Option<String>>;
}

/// Resolves or creates the asset entity named by the `table_source` section
///
/// Keyed by qualified name: two events describing the same table resolve
/// to the same Asset entity, so repeated notifications stay idempotent at
/// the graph level.
pub struct TableSourceDeriver;

/// Role under which [`TableSourceDeriver`] reports its GUID
pub const ROLE_ASSET_SOURCE: &str = "asset_source";

#[async_trait]
impl ArtifactDeriver for TableSourceDeriver {
    fn role(&self) -> &'static str {
        ROLE_ASSET_SOURCE
    }

    async fn derive(&self, event: &ChangeEvent, graph: &dyn GraphStore) -> Result<Option<String>> {
        let Some(section) = event.section(SECTION_TABLE_SOURCE) else {
            return Ok(None);
        };
        let qualified_name = section
            .get("qualified_name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                GovernanceError::invalid_parameter(
                    "table_source section is missing 'qualified_name'",
                )
            })?;

        if let Some(existing) = graph
            .find_entity(type_names::ASSET, "qualifiedName", qualified_name)
            .await?
        {
            debug!(qualified_name, id = %existing.id, "resolved existing asset");
            return Ok(Some(existing.id));
        }

        let mut props = Properties::new();
        props.insert("qualifiedName".to_string(), qualified_name.into());
        props.insert("sourceSystem".to_string(), event.source_system.clone().into());
        if let Some(display_name) = section.get("display_name").and_then(|v| v.as_str()) {
            props.insert("displayName".to_string(), display_name.into());
        }
        let id = graph.create_entity(type_names::ASSET, props).await?;
        debug!(qualified_name, id = %id, "created asset for table source");
        Ok(Some(id))
    }
}

/// Creates a schema-view entity from the `columns` section
///
/// Unlike the asset side there is nothing to resolve: each processed event
/// gets its own derived view entity capturing the column set it announced.
pub struct ColumnViewDeriver;

/// Role under which [`ColumnViewDeriver`] reports its GUID
pub const ROLE_DERIVED_VIEW: &str = "derived_view";

#[async_trait]
impl ArtifactDeriver for ColumnViewDeriver {
    fn role(&self) -> &'static str {
        ROLE_DERIVED_VIEW
    }

    async fn derive(&self, event: &ChangeEvent, graph: &dyn GraphStore) -> Result<Option<String>> {
        let Some(section) = event.section(SECTION_COLUMNS) else {
            return Ok(None);
        };
        let names = section
            .get("names")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                GovernanceError::invalid_parameter("columns section is missing 'names' array")
            })?;

        let mut props = Properties::new();
        props.insert("columns".to_string(), serde_json::Value::Array(names.clone()));
        props.insert("columnCount".to_string(), names.len().into());
        props.insert("sourceSystem".to_string(), event.source_system.clone().into());
        let id = graph.create_entity(type_names::SCHEMA_VIEW, props).await?;
        debug!(id = %id, columns = names.len(), "created derived schema view");
        Ok(Some(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use silta_core::InMemoryGraphStore;

    fn event(json: &str) -> ChangeEvent {
        ChangeEvent::from_bytes(json.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_table_source_creates_then_resolves() {
        let graph = InMemoryGraphStore::new();
        let ev = event(
            r#"{"source_system":"warehouse","event_type":"table.created",
                "sections":{"table_source":{"qualified_name":"db.sales.orders"}}}"#,
        );

        let first = TableSourceDeriver.derive(&ev, &graph).await.unwrap().unwrap();
        let second = TableSourceDeriver.derive(&ev, &graph).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(graph.entity_count(), 1);
    }

    #[tokio::test]
    async fn test_table_source_absent_section_is_none() {
        let graph = InMemoryGraphStore::new();
        let ev = event(r#"{"source_system":"warehouse","event_type":"table.created"}"#);
        assert!(TableSourceDeriver.derive(&ev, &graph).await.unwrap().is_none());
        assert_eq!(graph.entity_count(), 0);
    }

    #[tokio::test]
    async fn test_table_source_without_qualified_name_errors() {
        let graph = InMemoryGraphStore::new();
        let ev = event(
            r#"{"source_system":"warehouse","event_type":"table.created",
                "sections":{"table_source":{"display_name":"Orders"}}}"#,
        );
        let err = TableSourceDeriver.derive(&ev, &graph).await.unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_column_view_creates_fresh_entity_each_run() {
        let graph = InMemoryGraphStore::new();
        let ev = event(
            r#"{"source_system":"warehouse","event_type":"table.created",
                "sections":{"columns":{"names":["id","total"]}}}"#,
        );

        let first = ColumnViewDeriver.derive(&ev, &graph).await.unwrap().unwrap();
        let second = ColumnViewDeriver.derive(&ev, &graph).await.unwrap().unwrap();

        assert_ne!(first, second);
        assert_eq!(graph.entity_count(), 2);
    }
}
