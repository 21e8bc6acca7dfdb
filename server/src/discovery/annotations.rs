//! Annotation store — versioned, hierarchical, paged discovery findings
//!
//! One store is scoped to one `(user, asset, discovery report)` triple:
//! every discovery job gets a store for its own request, and review
//! tooling gets one for the report it is inspecting. All durable state
//! lives in the graph; the store is a stateless view over it, so
//! concurrent writers to the same report can never diverge — the graph
//! allocates every GUID and arbitrates every read.
//!
//! # Graph shape
//!
//! ```text
//! Asset ──AssetDiscoveryReport──► DiscoveryReport ──ReportedAnnotation──► Annotation
//!                                                                           │
//!                                                     AttachedAnnotation ───┤ (children)
//!                                                     LinkedAnnotation  ────┘ (cross-links)
//! ```
//!
//! # Error surface
//!
//! Exactly three kinds leave this module: `InvalidParameter` for a null or
//! unresolvable identifier, `UserNotAuthorized` from the authorization
//! collaborator, and `PropertyServer` for any underlying store failure.

use super::report::{DiscoveryReport, DiscoveryRequestStatus};
use async_trait::async_trait;
use silta_core::{
    type_names, Annotation, AnnotationStatus, Entity, GovernanceError, GraphStore, Result,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Page size used when a caller passes `maximum_results == 0`
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// External authorization collaborator
///
/// The store never decides rights itself; it delegates every operation to
/// this seam and maps denial to `UserNotAuthorized`.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Allow or deny one action for one user
    async fn authorize(&self, user: &str, action: &str) -> Result<()>;
}

/// Authorizer that allows everything
///
/// The default for deployments that enforce access outside this runtime.
pub struct PermitAll;

#[async_trait]
impl Authorizer for PermitAll {
    async fn authorize(&self, _user: &str, _action: &str) -> Result<()> {
        Ok(())
    }
}

/// Store of discovery findings for one `(user, asset, report)` triple
pub struct AnnotationStore {
    user_id: String,
    asset_guid: String,
    report_guid: String,
    graph: Arc<dyn GraphStore>,
    authorizer: Arc<dyn Authorizer>,
    default_page_size: usize,
}

impl AnnotationStore {
    /// Create a store scoped to the given triple
    pub fn new(
        user_id: impl Into<String>,
        asset_guid: impl Into<String>,
        report_guid: impl Into<String>,
        graph: Arc<dyn GraphStore>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            asset_guid: asset_guid.into(),
            report_guid: report_guid.into(),
            graph,
            authorizer,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the page size used for `maximum_results == 0`
    pub fn with_default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size.max(1);
        self
    }

    /// GUID of the report this store belongs to
    pub fn report_guid(&self) -> &str {
        &self.report_guid
    }

    /// GUID of the asset this store belongs to
    pub fn asset_guid(&self) -> &str {
        &self.asset_guid
    }

    fn page<T>(&self, items: Vec<T>, starting_from: usize, maximum_results: usize) -> Vec<T> {
        let max = if maximum_results == 0 {
            self.default_page_size
        } else {
            maximum_results
        };
        items.into_iter().skip(starting_from).take(max).collect()
    }

    async fn resolve_annotation(&self, guid: &str) -> Result<Entity> {
        if guid.is_empty() {
            return Err(GovernanceError::invalid_parameter(
                "annotation GUID is empty",
            ));
        }
        let entity = self
            .graph
            .get_entity(guid)
            .await?
            .ok_or_else(|| {
                GovernanceError::invalid_parameter(format!("annotation '{guid}' does not exist"))
            })?;
        if entity.type_name != type_names::ANNOTATION {
            return Err(GovernanceError::invalid_parameter(format!(
                "'{guid}' is a {} entity, not an annotation",
                entity.type_name
            )));
        }
        Ok(entity)
    }

    /// Top-level annotations of one report, in creation order
    async fn annotations_of_report(&self, report_guid: &str) -> Result<Vec<Annotation>> {
        let rels = self
            .graph
            .get_relationships(report_guid, type_names::REPORTED_ANNOTATION)
            .await?;
        let mut annotations = Vec::with_capacity(rels.len());
        for rel in rels.iter().filter(|r| r.from == report_guid) {
            match self.graph.get_entity(&rel.to).await? {
                Some(entity) => annotations.push(Annotation::from_entity(&entity)?),
                None => warn!(
                    annotation = %rel.to,
                    report = %report_guid,
                    "reported annotation entity is missing; skipped"
                ),
            }
        }
        Ok(annotations)
    }

    // ======================================================================
    // Reads
    // ======================================================================

    /// Annotations from earlier discovery runs against this asset
    ///
    /// "Previous" means: attached to a report of this asset other than the
    /// current one, where that report is no longer waiting or in progress.
    /// `status` optionally narrows to one review status. `starting_from`
    /// is a zero-based offset; `maximum_results == 0` selects the default
    /// page size.
    pub async fn get_previous_annotations_for_asset(
        &self,
        status: Option<AnnotationStatus>,
        starting_from: usize,
        maximum_results: usize,
    ) -> Result<Vec<Annotation>> {
        self.authorizer
            .authorize(&self.user_id, "read annotations")
            .await?;

        let report_rels = self
            .graph
            .get_relationships(&self.asset_guid, type_names::ASSET_DISCOVERY_REPORT)
            .await?;
        let mut annotations = Vec::new();
        for rel in report_rels.iter().filter(|r| r.from == self.asset_guid) {
            if rel.to == self.report_guid {
                continue;
            }
            let Some(entity) = self.graph.get_entity(&rel.to).await? else {
                continue;
            };
            let report = DiscoveryReport::from_entity(&entity);
            if !report.status.is_terminal() {
                continue;
            }
            annotations.extend(self.annotations_of_report(&rel.to).await?);
        }
        if let Some(wanted) = status {
            annotations.retain(|a| a.status == wanted);
        }
        Ok(self.page(annotations, starting_from, maximum_results))
    }

    /// Annotations created by the current report
    ///
    /// `starting_from` is a zero-based offset; `maximum_results == 0`
    /// selects the default page size.
    pub async fn get_new_annotations_for_asset(
        &self,
        starting_from: usize,
        maximum_results: usize,
    ) -> Result<Vec<Annotation>> {
        self.authorizer
            .authorize(&self.user_id, "read annotations")
            .await?;
        let annotations = self.annotations_of_report(&self.report_guid).await?;
        Ok(self.page(annotations, starting_from, maximum_results))
    }

    /// Direct children of an annotation, one level deep
    ///
    /// `starting_from` is a zero-based offset; `maximum_results == 0`
    /// selects the default page size.
    pub async fn get_extended_annotations(
        &self,
        annotation_guid: &str,
        starting_from: usize,
        maximum_results: usize,
    ) -> Result<Vec<Annotation>> {
        self.authorizer
            .authorize(&self.user_id, "read annotations")
            .await?;
        self.resolve_annotation(annotation_guid).await?;

        let rels = self
            .graph
            .get_relationships(annotation_guid, type_names::ATTACHED_ANNOTATION)
            .await?;
        let mut children = Vec::new();
        for rel in rels.iter().filter(|r| r.from == annotation_guid) {
            if let Some(entity) = self.graph.get_entity(&rel.to).await? {
                children.push(Annotation::from_entity(&entity)?);
            }
        }
        Ok(self.page(children, starting_from, maximum_results))
    }

    /// Fetch one annotation by GUID
    pub async fn get_annotation(&self, annotation_guid: &str) -> Result<Annotation> {
        self.authorizer
            .authorize(&self.user_id, "read annotations")
            .await?;
        let entity = self.resolve_annotation(annotation_guid).await?;
        Annotation::from_entity(&entity)
    }

    // ======================================================================
    // Writes
    // ======================================================================

    /// Create a top-level annotation under the current report
    ///
    /// The graph store allocates the GUID (it is the sole identity
    /// arbiter; a caller-supplied GUID on an unstored annotation is
    /// ignored). Initial status is forced to `New` and the child counter
    /// to zero. Returns the allocated GUID.
    pub async fn add_annotation_to_discovery_report(
        &self,
        annotation: &Annotation,
    ) -> Result<String> {
        self.authorizer
            .authorize(&self.user_id, "create annotation")
            .await?;
        if annotation.annotation_type.is_empty() {
            return Err(GovernanceError::invalid_parameter(
                "annotation type is empty",
            ));
        }

        let mut stored = annotation.clone();
        stored.status = AnnotationStatus::New;
        stored.num_attached_annotations = 0;
        let guid = self
            .graph
            .create_entity(type_names::ANNOTATION, stored.to_properties())
            .await?;
        self.graph
            .create_relationship(
                type_names::REPORTED_ANNOTATION,
                &self.report_guid,
                &guid,
                Default::default(),
            )
            .await?;
        debug!(
            annotation = %guid,
            report = %self.report_guid,
            annotation_type = %stored.annotation_type,
            "added annotation to discovery report"
        );
        Ok(guid)
    }

    /// Create a child annotation under an existing one
    ///
    /// Fails with `InvalidParameter` when the anchor does not resolve.
    /// Increments the anchor's child counter. Returns the stored child.
    pub async fn add_annotation_to_annotation(
        &self,
        anchor_guid: &str,
        annotation: &Annotation,
    ) -> Result<Annotation> {
        self.authorizer
            .authorize(&self.user_id, "create annotation")
            .await?;
        let anchor_entity = self.resolve_annotation(anchor_guid).await?;

        let mut stored = annotation.clone();
        stored.status = AnnotationStatus::New;
        stored.num_attached_annotations = 0;
        let guid = self
            .graph
            .create_entity(type_names::ANNOTATION, stored.to_properties())
            .await?;
        self.graph
            .create_relationship(
                type_names::ATTACHED_ANNOTATION,
                anchor_guid,
                &guid,
                Default::default(),
            )
            .await?;

        let mut anchor = Annotation::from_entity(&anchor_entity)?;
        anchor.num_attached_annotations += 1;
        self.graph
            .update_entity(anchor_guid, anchor.to_properties())
            .await?;

        stored.guid = guid;
        debug!(
            annotation = %stored.guid,
            anchor = %anchor_guid,
            "attached child annotation"
        );
        Ok(stored)
    }

    /// Cross-link an existing annotation to a non-report catalog object
    ///
    /// Does not change the ownership established at creation.
    pub async fn link_annotation(&self, anchor_guid: &str, annotation_guid: &str) -> Result<()> {
        self.authorizer
            .authorize(&self.user_id, "link annotation")
            .await?;
        self.resolve_annotation(annotation_guid).await?;
        let anchor = self
            .graph
            .get_entity(anchor_guid)
            .await?
            .ok_or_else(|| {
                GovernanceError::invalid_parameter(format!("anchor '{anchor_guid}' does not exist"))
            })?;
        if anchor.type_name == type_names::DISCOVERY_REPORT {
            return Err(GovernanceError::invalid_parameter(
                "cross-link anchor must not be a discovery report",
            ));
        }
        self.graph
            .create_relationship(
                type_names::LINKED_ANNOTATION,
                anchor_guid,
                annotation_guid,
                Default::default(),
            )
            .await?;
        Ok(())
    }

    /// Remove a cross-link created by [`AnnotationStore::link_annotation`]
    ///
    /// Fails with `InvalidParameter` when no such link exists — the caller
    /// addressed a link that is not there.
    pub async fn unlink_annotation(&self, anchor_guid: &str, annotation_guid: &str) -> Result<()> {
        self.authorizer
            .authorize(&self.user_id, "unlink annotation")
            .await?;
        self.resolve_annotation(annotation_guid).await?;

        let rels = self
            .graph
            .get_relationships(annotation_guid, type_names::LINKED_ANNOTATION)
            .await?;
        let link = rels
            .iter()
            .find(|r| r.from == anchor_guid && r.to == annotation_guid)
            .ok_or_else(|| {
                GovernanceError::invalid_parameter(format!(
                    "annotation '{annotation_guid}' is not linked to '{anchor_guid}'"
                ))
            })?;
        self.graph.delete_relationship(&link.id).await?;
        Ok(())
    }

    /// Replace an annotation's mutable fields in full
    ///
    /// Status, steward, review fields, confidence, summary, explanation
    /// and expression are taken from the argument; GUID, annotation type,
    /// child counter and creation linkage are immutable and kept from the
    /// stored annotation. Returns the stored result.
    pub async fn update_annotation(&self, annotation: &Annotation) -> Result<Annotation> {
        self.authorizer
            .authorize(&self.user_id, "update annotation")
            .await?;
        let entity = self.resolve_annotation(&annotation.guid).await?;
        let existing = Annotation::from_entity(&entity)?;

        let mut updated = annotation.clone();
        updated.annotation_type = existing.annotation_type;
        updated.num_attached_annotations = existing.num_attached_annotations;
        self.graph
            .update_entity(&annotation.guid, updated.to_properties())
            .await?;
        debug!(annotation = %annotation.guid, status = updated.status.as_str(), "updated annotation");
        Ok(updated)
    }

    /// Delete an annotation and its direct links
    ///
    /// Children are NOT deleted: their parent link goes away and they
    /// become orphaned top-level entries, still retrievable by GUID. That
    /// non-cascading behavior is deliberate and preserved exactly; see the
    /// integration test that pins it. The former parent's child counter is
    /// kept accurate.
    pub async fn delete_annotation(&self, annotation_guid: &str) -> Result<()> {
        self.authorizer
            .authorize(&self.user_id, "delete annotation")
            .await?;
        self.resolve_annotation(annotation_guid).await?;

        // Keep the parent's counter honest before its link disappears.
        let attached = self
            .graph
            .get_relationships(annotation_guid, type_names::ATTACHED_ANNOTATION)
            .await?;
        if let Some(parent_rel) = attached.iter().find(|r| r.to == annotation_guid) {
            if let Some(parent_entity) = self.graph.get_entity(&parent_rel.from).await? {
                let mut parent = Annotation::from_entity(&parent_entity)?;
                parent.num_attached_annotations =
                    parent.num_attached_annotations.saturating_sub(1);
                self.graph
                    .update_entity(&parent_rel.from, parent.to_properties())
                    .await?;
            }
        }

        for type_name in [
            type_names::REPORTED_ANNOTATION,
            type_names::ATTACHED_ANNOTATION,
            type_names::LINKED_ANNOTATION,
        ] {
            for rel in self
                .graph
                .get_relationships(annotation_guid, type_name)
                .await?
            {
                self.graph.delete_relationship(&rel.id).await?;
            }
        }
        self.graph.delete_entity(annotation_guid).await?;
        debug!(annotation = %annotation_guid, "deleted annotation and its direct links");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use silta_core::{InMemoryGraphStore, Properties};

    struct DenyAll;

    #[async_trait]
    impl Authorizer for DenyAll {
        async fn authorize(&self, user: &str, action: &str) -> Result<()> {
            Err(GovernanceError::UserNotAuthorized {
                user: user.to_string(),
                action: action.to_string(),
            })
        }
    }

    async fn store_with_report() -> (Arc<InMemoryGraphStore>, AnnotationStore) {
        let graph = Arc::new(InMemoryGraphStore::new());
        let asset = graph
            .create_entity(type_names::ASSET, Properties::new())
            .await
            .unwrap();
        let report = DiscoveryReport::accepted(&asset, "engine-1");
        let report_guid = graph
            .create_entity(type_names::DISCOVERY_REPORT, report.to_properties())
            .await
            .unwrap();
        graph
            .create_relationship(
                type_names::ASSET_DISCOVERY_REPORT,
                &asset,
                &report_guid,
                Properties::new(),
            )
            .await
            .unwrap();
        let store = AnnotationStore::new(
            "erin",
            asset,
            report_guid,
            graph.clone() as Arc<dyn GraphStore>,
            Arc::new(PermitAll),
        );
        (graph, store)
    }

    #[tokio::test]
    async fn test_add_then_list_new_annotations() {
        let (_, store) = store_with_report().await;
        let guid = store
            .add_annotation_to_discovery_report(&Annotation::new("SchemaAnalysis", "finding"))
            .await
            .unwrap();

        let listed = store.get_new_annotations_for_asset(0, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].guid, guid);
        assert_eq!(listed[0].status, AnnotationStatus::New);
    }

    #[tokio::test]
    async fn test_initial_status_is_forced_to_new() {
        let (_, store) = store_with_report().await;
        let mut annotation = Annotation::new("SchemaAnalysis", "finding");
        annotation.status = AnnotationStatus::Approved;

        let guid = store
            .add_annotation_to_discovery_report(&annotation)
            .await
            .unwrap();
        assert_eq!(
            store.get_annotation(&guid).await.unwrap().status,
            AnnotationStatus::New
        );
    }

    #[tokio::test]
    async fn test_paging_with_default_page_size() {
        let (_, store) = store_with_report().await;
        let store = store.with_default_page_size(3);
        for i in 0..5 {
            store
                .add_annotation_to_discovery_report(&Annotation::new(
                    "SchemaAnalysis",
                    format!("finding {i}"),
                ))
                .await
                .unwrap();
        }

        // maximum_results == 0 means "default page size"
        let first = store.get_new_annotations_for_asset(0, 0).await.unwrap();
        assert_eq!(first.len(), 3);
        let rest = store.get_new_annotations_for_asset(3, 0).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].summary, "finding 3");
    }

    #[tokio::test]
    async fn test_child_annotation_increments_anchor_counter() {
        let (_, store) = store_with_report().await;
        let anchor = store
            .add_annotation_to_discovery_report(&Annotation::new("SchemaAnalysis", "anchor"))
            .await
            .unwrap();

        let child = store
            .add_annotation_to_annotation(&anchor, &Annotation::new("ColumnAnalysis", "child"))
            .await
            .unwrap();

        let extended = store.get_extended_annotations(&anchor, 0, 10).await.unwrap();
        assert_eq!(extended.len(), 1);
        assert_eq!(extended[0].guid, child.guid);
        assert_eq!(
            store.get_annotation(&anchor).await.unwrap().num_attached_annotations,
            1
        );
    }

    #[tokio::test]
    async fn test_child_under_unknown_anchor_is_invalid_parameter() {
        let (_, store) = store_with_report().await;
        let err = store
            .add_annotation_to_annotation("ghost", &Annotation::new("ColumnAnalysis", "child"))
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_update_replaces_mutable_fields_only() {
        let (_, store) = store_with_report().await;
        let guid = store
            .add_annotation_to_discovery_report(&Annotation::new("SchemaAnalysis", "before"))
            .await
            .unwrap();

        let mut changed = store.get_annotation(&guid).await.unwrap();
        changed.status = AnnotationStatus::Approved;
        changed.steward = Some("erin".to_string());
        changed.summary = "after".to_string();
        changed.annotation_type = "Smuggled".to_string();

        let updated = store.update_annotation(&changed).await.unwrap();
        assert_eq!(updated.guid, guid);
        // Type is immutable; the stored value wins
        assert_eq!(updated.annotation_type, "SchemaAnalysis");

        let fetched = store.get_annotation(&guid).await.unwrap();
        assert_eq!(fetched.status, AnnotationStatus::Approved);
        assert_eq!(fetched.summary, "after");
        assert_eq!(fetched.annotation_type, "SchemaAnalysis");
    }

    #[tokio::test]
    async fn test_link_and_unlink_annotation() {
        let (graph, store) = store_with_report().await;
        let glossary_term = graph
            .create_entity(type_names::ASSET, Properties::new())
            .await
            .unwrap();
        let guid = store
            .add_annotation_to_discovery_report(&Annotation::new("SchemaAnalysis", "finding"))
            .await
            .unwrap();

        store.link_annotation(&glossary_term, &guid).await.unwrap();
        store.unlink_annotation(&glossary_term, &guid).await.unwrap();

        // Second unlink addresses a link that is no longer there
        let err = store
            .unlink_annotation(&glossary_term, &guid)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_link_to_report_anchor_is_rejected() {
        let (_, store) = store_with_report().await;
        let guid = store
            .add_annotation_to_discovery_report(&Annotation::new("SchemaAnalysis", "finding"))
            .await
            .unwrap();
        let report_guid = store.report_guid().to_string();
        let err = store.link_annotation(&report_guid, &guid).await.unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_delete_orphans_children_without_cascading() {
        let (_, store) = store_with_report().await;
        let parent = store
            .add_annotation_to_discovery_report(&Annotation::new("SchemaAnalysis", "parent"))
            .await
            .unwrap();
        let child = store
            .add_annotation_to_annotation(&parent, &Annotation::new("ColumnAnalysis", "child"))
            .await
            .unwrap();

        store.delete_annotation(&parent).await.unwrap();

        // Parent is gone; the child survives as an orphaned top-level
        // entry, retrievable by GUID.
        assert!(store.get_annotation(&parent).await.is_err());
        let orphan = store.get_annotation(&child.guid).await.unwrap();
        assert_eq!(orphan.summary, "child");
    }

    #[tokio::test]
    async fn test_deleting_child_decrements_parent_counter() {
        let (_, store) = store_with_report().await;
        let parent = store
            .add_annotation_to_discovery_report(&Annotation::new("SchemaAnalysis", "parent"))
            .await
            .unwrap();
        let child = store
            .add_annotation_to_annotation(&parent, &Annotation::new("ColumnAnalysis", "child"))
            .await
            .unwrap();

        store.delete_annotation(&child.guid).await.unwrap();

        let anchor = store.get_annotation(&parent).await.unwrap();
        assert_eq!(anchor.num_attached_annotations, 0);
        assert!(store
            .get_extended_annotations(&parent, 0, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_denied_user_gets_not_authorized() {
        let (graph, store) = store_with_report().await;
        let denied = AnnotationStore::new(
            "mallory",
            store.asset_guid().to_string(),
            store.report_guid().to_string(),
            graph as Arc<dyn GraphStore>,
            Arc::new(DenyAll),
        );
        let err = denied.get_new_annotations_for_asset(0, 10).await.unwrap_err();
        assert!(matches!(err, GovernanceError::UserNotAuthorized { .. }));
    }

    #[tokio::test]
    async fn test_empty_guid_is_invalid_parameter() {
        let (_, store) = store_with_report().await;
        let err = store.get_annotation("").await.unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidParameter { .. }));
    }
}
