//! Graph store port for SILTA
//!
//! The [`GraphStore`] trait is the boundary to the metadata graph engine.
//! Everything durable in SILTA lives behind it: assets, discovery reports,
//! annotations, and the relationships connecting them. The store is also
//! the sole arbiter of identity — every GUID is allocated by the store,
//! never by the components above it.
//!
//! # Architecture
//!
//! ```text
//! EventPipeline ──┐
//! Orchestrator  ──┼──► GraphStore ──► metadata graph engine
//! AnnotationStore ┘      (trait)
//! ```
//!
//! Implementations must be safe for concurrent use by multiple callers.
//! Components never cache graph state across messages or jobs; every read
//! goes through the store so views cannot diverge.

use crate::error::{GovernanceError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Property bag attached to entities and relationships
pub type Properties = HashMap<String, serde_json::Value>;

/// An entity in the metadata graph
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Store-allocated GUID
    pub id: String,
    /// Type name, resolvable via [`GraphStore::get_type_def_by_name`]
    pub type_name: String,
    /// Instance properties
    pub properties: Properties,
}

/// A relationship between two entities
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    /// Store-allocated GUID
    pub id: String,
    /// Relationship type name
    pub type_name: String,
    /// GUID of the entity at end one
    pub from: String,
    /// GUID of the entity at end two
    pub to: String,
    /// Instance properties
    pub properties: Properties,
}

/// A type definition known to the graph store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// Store-allocated GUID of the type
    pub id: String,
    /// Unique type name
    pub name: String,
}

/// Port to the metadata graph engine
///
/// # Implementation Requirements
///
/// - Implementations must be `Send + Sync`; they are shared by every
///   concurrent unit of work in the process.
/// - GUID allocation is the store's job. `create_entity` and
///   `create_relationship` return the allocated GUID; callers never invent
///   identifiers of their own.
/// - `get_relationships` must return matches in creation order. Paged
///   reads in the annotation store rely on that order being stable.
/// - Every failure surfaces as
///   [`GovernanceError::PropertyServer`]; absent entities are `Ok(None)`,
///   not errors.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Fetch an entity by GUID, `None` when absent
    async fn get_entity(&self, id: &str) -> Result<Option<Entity>>;

    /// Create an entity, returning the store-allocated GUID
    async fn create_entity(&self, type_name: &str, properties: Properties) -> Result<String>;

    /// Replace an entity's properties in full
    ///
    /// Updating an absent entity is a store error, not a silent create.
    async fn update_entity(&self, id: &str, properties: Properties) -> Result<()>;

    /// Delete an entity
    ///
    /// Relationships referencing the entity are not removed implicitly;
    /// callers detach first.
    async fn delete_entity(&self, id: &str) -> Result<()>;

    /// Create a relationship, returning the store-allocated GUID
    async fn create_relationship(
        &self,
        type_name: &str,
        from: &str,
        to: &str,
        properties: Properties,
    ) -> Result<String>;

    /// Delete a relationship by GUID
    async fn delete_relationship(&self, id: &str) -> Result<()>;

    /// All relationships of the given type touching the given entity
    ///
    /// Matches where the entity is at either end, in creation order.
    async fn get_relationships(&self, id: &str, type_name: &str) -> Result<Vec<Relationship>>;

    /// An entity of the given type whose string property equals the value
    ///
    /// The resolve-or-create primitive. Returns an arbitrary match when
    /// several exist; callers keep the matched property unique (e.g. an
    /// asset's qualified name).
    async fn find_entity(
        &self,
        type_name: &str,
        property: &str,
        value: &str,
    ) -> Result<Option<Entity>>;

    /// Look up a type definition by name, `None` when the store does not
    /// know the type
    async fn get_type_def_by_name(&self, name: &str) -> Result<Option<TypeDef>>;
}

/// In-memory graph store for tests and single-process deployments
///
/// Keeps entities in a map and relationships in an insertion-ordered list,
/// which gives the creation-order guarantee the trait requires for free.
/// Type definitions are seeded up front with [`InMemoryGraphStore::with_types`].
pub struct InMemoryGraphStore {
    entities: RwLock<HashMap<String, Entity>>,
    relationships: RwLock<Vec<Relationship>>,
    type_defs: RwLock<HashMap<String, TypeDef>>,
}

impl InMemoryGraphStore {
    /// Create an empty store with no known types
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            relationships: RwLock::new(Vec::new()),
            type_defs: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store seeded with the given type names
    pub fn with_types(names: &[&str]) -> Self {
        let store = Self::new();
        {
            let mut defs = store.type_defs.write();
            for name in names {
                defs.insert(
                    (*name).to_string(),
                    TypeDef {
                        id: ulid::Ulid::new().to_string(),
                        name: (*name).to_string(),
                    },
                );
            }
        }
        store
    }

    /// Number of entities currently stored
    pub fn entity_count(&self) -> usize {
        self.entities.read().len()
    }

    /// Number of relationships currently stored
    pub fn relationship_count(&self) -> usize {
        self.relationships.read().len()
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.entities.read().get(id).cloned())
    }

    async fn create_entity(&self, type_name: &str, properties: Properties) -> Result<String> {
        let id = ulid::Ulid::new().to_string();
        let entity = Entity {
            id: id.clone(),
            type_name: type_name.to_string(),
            properties,
        };
        self.entities.write().insert(id.clone(), entity);
        Ok(id)
    }

    async fn update_entity(&self, id: &str, properties: Properties) -> Result<()> {
        let mut entities = self.entities.write();
        match entities.get_mut(id) {
            Some(entity) => {
                entity.properties = properties;
                Ok(())
            }
            None => Err(GovernanceError::property_server(format!(
                "cannot update unknown entity '{id}'"
            ))),
        }
    }

    async fn delete_entity(&self, id: &str) -> Result<()> {
        match self.entities.write().remove(id) {
            Some(_) => Ok(()),
            None => Err(GovernanceError::property_server(format!(
                "cannot delete unknown entity '{id}'"
            ))),
        }
    }

    async fn create_relationship(
        &self,
        type_name: &str,
        from: &str,
        to: &str,
        properties: Properties,
    ) -> Result<String> {
        {
            let entities = self.entities.read();
            if !entities.contains_key(from) {
                return Err(GovernanceError::property_server(format!(
                    "relationship end one '{from}' does not exist"
                )));
            }
            if !entities.contains_key(to) {
                return Err(GovernanceError::property_server(format!(
                    "relationship end two '{to}' does not exist"
                )));
            }
        }
        let id = ulid::Ulid::new().to_string();
        self.relationships.write().push(Relationship {
            id: id.clone(),
            type_name: type_name.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            properties,
        });
        Ok(id)
    }

    async fn delete_relationship(&self, id: &str) -> Result<()> {
        let mut relationships = self.relationships.write();
        let before = relationships.len();
        relationships.retain(|r| r.id != id);
        if relationships.len() == before {
            return Err(GovernanceError::property_server(format!(
                "cannot delete unknown relationship '{id}'"
            )));
        }
        Ok(())
    }

    async fn get_relationships(&self, id: &str, type_name: &str) -> Result<Vec<Relationship>> {
        Ok(self
            .relationships
            .read()
            .iter()
            .filter(|r| r.type_name == type_name && (r.from == id || r.to == id))
            .cloned()
            .collect())
    }

    async fn find_entity(
        &self,
        type_name: &str,
        property: &str,
        value: &str,
    ) -> Result<Option<Entity>> {
        Ok(self
            .entities
            .read()
            .values()
            .find(|e| {
                e.type_name == type_name
                    && e.properties.get(property).and_then(|v| v.as_str()) == Some(value)
            })
            .cloned())
    }

    async fn get_type_def_by_name(&self, name: &str) -> Result<Option<TypeDef>> {
        Ok(self.type_defs.read().get(name).cloned())
    }
}
