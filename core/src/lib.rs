//! silta-core - Core types for the SILTA metadata-governance runtime
//!
//! This crate provides the foundational types shared between the SILTA
//! server components and pluggable units (artifact derivers, discovery
//! services):
//!
//! - [`GovernanceError`] - the flat error taxonomy every component speaks
//! - [`GraphStore`] trait - port to the metadata graph engine
//! - [`Topic`] / [`TopicListener`] traits - port to asynchronous message
//!   channels
//! - [`ChangeEvent`] - the pipeline envelope with correlation fields
//! - [`Annotation`] - the discovery-finding model
//! - [`type_names`] - graph entity/relationship type-name constants
//!
//! # Why this crate exists
//!
//! Pluggable discovery services and artifact derivers are supplied by
//! deployments, not by the server crate. They need the ports, the event
//! envelope and the annotation model without depending on the server's
//! registries and pipelines — and the server needs to accept them without
//! a dependency cycle. Core types live here; engines live in
//! `silta-server`.
//!
//! The in-memory implementations of both ports ([`InMemoryGraphStore`],
//! [`InMemoryTopic`]) also live here so plugin crates can test against
//! them directly.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(missing_docs)]

/// The annotation (discovery finding) model
pub mod annotation;
mod error;
/// The pipeline event envelope
pub mod event;
/// Port to the metadata graph engine
pub mod graph;
/// Port to asynchronous message channels
pub mod topic;
/// Graph entity/relationship type-name constants
pub mod type_names;

pub use annotation::{Annotation, AnnotationStatus};
pub use error::{GovernanceError, Result};
pub use event::{ChangeEvent, Correlation};
pub use graph::{Entity, GraphStore, InMemoryGraphStore, Properties, Relationship, TypeDef};
pub use topic::{InMemoryTopic, Topic, TopicListener};
