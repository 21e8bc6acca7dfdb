//! Graph type-name constants for SILTA
//!
//! These names identify the entity and relationship types the governance
//! components create and traverse. They are conventions shared with the
//! metadata graph engine; components always reference them through these
//! constants, never as inline strings.

/// Entity type for a cataloged asset (table, file, feed)
pub const ASSET: &str = "Asset";

/// Entity type for a schema view derived from an asset
pub const SCHEMA_VIEW: &str = "SchemaView";

/// Entity type for the record of one discovery job execution
pub const DISCOVERY_REPORT: &str = "DiscoveryReport";

/// Entity type for a discovery finding
pub const ANNOTATION: &str = "Annotation";

/// Relationship from an asset to the schema view the pipeline derived for it
pub const ASSET_SCHEMA_DERIVATION: &str = "AssetSchemaDerivation";

/// Relationship from an asset to one of its discovery reports
pub const ASSET_DISCOVERY_REPORT: &str = "AssetDiscoveryReport";

/// Relationship from a discovery report to a top-level annotation
pub const REPORTED_ANNOTATION: &str = "ReportedAnnotation";

/// Relationship from an annotation to a child annotation
pub const ATTACHED_ANNOTATION: &str = "AttachedAnnotation";

/// Relationship cross-linking an existing annotation to another catalog object
pub const LINKED_ANNOTATION: &str = "LinkedAnnotation";
