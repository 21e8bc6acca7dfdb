//! Annotations — discovery findings attached to assets
//!
//! An [`Annotation`] is one finding produced by a discovery job. Annotations
//! form a forest: each is a top-level child of exactly one discovery report,
//! or a child of exactly one other annotation — never both, never cyclic.
//! The shape is enforced by the store operations that create them, not by
//! graph traversal.

use crate::error::GovernanceError;
use crate::graph::{Entity, Properties};

/// Review-workflow status of an annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationStatus {
    /// Freshly created, not yet reviewed
    New,
    /// A steward has looked at it
    Reviewed,
    /// Accepted as correct
    Approved,
    /// Acted upon in the catalog
    Actioned,
    /// Judged incorrect
    Invalid,
    /// Deliberately set aside
    Ignored,
    /// Status could not be determined
    Unknown,
}

impl AnnotationStatus {
    /// Canonical string form, used for graph property storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Reviewed => "REVIEWED",
            Self::Approved => "APPROVED",
            Self::Actioned => "ACTIONED",
            Self::Invalid => "INVALID",
            Self::Ignored => "IGNORED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse the canonical string form; anything unrecognized is `Unknown`
    pub fn parse(s: &str) -> Self {
        match s {
            "NEW" => Self::New,
            "REVIEWED" => Self::Reviewed,
            "APPROVED" => Self::Approved,
            "ACTIONED" => Self::Actioned,
            "INVALID" => Self::Invalid,
            "IGNORED" => Self::Ignored,
            _ => Self::Unknown,
        }
    }
}

mod keys {
    pub const ANNOTATION_TYPE: &str = "annotationType";
    pub const CONFIDENCE_LEVEL: &str = "confidenceLevel";
    pub const SUMMARY: &str = "summary";
    pub const EXPLANATION: &str = "explanation";
    pub const EXPRESSION: &str = "expression";
    pub const STATUS: &str = "annotationStatus";
    pub const STEWARD: &str = "steward";
    pub const REVIEW_COMMENT: &str = "reviewComment";
    pub const REVIEW_DATE: &str = "reviewDateUnixNs";
    pub const NUM_ATTACHED: &str = "numAttachedAnnotations";
}

/// One discovery finding
///
/// `guid` is empty until the annotation store persists the annotation; the
/// graph store allocates it. `num_attached_annotations` counts direct
/// children and is maintained by the store, never by callers.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Graph GUID; empty before the annotation is stored
    pub guid: String,
    /// Kind of finding, e.g. `"SchemaAnalysis"`
    pub annotation_type: String,
    /// Job confidence in the finding, 0–100
    pub confidence_level: i32,
    /// One-line finding summary
    pub summary: String,
    /// Longer explanation of how the finding was reached
    pub explanation: String,
    /// Expression the job evaluated, when there is one
    pub expression: String,
    /// Review-workflow status
    pub status: AnnotationStatus,
    /// Steward assigned during review
    pub steward: Option<String>,
    /// Comment recorded during review
    pub review_comment: Option<String>,
    /// Review timestamp in unix nanoseconds
    pub review_date_unix_ns: Option<u64>,
    /// Count of direct child annotations
    pub num_attached_annotations: u32,
}

impl Annotation {
    /// Create an unstored annotation of the given type
    pub fn new(annotation_type: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            guid: String::new(),
            annotation_type: annotation_type.into(),
            confidence_level: 0,
            summary: summary.into(),
            explanation: String::new(),
            expression: String::new(),
            status: AnnotationStatus::New,
            steward: None,
            review_comment: None,
            review_date_unix_ns: None,
            num_attached_annotations: 0,
        }
    }

    /// Graph property form, excluding the GUID (that is the entity id)
    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert(
            keys::ANNOTATION_TYPE.to_string(),
            self.annotation_type.clone().into(),
        );
        props.insert(
            keys::CONFIDENCE_LEVEL.to_string(),
            self.confidence_level.into(),
        );
        props.insert(keys::SUMMARY.to_string(), self.summary.clone().into());
        props.insert(
            keys::EXPLANATION.to_string(),
            self.explanation.clone().into(),
        );
        props.insert(keys::EXPRESSION.to_string(), self.expression.clone().into());
        props.insert(keys::STATUS.to_string(), self.status.as_str().into());
        if let Some(steward) = &self.steward {
            props.insert(keys::STEWARD.to_string(), steward.clone().into());
        }
        if let Some(comment) = &self.review_comment {
            props.insert(keys::REVIEW_COMMENT.to_string(), comment.clone().into());
        }
        if let Some(date) = self.review_date_unix_ns {
            props.insert(keys::REVIEW_DATE.to_string(), date.into());
        }
        props.insert(
            keys::NUM_ATTACHED.to_string(),
            self.num_attached_annotations.into(),
        );
        props
    }

    /// Rebuild an annotation from its graph entity
    pub fn from_entity(entity: &Entity) -> Result<Self, GovernanceError> {
        let props = &entity.properties;
        let str_prop = |key: &str| -> String {
            props
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let opt_str_prop =
            |key: &str| -> Option<String> { props.get(key).and_then(|v| v.as_str()).map(String::from) };

        Ok(Self {
            guid: entity.id.clone(),
            annotation_type: str_prop(keys::ANNOTATION_TYPE),
            confidence_level: props
                .get(keys::CONFIDENCE_LEVEL)
                .and_then(|v| v.as_i64())
                .unwrap_or(0) as i32,
            summary: str_prop(keys::SUMMARY),
            explanation: str_prop(keys::EXPLANATION),
            expression: str_prop(keys::EXPRESSION),
            status: AnnotationStatus::parse(&str_prop(keys::STATUS)),
            steward: opt_str_prop(keys::STEWARD),
            review_comment: opt_str_prop(keys::REVIEW_COMMENT),
            review_date_unix_ns: props.get(keys::REVIEW_DATE).and_then(|v| v.as_u64()),
            num_attached_annotations: props
                .get(keys::NUM_ATTACHED)
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
        })
    }
}
