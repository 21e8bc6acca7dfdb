//! Change events — the pipeline envelope
//!
//! A [`ChangeEvent`] is the deserialized form of one inbound topic payload:
//! a source-system identifier plus a set of named sub-structures
//! ("sections") that the pipeline derives metadata artifacts from. The
//! same struct is republished outbound once the pipeline has filled in the
//! [`Correlation`] fields with the graph GUIDs it produced.
//!
//! Lifecycle: constructed from wire bytes at pipeline entry, mutated
//! exactly once by the link step, serialized once, then discarded.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known section carrying the asset-source sub-structure
pub const SECTION_TABLE_SOURCE: &str = "table_source";
/// Well-known section carrying the column set of a derived view
pub const SECTION_COLUMNS: &str = "columns";

/// Correlation fields filled in by the pipeline before republishing
///
/// `entity_ids` maps each deriver role to the graph GUID it produced;
/// `relationship_id` is the GUID of the relationship the link step created
/// between the joined artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    /// Deriver role → graph entity GUID
    #[serde(default)]
    pub entity_ids: HashMap<String, String>,
    /// GUID of the relationship created by the link step
    #[serde(default)]
    pub relationship_id: Option<String>,
}

/// One change notification flowing through the event pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Identifier of the system the change originated in
    pub source_system: String,
    /// Kind of change, e.g. `"table.created"`
    pub event_type: String,
    /// Event timestamp in unix nanoseconds; 0 until stamped by the source
    #[serde(default)]
    pub timestamp_unix_ns: u64,
    /// Named sub-structures to derive artifacts from
    #[serde(default)]
    pub sections: HashMap<String, serde_json::Value>,
    /// Filled in by the pipeline's link step
    #[serde(default)]
    pub correlation: Correlation,
}

impl ChangeEvent {
    /// Decode an event from wire bytes
    pub fn from_bytes(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Encode the event for republishing
    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// The named section, if the event carries it
    pub fn section(&self, name: &str) -> Option<&serde_json::Value> {
        self.sections.get(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_minimal_event() {
        let event = ChangeEvent::from_bytes(
            br#"{"source_system":"warehouse","event_type":"table.created"}"#,
        )
        .unwrap();

        assert_eq!(event.source_system, "warehouse");
        assert_eq!(event.timestamp_unix_ns, 0);
        assert!(event.sections.is_empty());
        assert_eq!(event.correlation, Correlation::default());
    }

    #[test]
    fn test_decode_sections() {
        let event = ChangeEvent::from_bytes(
            br#"{
                "source_system": "warehouse",
                "event_type": "table.created",
                "sections": {
                    "table_source": {"qualified_name": "db.sales.orders"},
                    "columns": {"names": ["id", "total"]}
                }
            }"#,
        )
        .unwrap();

        let table = event.section(SECTION_TABLE_SOURCE).unwrap();
        assert_eq!(table.get("qualified_name").unwrap(), "db.sales.orders");
        assert!(event.section("nonexistent").is_none());
    }

    #[test]
    fn test_garbage_payload_fails_to_decode() {
        assert!(ChangeEvent::from_bytes(b"not json at all").is_err());
    }

    #[test]
    fn test_correlation_survives_round_trip() {
        let mut event = ChangeEvent::from_bytes(
            br#"{"source_system":"warehouse","event_type":"table.created"}"#,
        )
        .unwrap();
        event
            .correlation
            .entity_ids
            .insert("asset_source".to_string(), "guid-1".to_string());
        event.correlation.relationship_id = Some("guid-rel".to_string());

        let bytes = event.to_bytes().unwrap();
        let decoded = ChangeEvent::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.correlation, event.correlation);
    }
}
