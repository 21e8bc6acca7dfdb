//! Discovery reports — the record of one discovery job execution

use silta_core::{Entity, Properties};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in nanoseconds; 0 if the clock is before the epoch
pub(crate) fn now_unix_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Execution status of a discovery request
///
/// `Complete` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryRequestStatus {
    /// Accepted, not yet running
    Waiting,
    /// Job is executing
    InProgress,
    /// Job ran to completion
    Complete,
    /// Job raised an error
    Failed,
}

impl DiscoveryRequestStatus {
    /// Canonical string form, used for graph property storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::InProgress => "IN_PROGRESS",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
        }
    }

    /// Parse the canonical string form; anything unrecognized is `Failed`
    pub fn parse(s: &str) -> Self {
        match s {
            "WAITING" => Self::Waiting,
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETE" => Self::Complete,
            _ => Self::Failed,
        }
    }

    /// True for `Complete` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

mod keys {
    pub const ASSET_GUID: &str = "assetGuid";
    pub const ENGINE_GUID: &str = "engineGuid";
    pub const STARTED: &str = "startedUnixNs";
    pub const COMPLETED: &str = "completedUnixNs";
    pub const STATUS: &str = "requestStatus";
    pub const FAILURE_MESSAGE: &str = "failureMessage";
}

/// One discovery request's record
///
/// Persisted as a graph entity; `request_guid` is the entity GUID the
/// store allocated. The graph is the single source of truth — the
/// orchestrator never caches reports.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryReport {
    /// GUID of the request (the report entity's GUID)
    pub request_guid: String,
    /// Asset the job ran against
    pub asset_guid: String,
    /// Engine that accepted the request
    pub engine_guid: String,
    /// When the request was accepted, unix nanoseconds
    pub started_unix_ns: u64,
    /// When the job reached a terminal status
    pub completed_unix_ns: Option<u64>,
    /// Execution status
    pub status: DiscoveryRequestStatus,
    /// Error text when the job failed
    pub failure_message: Option<String>,
}

impl DiscoveryReport {
    /// A freshly-accepted report in `Waiting`
    pub fn accepted(asset_guid: impl Into<String>, engine_guid: impl Into<String>) -> Self {
        Self {
            request_guid: String::new(),
            asset_guid: asset_guid.into(),
            engine_guid: engine_guid.into(),
            started_unix_ns: now_unix_ns(),
            completed_unix_ns: None,
            status: DiscoveryRequestStatus::Waiting,
            failure_message: None,
        }
    }

    /// Graph property form, excluding the GUID (that is the entity id)
    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert(keys::ASSET_GUID.to_string(), self.asset_guid.clone().into());
        props.insert(
            keys::ENGINE_GUID.to_string(),
            self.engine_guid.clone().into(),
        );
        props.insert(keys::STARTED.to_string(), self.started_unix_ns.into());
        if let Some(completed) = self.completed_unix_ns {
            props.insert(keys::COMPLETED.to_string(), completed.into());
        }
        props.insert(keys::STATUS.to_string(), self.status.as_str().into());
        if let Some(message) = &self.failure_message {
            props.insert(keys::FAILURE_MESSAGE.to_string(), message.clone().into());
        }
        props
    }

    /// Rebuild a report from its graph entity
    pub fn from_entity(entity: &Entity) -> Self {
        let props = &entity.properties;
        let str_prop = |key: &str| -> String {
            props
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        Self {
            request_guid: entity.id.clone(),
            asset_guid: str_prop(keys::ASSET_GUID),
            engine_guid: str_prop(keys::ENGINE_GUID),
            started_unix_ns: props
                .get(keys::STARTED)
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            completed_unix_ns: props.get(keys::COMPLETED).and_then(|v| v.as_u64()),
            status: DiscoveryRequestStatus::parse(&str_prop(keys::STATUS)),
            failure_message: props
                .get(keys::FAILURE_MESSAGE)
                .and_then(|v| v.as_str())
                .map(String::from),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            DiscoveryRequestStatus::Waiting,
            DiscoveryRequestStatus::InProgress,
            DiscoveryRequestStatus::Complete,
            DiscoveryRequestStatus::Failed,
        ] {
            assert_eq!(DiscoveryRequestStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(DiscoveryRequestStatus::Complete.is_terminal());
        assert!(DiscoveryRequestStatus::Failed.is_terminal());
        assert!(!DiscoveryRequestStatus::Waiting.is_terminal());
        assert!(!DiscoveryRequestStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_property_round_trip() {
        let mut report = DiscoveryReport::accepted("asset-1", "engine-1");
        report.status = DiscoveryRequestStatus::Failed;
        report.completed_unix_ns = Some(report.started_unix_ns + 1_000);
        report.failure_message = Some("job raised".to_string());

        let entity = Entity {
            id: "request-1".to_string(),
            type_name: "DiscoveryReport".to_string(),
            properties: report.to_properties(),
        };
        let rebuilt = DiscoveryReport::from_entity(&entity);

        assert_eq!(rebuilt.request_guid, "request-1");
        assert_eq!(rebuilt.asset_guid, report.asset_guid);
        assert_eq!(rebuilt.status, DiscoveryRequestStatus::Failed);
        assert_eq!(rebuilt.failure_message.as_deref(), Some("job raised"));
        assert_eq!(rebuilt.completed_unix_ns, report.completed_unix_ns);
    }
}
