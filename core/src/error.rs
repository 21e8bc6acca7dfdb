//! Error taxonomy for SILTA governance services

use thiserror::Error;

/// Result type alias for governance operations
pub type Result<T> = std::result::Result<T, GovernanceError>;

/// Error type shared by every SILTA component
///
/// The taxonomy is deliberately flat: a kind, a human-readable message and
/// (for store failures) an optional cause string. Callers branch on the
/// kind; they never need to unwind a hierarchy.
///
/// # Retry semantics
///
/// - [`InvalidParameter`](GovernanceError::InvalidParameter) and
///   [`UserNotAuthorized`](GovernanceError::UserNotAuthorized) are caller
///   errors — retrying without fixing the input cannot succeed.
/// - [`PropertyServer`](GovernanceError::PropertyServer) wraps an
///   underlying store/transport failure and may be transient.
/// - The registry/orchestrator kinds indicate misconfiguration and are
///   operator-actionable.
///
/// # Example
///
/// ```
/// use silta_core::GovernanceError;
///
/// let err = GovernanceError::invalid_parameter("annotation GUID is empty");
/// assert_eq!(err.to_string(), "invalid parameter: annotation GUID is empty");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    /// Bad or unresolvable input
    ///
    /// The caller supplied an identifier or payload that does not resolve.
    /// Examples: empty GUID, annotation anchor that does not exist.
    #[error("invalid parameter: {message}")]
    InvalidParameter {
        /// What was wrong with the input
        message: String,
    },

    /// Authorization denial
    ///
    /// The external authorization collaborator rejected the caller.
    #[error("user '{user}' is not authorized to {action}")]
    UserNotAuthorized {
        /// Calling user id
        user: String,
        /// The action that was denied
        action: String,
    },

    /// Underlying metadata store or transport failure
    ///
    /// Anything the graph store or topic connector reports bubbles up as
    /// this kind. May be transient; callers decide whether to retry.
    #[error("property server error: {message}")]
    PropertyServer {
        /// What failed
        message: String,
        /// Underlying error text, when the store provided one
        cause: Option<String>,
    },

    /// No live service instance for a `(server, service)` pair
    ///
    /// Surfaces to request handlers as "service not initialized for this
    /// server".
    #[error("service '{service}' is not initialized for server '{server}'")]
    InstanceNotFound {
        /// Server (tenant) name
        server: String,
        /// Service name
        service: String,
    },

    /// A live instance already exists for a `(server, service)` pair
    #[error("service '{service}' is already registered for server '{server}'")]
    DuplicateInstance {
        /// Server (tenant) name
        server: String,
        /// Service name
        service: String,
    },

    /// Discovery engine GUID is not registered on this server
    ///
    /// Also returned for every engine lookup after orchestrator shutdown.
    #[error("discovery engine '{engine}' is not registered on this server")]
    UnknownDiscoveryEngine {
        /// The engine GUID that failed to resolve
        engine: String,
    },
}

impl GovernanceError {
    /// Shorthand for an [`InvalidParameter`](GovernanceError::InvalidParameter)
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Shorthand for a [`PropertyServer`](GovernanceError::PropertyServer)
    /// without an underlying cause
    pub fn property_server(message: impl Into<String>) -> Self {
        Self::PropertyServer {
            message: message.into(),
            cause: None,
        }
    }

    /// Shorthand for a [`PropertyServer`](GovernanceError::PropertyServer)
    /// wrapping an underlying error
    pub fn property_server_caused_by(
        message: impl Into<String>,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self::PropertyServer {
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    /// True when retrying without changing the input might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PropertyServer { .. })
    }
}
