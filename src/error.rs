//! Unified error handling for statestore.
//!
//! Store failures never leave the repository/manager boundary as raw
//! [`CouchError`]s: they are logged where they happen and wrapped into a
//! [`StateError`] that keeps the store's diagnostic code.

use couch_proto::CouchError;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Validation Errors (codec input)
// ============================================================================

/// Input that cannot become a state document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("value for key \"{0}\" is required")]
    MissingField(String),

    #[error("invalid state identifier: {0}")]
    InvalidId(String),

    #[error("field \"{field}\" has an invalid value: {reason}")]
    InvalidField { field: String, reason: String },
}

// ============================================================================
// Listener Errors (notification dispatch)
// ============================================================================

/// Failure reported by a notification listener.
///
/// Dispatch does not isolate listeners, so these reach the caller of the
/// mutation that triggered the notification.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("owning entity for state {0} could not be found")]
    OwnerNotFound(Uuid),

    #[error("owner kind {0} is not supported by the publisher")]
    UnsupportedOwner(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("listener rejected event: {0}")]
    Rejected(String),
}

// ============================================================================
// State Errors (repository and manager)
// ============================================================================

/// Errors surfaced by the repository and the manager.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No tracked field changed. Absorbed by the manager, never returned
    /// from its public operations.
    #[error("state is not updated")]
    NotUpdated,

    #[error("state {id} could not be created")]
    CreateFailed {
        id: Uuid,
        code: u16,
        #[source]
        source: CouchError,
    },

    #[error("state {id} could not be updated after {attempts} attempt(s)")]
    UpdateFailed {
        id: Uuid,
        code: u16,
        attempts: u32,
        #[source]
        source: CouchError,
    },

    #[error("state {id} could not be loaded from database")]
    LoadFailed {
        id: Uuid,
        code: u16,
        #[source]
        source: CouchError,
    },

    #[error("notification listener failed: {0}")]
    Listener(#[from] ListenerError),
}

impl StateError {
    /// Get a static error code string for log and metric labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotUpdated => "not_updated",
            Self::CreateFailed { .. } => "create_failed",
            Self::UpdateFailed { .. } => "update_failed",
            Self::LoadFailed { .. } => "load_failed",
            Self::Listener(_) => "listener_failed",
        }
    }

    /// Diagnostic code carried over from the underlying store failure.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::CreateFailed { code, .. }
            | Self::UpdateFailed { code, .. }
            | Self::LoadFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True when an update gave up because of repeated revision conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::UpdateFailed { source, .. } if source.is_conflict())
    }
}

/// Result type for repository and manager operations.
pub type StateResult<T> = Result<T, StateError>;

// ============================================================================
// Database Errors (opening from configuration)
// ============================================================================

/// Failure to open a database handle from configuration.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("invalid configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<crate::config::ValidationError>),

    #[error("database connection failed: {0}")]
    Connect(#[from] CouchError),
}

fn join_errors(errors: &[crate::config::ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
