use std::fmt;

use crate::model::{ApprovalKind, EntityId, InitiativeId};

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    UnknownUser,
    InitiativeNotFound,
    PermissionDenied,
    InvalidApprovalState,
    ValidationFailed,
    InvalidEnumValue,
    StorageUnavailable,
    LockContention,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::UnknownUser => "E1003",
            Self::InitiativeNotFound => "E2001",
            Self::PermissionDenied => "E2002",
            Self::InvalidApprovalState => "E2003",
            Self::ValidationFailed => "E2004",
            Self::InvalidEnumValue => "E2005",
            Self::StorageUnavailable => "E5001",
            Self::LockContention => "E5002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Workspace not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::UnknownUser => "No current user",
            Self::InitiativeNotFound => "Initiative not found",
            Self::PermissionDenied => "Permission denied",
            Self::InvalidApprovalState => "Invalid approval state",
            Self::ValidationFailed => "Validation failed",
            Self::InvalidEnumValue => "Invalid status/urgency/role value",
            Self::StorageUnavailable => "Storage unavailable",
            Self::LockContention => "Lock contention",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `tl init` to create a .tally workspace."),
            Self::ConfigParseError => Some("Fix syntax in .tally/config.toml and retry."),
            Self::UnknownUser => {
                Some("Pass --user or set TALLY_USER to an id listed in .tally/config.toml.")
            }
            Self::InitiativeNotFound => Some("Check the id with `tl list`."),
            Self::PermissionDenied => None,
            Self::InvalidApprovalState => Some("Use `tl pending` to see requests awaiting review."),
            Self::ValidationFailed => {
                Some("Weights and progress must be 0-100 and weights may not total above 100.")
            }
            Self::InvalidEnumValue => Some("Use one of the documented status/urgency/role values."),
            Self::StorageUnavailable => Some("Check disk space and write permissions, then retry."),
            Self::LockContention => Some("Retry after the other `tl` process releases its lock."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The operation a caller attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
    UpdateProgress,
    Approve,
    Reject,
    SetStatus,
    ReviewQueue,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::UpdateProgress => "update progress",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::SetStatus => "set status",
            Self::ReviewQueue => "review pending requests",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an access predicate failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// No current user could be resolved.
    Unauthenticated,
    /// The action is reserved for administrators.
    Role,
    /// Only the creator may do this.
    Ownership,
    /// The initiative belongs to another entity.
    EntityScope,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unauthenticated => "not authenticated",
            Self::Role => "administrator role required",
            Self::Ownership => "only the creator may do this",
            Self::EntityScope => "initiative belongs to another entity",
        })
    }
}

/// Field-level problems with submitted data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("owner must not be empty")]
    EmptyOwner,

    #[error("'{0}' is not a valid entity for an initiative")]
    ReservedEntity(EntityId),

    #[error("unknown entity '{0}'")]
    UnknownEntity(EntityId),

    #[error("key activity #{index} has an empty name")]
    EmptyActivityName { index: usize },

    #[error("weight {weight} of '{activity}' is outside 0..=100")]
    WeightOutOfRange { activity: String, weight: u8 },

    #[error("progress {value} of '{target}' is outside 0..=100")]
    ProgressOutOfRange { target: String, value: u8 },

    #[error("key activity weights total {total}, above 100")]
    TotalWeightExceeded { total: u32 },

    #[error("{field} must not be negative (got {value})")]
    NegativeAmount { field: &'static str, value: i64 },

    #[error("no key activity #{index} (initiative has {len})")]
    UnknownActivity { index: usize, len: usize },

    #[error("progress is derived from key activities; update an activity instead")]
    DerivedProgress,

    #[error("indicator #{index} has an empty metric")]
    EmptyIndicatorMetric { index: usize },

    #[error("{field} of indicator '{metric}' must be a finite, non-negative number")]
    IndicatorValueInvalid { metric: String, field: &'static str },
}

/// Failure inside a record store or notifier backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt document: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("{0}")]
    Unavailable(String),
}

/// Everything a facade operation can fail with.
///
/// Every variant is local to the call; none leaves a partially applied
/// transition behind.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("initiative {0} not found")]
    NotFound(InitiativeId),

    #[error("cannot {action}: {reason}")]
    PermissionDenied { action: Action, reason: DenyReason },

    #[error("cannot {action} an initiative in state {state}")]
    InvalidState { action: Action, state: ApprovalKind },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),
}

impl WorkflowError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::InitiativeNotFound,
            Self::PermissionDenied {
                reason: DenyReason::Unauthenticated,
                ..
            } => ErrorCode::UnknownUser,
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::InvalidState { .. } => ErrorCode::InvalidApprovalState,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::StorageUnavailable(_) => ErrorCode::StorageUnavailable,
        }
    }

    pub(crate) const fn denied(action: Action, reason: DenyReason) -> Self {
        Self::PermissionDenied { action, reason }
    }
}
