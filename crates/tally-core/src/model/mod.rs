//! Domain model: acting users and the initiative aggregate.

pub mod initiative;
pub mod user;

use std::fmt;

pub use initiative::{
    Approval, ApprovalKind, Audit, Indicator, IndicatorKind, Initiative, InitiativeFields,
    InitiativeId, KeyActivity, Money, PERCENT_MAX, Proposal, StagedChange, Status, Urgency,
    validate_activities, validate_indicators,
};
pub use user::{EntityId, EntityScope, InvalidUser, Role, User, UserId};

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}
