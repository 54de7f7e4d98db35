use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ParseEnumError;
use super::user::{EntityId, UserId};
use crate::error::ValidationError;

/// Money amounts in whole currency units.
pub type Money = i64;

/// Upper bound shared by weights and progress values.
pub const PERCENT_MAX: u8 = 100;

const ID_PREFIX: &str = "in-";
const ID_HEX_LEN: usize = 10;

/// Identifier of an initiative. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitiativeId(String);

impl InitiativeId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Derive a short content-addressed id (`in-` + 10 hex chars).
    ///
    /// `salt` lets callers retry on the (unlikely) event of a collision.
    #[must_use]
    pub fn generate(created_by: &UserId, name: &str, at: DateTime<Utc>, salt: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(created_by.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
        hasher.update(&at.timestamp_micros().to_le_bytes());
        hasher.update(&salt.to_le_bytes());
        let hex = hasher.finalize().to_hex();
        Self(format!("{ID_PREFIX}{}", &hex.as_str()[..ID_HEX_LEN]))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InitiativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InitiativeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Lifecycle status of an initiative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    NotStarted,
    OnGoing,
    Done,
    Hold,
    CarryOver,
    Cancelled,
}

impl Status {
    const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::OnGoing => "on_going",
            Self::Done => "done",
            Self::Hold => "hold",
            Self::CarryOver => "carry_over",
            Self::Cancelled => "cancelled",
        }
    }

    /// Statuses only an administrator can assign; the rollup never touches them.
    #[must_use]
    pub const fn is_admin_assigned(self) -> bool {
        matches!(self, Self::Hold | Self::CarryOver | Self::Cancelled)
    }
}

/// Deadline pressure derived from the due date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    #[default]
    Low,
}

impl Urgency {
    const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    /// Accepts snake_case names and the spaced labels used by the web forms
    /// ("On Going", "Carry Over").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "not_started" => Ok(Self::NotStarted),
            "on_going" | "ongoing" => Ok(Self::OnGoing),
            "done" => Ok(Self::Done),
            "hold" => Ok(Self::Hold),
            "carry_over" | "carryover" => Ok(Self::CarryOver),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Urgency {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(ParseEnumError {
                expected: "urgency",
                got: s.to_string(),
            }),
        }
    }
}

/// A weighted sub-task contributing to its initiative's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyActivity {
    pub name: String,
    /// Percent of the whole initiative this activity represents.
    #[serde(default)]
    pub weight: u8,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub progress: u8,
}

impl KeyActivity {
    #[must_use]
    pub fn new(name: impl Into<String>, weight: u8, progress: u8) -> Self {
        Self {
            name: name.into(),
            weight,
            due_date: None,
            progress,
        }
    }

    #[must_use]
    pub const fn due(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }
}

/// Whether an indicator predicts or confirms the outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    #[default]
    Leading,
    Lagging,
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Leading => "leading",
            Self::Lagging => "lagging",
        })
    }
}

impl FromStr for IndicatorKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leading" => Ok(Self::Leading),
            "lagging" => Ok(Self::Lagging),
            _ => Err(ParseEnumError {
                expected: "indicator kind",
                got: s.to_string(),
            }),
        }
    }
}

/// A key performance indicator: a metric with a target and what has been
/// realized so far. `uom` is free text such as `%`, `count` or `index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    #[serde(rename = "type", default)]
    pub kind: IndicatorKind,
    pub metric: String,
    #[serde(default)]
    pub uom: String,
    #[serde(default)]
    pub target: f64,
    #[serde(default)]
    pub realization: f64,
}

impl Indicator {
    #[must_use]
    pub fn new(kind: IndicatorKind, metric: impl Into<String>, uom: impl Into<String>) -> Self {
        Self {
            kind,
            metric: metric.into(),
            uom: uom.into(),
            target: 0.0,
            realization: 0.0,
        }
    }

    #[must_use]
    pub const fn values(mut self, target: f64, realization: f64) -> Self {
        self.target = target;
        self.realization = realization;
        self
    }

    /// Percent of the target realized, rounded half away from zero and
    /// capped at 100. A target of zero (or below) counts as 0%.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn achievement(&self) -> u8 {
        if self.target <= 0.0 || !self.target.is_finite() || !self.realization.is_finite() {
            return 0;
        }
        // clamped to 0..=100 before the cast
        (self.realization / self.target * 100.0)
            .round()
            .clamp(0.0, f64::from(PERCENT_MAX)) as u8
    }
}

// Values compare by bit pattern so the type can be `Eq` like the records
// that hold it.
impl PartialEq for Indicator {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.metric == other.metric
            && self.uom == other.uom
            && self.target.total_cmp(&other.target).is_eq()
            && self.realization.total_cmp(&other.realization).is_eq()
    }
}

impl Eq for Indicator {}

/// Mutable fields a caller submits for a create or update.
///
/// Derived fields (`urgency`, `status`, and `progress` when activities exist)
/// are computed by the engine, never taken from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub name: String,
    pub owner: String,
    pub entity: EntityId,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub budget: Money,
    #[serde(default)]
    pub cost: Money,
    /// Authoritative only when `key_activities` is empty.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub key_activities: Vec<KeyActivity>,
    /// Expected deliverable, free text.
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub indicators: Vec<Indicator>,
}

impl Proposal {
    #[must_use]
    pub fn new(name: impl Into<String>, owner: impl Into<String>, entity: impl Into<EntityId>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            entity: entity.into(),
            due_date: None,
            budget: 0,
            cost: 0,
            progress: 0,
            key_activities: Vec::new(),
            output: String::new(),
            indicators: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    #[must_use]
    pub fn with_indicator(mut self, indicator: Indicator) -> Self {
        self.indicators.push(indicator);
        self
    }

    #[must_use]
    pub fn with_activity(mut self, activity: KeyActivity) -> Self {
        self.key_activities.push(activity);
        self
    }

    #[must_use]
    pub const fn with_due_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    #[must_use]
    pub const fn with_money(mut self, budget: Money, cost: Money) -> Self {
        self.budget = budget;
        self.cost = cost;
        self
    }

    #[must_use]
    pub const fn with_progress(mut self, progress: u8) -> Self {
        self.progress = progress;
        self
    }

    /// Check field ranges and required values.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.owner.trim().is_empty() {
            return Err(ValidationError::EmptyOwner);
        }
        if self.entity.as_str().trim().is_empty() || self.entity.is_reserved() {
            return Err(ValidationError::ReservedEntity(self.entity.clone()));
        }
        if self.progress > PERCENT_MAX {
            return Err(ValidationError::ProgressOutOfRange {
                target: self.name.clone(),
                value: self.progress,
            });
        }
        for (field, value) in [("budget", self.budget), ("cost", self.cost)] {
            if value < 0 {
                return Err(ValidationError::NegativeAmount { field, value });
            }
        }
        validate_activities(&self.key_activities)?;
        validate_indicators(&self.indicators)
    }
}

/// Every indicator needs a metric and finite, non-negative values.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_indicators(indicators: &[Indicator]) -> Result<(), ValidationError> {
    for (index, indicator) in indicators.iter().enumerate() {
        if indicator.metric.trim().is_empty() {
            return Err(ValidationError::EmptyIndicatorMetric { index });
        }
        for (field, value) in [("target", indicator.target), ("realization", indicator.realization)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::IndicatorValueInvalid {
                    metric: indicator.metric.clone(),
                    field,
                });
            }
        }
    }
    Ok(())
}

/// Validate a key activity list on its own (also used for progress edits).
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_activities(activities: &[KeyActivity]) -> Result<(), ValidationError> {
    let mut total: u32 = 0;
    for (index, activity) in activities.iter().enumerate() {
        if activity.name.trim().is_empty() {
            return Err(ValidationError::EmptyActivityName { index });
        }
        if activity.weight > PERCENT_MAX {
            return Err(ValidationError::WeightOutOfRange {
                activity: activity.name.clone(),
                weight: activity.weight,
            });
        }
        if activity.progress > PERCENT_MAX {
            return Err(ValidationError::ProgressOutOfRange {
                target: activity.name.clone(),
                value: activity.progress,
            });
        }
        total += u32::from(activity.weight);
    }
    if total > u32::from(PERCENT_MAX) {
        return Err(ValidationError::TotalWeightExceeded { total });
    }
    Ok(())
}

/// Every mutable field of an initiative (everything except `id`/`created_by`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeFields {
    pub name: String,
    pub owner: String,
    pub entity: EntityId,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub budget: Money,
    #[serde(default)]
    pub cost: Money,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub key_activities: Vec<KeyActivity>,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub indicators: Vec<Indicator>,
}

impl InitiativeFields {
    /// Raw fields from a proposal; derived values still need
    /// [`crate::rollup::refresh`] before they are authoritative.
    #[must_use]
    pub fn from_proposal(proposal: Proposal, status: Status) -> Self {
        let Proposal {
            name,
            owner,
            entity,
            due_date,
            budget,
            cost,
            progress,
            key_activities,
            output,
            indicators,
        } = proposal;
        Self {
            name,
            owner,
            entity,
            due_date,
            urgency: Urgency::Low,
            budget,
            cost,
            status,
            progress,
            key_activities,
            output,
            indicators,
        }
    }

    /// The caller-facing subset of these fields.
    #[must_use]
    pub fn to_proposal(&self) -> Proposal {
        Proposal {
            name: self.name.clone(),
            owner: self.owner.clone(),
            entity: self.entity.clone(),
            due_date: self.due_date,
            budget: self.budget,
            cost: self.cost,
            progress: self.progress,
            key_activities: self.key_activities.clone(),
            output: self.output.clone(),
            indicators: self.indicators.clone(),
        }
    }
}

/// A proposed full replacement of an initiative's mutable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedChange {
    pub fields: InitiativeFields,
    pub submitted_by: UserId,
    pub submitted_at: DateTime<Utc>,
    /// Revision of the live record when the change was staged.
    #[serde(default)]
    pub base_revision: u64,
}

/// Payload-free view of [`Approval`] for logs, errors and indexed columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    Approved,
    PendingCreate,
    PendingUpdate,
    PendingDelete,
    Rejected,
}

impl ApprovalKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::PendingCreate => "pending_create",
            Self::PendingUpdate => "pending_update",
            Self::PendingDelete => "pending_delete",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            Self::PendingCreate | Self::PendingUpdate | Self::PendingDelete
        )
    }
}

impl fmt::Display for ApprovalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval state of an initiative.
///
/// A staged change only exists inside [`Approval::PendingUpdate`], so a
/// record cannot be `Approved` while still carrying a proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Approval {
    #[default]
    Approved,
    /// The initiative itself is the proposal.
    PendingCreate,
    PendingUpdate(StagedChange),
    PendingDelete {
        requested_by: UserId,
        requested_at: DateTime<Utc>,
    },
    Rejected,
}

impl Approval {
    #[must_use]
    pub const fn kind(&self) -> ApprovalKind {
        match self {
            Self::Approved => ApprovalKind::Approved,
            Self::PendingCreate => ApprovalKind::PendingCreate,
            Self::PendingUpdate(_) => ApprovalKind::PendingUpdate,
            Self::PendingDelete { .. } => ApprovalKind::PendingDelete,
            Self::Rejected => ApprovalKind::Rejected,
        }
    }

    #[must_use]
    pub const fn staged(&self) -> Option<&StagedChange> {
        match self {
            Self::PendingUpdate(change) => Some(change),
            _ => None,
        }
    }
}

/// Who resolved or last touched an initiative, and when.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Audit {
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<UserId>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub updated_by: Option<UserId>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "InitiativeDocument")]
pub struct Initiative {
    id: InitiativeId,
    created_by: UserId,
    #[serde(flatten)]
    fields: InitiativeFields,
    approval: Approval,
    revision: u64,
    audit: Audit,
}

impl Initiative {
    /// A freshly approved initiative at revision 0.
    #[must_use]
    pub fn new(id: InitiativeId, created_by: UserId, fields: InitiativeFields) -> Self {
        Self {
            id,
            created_by,
            fields,
            approval: Approval::Approved,
            revision: 0,
            audit: Audit::default(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> &InitiativeId {
        &self.id
    }

    #[must_use]
    pub const fn created_by(&self) -> &UserId {
        &self.created_by
    }

    #[must_use]
    pub const fn fields(&self) -> &InitiativeFields {
        &self.fields
    }

    #[must_use]
    pub const fn approval(&self) -> &Approval {
        &self.approval
    }

    #[must_use]
    pub const fn approval_kind(&self) -> ApprovalKind {
        self.approval.kind()
    }

    #[must_use]
    pub const fn pending_change(&self) -> Option<&StagedChange> {
        self.approval.staged()
    }

    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub const fn audit(&self) -> &Audit {
        &self.audit
    }

    #[must_use]
    pub const fn entity(&self) -> &EntityId {
        &self.fields.entity
    }

    #[must_use]
    pub const fn progress(&self) -> u8 {
        self.fields.progress
    }

    #[must_use]
    pub const fn status(&self) -> Status {
        self.fields.status
    }

    pub(crate) const fn fields_mut(&mut self) -> &mut InitiativeFields {
        &mut self.fields
    }

    pub(crate) const fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    pub(crate) fn set_approval(&mut self, approval: Approval) {
        self.approval = approval;
    }

    pub(crate) fn take_approval(&mut self) -> Approval {
        std::mem::take(&mut self.approval)
    }

    pub(crate) const fn bump_revision(&mut self) {
        self.revision += 1;
    }

    /// Same record with a different approval state (builders and tests).
    #[must_use]
    pub fn with_approval(mut self, approval: Approval) -> Self {
        self.approval = approval;
        self
    }
}

/// On-disk shape, tolerant of records written before the approval workflow
/// existed: no approval state means approved, no creator means the owner.
#[derive(Deserialize)]
struct InitiativeDocument {
    id: InitiativeId,
    #[serde(default)]
    created_by: Option<UserId>,
    #[serde(flatten)]
    fields: InitiativeFields,
    #[serde(default)]
    approval: Approval,
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    audit: Audit,
}

impl From<InitiativeDocument> for Initiative {
    fn from(doc: InitiativeDocument) -> Self {
        let created_by = doc
            .created_by
            .unwrap_or_else(|| UserId::new(doc.fields.owner.clone()));
        Self {
            id: doc.id,
            created_by,
            fields: doc.fields,
            approval: doc.approval,
            revision: doc.revision,
            audit: doc.audit,
        }
    }
}
