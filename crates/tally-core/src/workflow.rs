//! Approval state machine as pure transitions over [`Initiative`] values.
//!
//! | From          | Event  | Admin                  | Member                   |
//! |---------------|--------|------------------------|--------------------------|
//! | (none)        | create | `Approved`             | `PendingCreate`          |
//! | Approved      | update | in place               | `PendingUpdate` (staged) |
//! | Approved      | delete | removed                | `PendingDelete`          |
//! | PendingCreate | approve / reject | `Approved` / `Rejected` | |
//! | PendingUpdate | approve / reject | merged / discarded, `Approved` | |
//! | PendingDelete | approve / reject | removed / `Approved` | |
//!
//! Access checks happen before these functions are called; the functions
//! only enforce approval-state rules and field validation. Nothing here
//! touches a store or a notifier.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::error::{Action, ValidationError, WorkflowError};
use crate::model::{
    Approval, ApprovalKind, Initiative, InitiativeFields, InitiativeId, PERCENT_MAX, Proposal,
    StagedChange, Status, User, UserId,
};
use crate::rollup::{self, UrgencyThresholds};

/// Everything a transition needs besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub actor: &'a User,
    pub now: DateTime<Utc>,
    pub thresholds: UrgencyThresholds,
}

impl Context<'_> {
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    fn refresh(&self, fields: &mut InitiativeFields) {
        rollup::refresh(fields, self.today(), self.thresholds);
    }
}

/// What a transition did, used for logging and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    Created,
    SubmittedCreate,
    Updated,
    SubmittedUpdate,
    Deleted,
    SubmittedDelete,
    ProgressUpdated,
    ProgressStaged,
    ApprovedCreate,
    ApprovedUpdate,
    ApprovedDelete,
    RejectedCreate,
    RejectedUpdate,
    RejectedDelete,
    StatusSet,
}

impl Effect {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::SubmittedCreate => "submitted_create",
            Self::Updated => "updated",
            Self::SubmittedUpdate => "submitted_update",
            Self::Deleted => "deleted",
            Self::SubmittedDelete => "submitted_delete",
            Self::ProgressUpdated => "progress_updated",
            Self::ProgressStaged => "progress_staged",
            Self::ApprovedCreate => "approved_create",
            Self::ApprovedUpdate => "approved_update",
            Self::ApprovedDelete => "approved_delete",
            Self::RejectedCreate => "rejected_create",
            Self::RejectedUpdate => "rejected_update",
            Self::RejectedDelete => "rejected_delete",
            Self::StatusSet => "status_set",
        }
    }

    /// Whether this effect queues a request for administrator review.
    #[must_use]
    pub const fn needs_review(self) -> bool {
        matches!(
            self,
            Self::SubmittedCreate | Self::SubmittedUpdate | Self::SubmittedDelete | Self::ProgressStaged
        )
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the record goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// Upsert this record.
    Put(Initiative),
    /// Delete this record (carried for notifications).
    Remove(Initiative),
}

impl Next {
    #[must_use]
    pub const fn initiative(&self) -> &Initiative {
        match self {
            Self::Put(initiative) | Self::Remove(initiative) => initiative,
        }
    }
}

/// Outcome of a pure transition, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: Next,
    pub effect: Effect,
    pub from: Option<ApprovalKind>,
    /// The staged change was based on an older revision than the one it
    /// was merged into.
    pub conflict: bool,
}

impl Transition {
    fn put(initiative: Initiative, effect: Effect, from: Option<ApprovalKind>) -> Self {
        Self {
            next: Next::Put(initiative),
            effect,
            from,
            conflict: false,
        }
    }

    fn remove(initiative: Initiative, effect: Effect, from: ApprovalKind) -> Self {
        Self {
            next: Next::Remove(initiative),
            effect,
            from: Some(from),
            conflict: false,
        }
    }

    /// Approval state after the transition (`None` once removed).
    #[must_use]
    pub fn to(&self) -> Option<ApprovalKind> {
        match &self.next {
            Next::Put(initiative) => Some(initiative.approval_kind()),
            Next::Remove(_) => None,
        }
    }
}

/// Which progress value a progress update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressTarget {
    /// Key activity by zero-based position.
    Activity(usize),
    /// The initiative's own progress; only valid without key activities.
    Overall,
}

/// Build a new initiative. Admin-created records start `Approved`,
/// member-created ones start `PendingCreate`.
///
/// # Errors
///
/// Returns a validation error for malformed proposals.
pub fn create(ctx: &Context<'_>, id: InitiativeId, proposal: Proposal) -> Result<Transition, WorkflowError> {
    proposal.validate()?;
    let mut fields = InitiativeFields::from_proposal(proposal, Status::NotStarted);
    ctx.refresh(&mut fields);

    let mut initiative = Initiative::new(id, ctx.actor.id().clone(), fields);
    stamp_updated(&mut initiative, ctx);
    if ctx.actor.is_admin() {
        stamp_approved(&mut initiative, ctx);
        Ok(Transition::put(initiative, Effect::Created, None))
    } else {
        initiative.set_approval(Approval::PendingCreate);
        Ok(Transition::put(initiative, Effect::SubmittedCreate, None))
    }
}

/// Replace the mutable fields with `proposal`.
///
/// Admins edit in place and keep the current approval state. Members stage
/// the change (the live fields stay untouched until approval).
///
/// # Errors
///
/// Returns a validation error for malformed proposals, or `InvalidState`
/// when a member's initiative is not `Approved`.
pub fn update(ctx: &Context<'_>, mut current: Initiative, proposal: Proposal) -> Result<Transition, WorkflowError> {
    proposal.validate()?;
    let from = current.approval_kind();
    let mut fields = merge_proposal(current.fields(), proposal);
    ctx.refresh(&mut fields);

    if ctx.actor.is_admin() {
        *current.fields_mut() = fields;
        current.bump_revision();
        stamp_updated(&mut current, ctx);
        return Ok(Transition::put(current, Effect::Updated, Some(from)));
    }

    require_state(Action::Update, from, &[ApprovalKind::Approved])?;
    let change = stage(ctx, &current, fields);
    current.set_approval(Approval::PendingUpdate(change));
    Ok(Transition::put(current, Effect::SubmittedUpdate, Some(from)))
}

/// Remove immediately (admin) or request removal (member).
///
/// # Errors
///
/// Returns `InvalidState` when a member's initiative is not `Approved`.
pub fn delete(ctx: &Context<'_>, mut current: Initiative) -> Result<Transition, WorkflowError> {
    let from = current.approval_kind();
    if ctx.actor.is_admin() {
        return Ok(Transition::remove(current, Effect::Deleted, from));
    }

    require_state(Action::Delete, from, &[ApprovalKind::Approved])?;
    current.set_approval(Approval::PendingDelete {
        requested_by: ctx.actor.id().clone(),
        requested_at: ctx.now,
    });
    Ok(Transition::put(current, Effect::SubmittedDelete, Some(from)))
}

/// Set one progress value and re-run the rollup.
///
/// Admins write the live fields in any state. Members write the live fields
/// only of their own `PendingCreate` proposal; on an `Approved` record the
/// edit is staged as a `PendingUpdate`, and on a `PendingUpdate` record the
/// staged change is amended.
///
/// # Errors
///
/// Returns a validation error for an out-of-range value or unknown
/// activity, or `InvalidState` for members on `PendingDelete`/`Rejected`.
pub fn update_progress(
    ctx: &Context<'_>,
    mut current: Initiative,
    target: ProgressTarget,
    progress: u8,
) -> Result<Transition, WorkflowError> {
    let from = current.approval_kind();

    if ctx.actor.is_admin() {
        apply_progress(current.fields_mut(), target, progress)?;
        ctx.refresh(current.fields_mut());
        current.bump_revision();
        stamp_updated(&mut current, ctx);
        return Ok(Transition::put(current, Effect::ProgressUpdated, Some(from)));
    }

    match current.take_approval() {
        Approval::Approved => {
            let mut fields = current.fields().clone();
            apply_progress(&mut fields, target, progress)?;
            ctx.refresh(&mut fields);
            let change = stage(ctx, &current, fields);
            current.set_approval(Approval::PendingUpdate(change));
            Ok(Transition::put(current, Effect::ProgressStaged, Some(from)))
        }
        Approval::PendingUpdate(mut change) => {
            apply_progress(&mut change.fields, target, progress)?;
            ctx.refresh(&mut change.fields);
            change.submitted_by = ctx.actor.id().clone();
            change.submitted_at = ctx.now;
            current.set_approval(Approval::PendingUpdate(change));
            Ok(Transition::put(current, Effect::ProgressStaged, Some(from)))
        }
        Approval::PendingCreate => {
            current.set_approval(Approval::PendingCreate);
            apply_progress(current.fields_mut(), target, progress)?;
            ctx.refresh(current.fields_mut());
            current.bump_revision();
            stamp_updated(&mut current, ctx);
            Ok(Transition::put(current, Effect::ProgressUpdated, Some(from)))
        }
        Approval::PendingDelete { .. } | Approval::Rejected => Err(WorkflowError::InvalidState {
            action: Action::UpdateProgress,
            state: from,
        }),
    }
}

/// Resolve a pending request in the requester's favour.
///
/// Approving a `PendingUpdate` replaces every mutable field with the staged
/// values and re-runs the rollup on the merged activity list.
///
/// # Errors
///
/// Returns `InvalidState` unless the initiative is `Pending*`.
pub fn approve(ctx: &Context<'_>, mut current: Initiative) -> Result<Transition, WorkflowError> {
    let from = current.approval_kind();
    match current.take_approval() {
        Approval::PendingCreate => {
            stamp_approved(&mut current, ctx);
            Ok(Transition::put(current, Effect::ApprovedCreate, Some(from)))
        }
        Approval::PendingUpdate(change) => {
            let conflict = change.base_revision != current.revision();
            if conflict {
                debug!(
                    initiative = %current.id(),
                    base = change.base_revision,
                    current = current.revision(),
                    "staged change is based on an older revision"
                );
            }
            apply_staged(current.fields_mut(), change.fields);
            ctx.refresh(current.fields_mut());
            current.bump_revision();
            stamp_updated(&mut current, ctx);
            stamp_approved(&mut current, ctx);
            let mut transition = Transition::put(current, Effect::ApprovedUpdate, Some(from));
            transition.conflict = conflict;
            Ok(transition)
        }
        Approval::PendingDelete { .. } => {
            Ok(Transition::remove(current, Effect::ApprovedDelete, from))
        }
        Approval::Approved | Approval::Rejected => Err(WorkflowError::InvalidState {
            action: Action::Approve,
            state: from,
        }),
    }
}

/// Resolve a pending request against the requester.
///
/// Only a `PendingCreate` becomes `Rejected`. A rejected update or delete
/// returns the record to `Approved` exactly as it was before the request.
///
/// # Errors
///
/// Returns `InvalidState` unless the initiative is `Pending*`.
pub fn reject(ctx: &Context<'_>, mut current: Initiative, reason: &str) -> Result<Transition, WorkflowError> {
    let from = current.approval_kind();
    match current.take_approval() {
        Approval::PendingCreate => {
            current.set_approval(Approval::Rejected);
            let audit = current.audit_mut();
            audit.rejected_by = Some(ctx.actor.id().clone());
            audit.rejected_at = Some(ctx.now);
            audit.rejection_reason = normalize_reason(reason);
            Ok(Transition::put(current, Effect::RejectedCreate, Some(from)))
        }
        Approval::PendingUpdate(_) => {
            Ok(Transition::put(current, Effect::RejectedUpdate, Some(from)))
        }
        Approval::PendingDelete { .. } => {
            Ok(Transition::put(current, Effect::RejectedDelete, Some(from)))
        }
        Approval::Approved | Approval::Rejected => Err(WorkflowError::InvalidState {
            action: Action::Reject,
            state: from,
        }),
    }
}

/// Pin or clear an explicit status.
///
/// `Hold`, `CarryOver` and `Cancelled` are stored as given. Any other value
/// clears the pin and lets the rollup derive the status again.
#[must_use]
pub fn set_status(ctx: &Context<'_>, mut current: Initiative, status: Status) -> Transition {
    let from = current.approval_kind();
    let fields = current.fields_mut();
    fields.status = if status.is_admin_assigned() {
        status
    } else {
        Status::NotStarted
    };
    ctx.refresh(current.fields_mut());
    current.bump_revision();
    stamp_updated(&mut current, ctx);
    Transition::put(current, Effect::StatusSet, Some(from))
}

/// Build the full field set a proposal describes on top of `base`.
///
/// Derived fields (`urgency`, `status`) start from `base` and are expected
/// to be refreshed by the caller.
#[must_use]
pub fn merge_proposal(base: &InitiativeFields, proposal: Proposal) -> InitiativeFields {
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
    InitiativeFields {
        name,
        owner,
        entity,
        due_date,
        urgency: base.urgency,
        budget,
        cost,
        status: base.status,
        progress,
        key_activities,
        output,
        indicators,
    }
}

/// Overwrite every mutable field of `live` with `staged` (last write wins).
pub fn apply_staged(live: &mut InitiativeFields, staged: InitiativeFields) {
    let InitiativeFields {
        name,
        owner,
        entity,
        due_date,
        urgency,
        budget,
        cost,
        status,
        progress,
        key_activities,
        output,
        indicators,
    } = staged;
    live.name = name;
    live.owner = owner;
    live.entity = entity;
    live.due_date = due_date;
    live.urgency = urgency;
    live.budget = budget;
    live.cost = cost;
    live.status = status;
    live.progress = progress;
    live.key_activities = key_activities;
    live.output = output;
    live.indicators = indicators;
}

fn stage(ctx: &Context<'_>, current: &Initiative, fields: InitiativeFields) -> StagedChange {
    StagedChange {
        fields,
        submitted_by: ctx.actor.id().clone(),
        submitted_at: ctx.now,
        base_revision: current.revision(),
    }
}

fn apply_progress(fields: &mut InitiativeFields, target: ProgressTarget, progress: u8) -> Result<(), ValidationError> {
    match target {
        ProgressTarget::Activity(index) => {
            let len = fields.key_activities.len();
            let activity = fields
                .key_activities
                .get_mut(index)
                .ok_or(ValidationError::UnknownActivity { index, len })?;
            if progress > PERCENT_MAX {
                return Err(ValidationError::ProgressOutOfRange {
                    target: activity.name.clone(),
                    value: progress,
                });
            }
            activity.progress = progress;
        }
        ProgressTarget::Overall => {
            if !fields.key_activities.is_empty() {
                return Err(ValidationError::DerivedProgress);
            }
            if progress > PERCENT_MAX {
                return Err(ValidationError::ProgressOutOfRange {
                    target: fields.name.clone(),
                    value: progress,
                });
            }
            fields.progress = progress;
        }
    }
    Ok(())
}

fn require_state(action: Action, state: ApprovalKind, allowed: &[ApprovalKind]) -> Result<(), WorkflowError> {
    if allowed.contains(&state) {
        Ok(())
    } else {
        Err(WorkflowError::InvalidState { action, state })
    }
}

fn stamp_updated(initiative: &mut Initiative, ctx: &Context<'_>) {
    let audit = initiative.audit_mut();
    audit.updated_by = Some(ctx.actor.id().clone());
    audit.updated_at = Some(ctx.now);
}

fn stamp_approved(initiative: &mut Initiative, ctx: &Context<'_>) {
    let audit = initiative.audit_mut();
    audit.approved_by = Some(ctx.actor.id().clone());
    audit.approved_at = Some(ctx.now);
}

fn normalize_reason(reason: &str) -> Option<String> {
    let trimmed = reason.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// The user a resolution should be reported to besides the creator.
#[must_use]
pub fn requester(current: &Initiative) -> Option<&UserId> {
    match current.approval() {
        Approval::PendingUpdate(change) => Some(&change.submitted_by),
        Approval::PendingDelete { requested_by, .. } => Some(requested_by),
        Approval::PendingCreate | Approval::Approved | Approval::Rejected => None,
    }
}
