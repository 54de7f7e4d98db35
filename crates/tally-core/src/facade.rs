//! The single entry surface for collaborators (CLI, forms, HTTP handlers).
//!
//! Every mutating call follows the same order: resolve identity, load the
//! record, check access, run the pure transition, persist, then notify.
//! Nothing is persisted before all checks pass, and notifications are only
//! sent after the store accepted the write.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::access::Access;
use crate::alerts::{self, Alert};
use crate::clock::Clock;
use crate::error::{Action, ValidationError, WorkflowError};
use crate::identity::IdentityContext;
use crate::model::{
    ApprovalKind, EntityId, Initiative, InitiativeId, Proposal, Status, User, UserId,
};
use crate::notify::{Inbox, Notice, NotificationKind, Notification, Notifier, Recipient};
use crate::rollup::UrgencyThresholds;
use crate::store::RecordStore;
use crate::visibility::{self, Stats};
use crate::workflow::{self, Context, Effect, Next, ProgressTarget, Transition};

const MAX_ID_ATTEMPTS: u64 = 16;

/// Tunables the engine reads on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub urgency: UrgencyThresholds,
    pub high_progress_threshold: u8,
    /// Allowed entities; empty accepts any.
    pub entities: Vec<EntityId>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            urgency: UrgencyThresholds::default(),
            high_progress_threshold: 75,
            entities: Vec::new(),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn from_config(config: &crate::config::ProjectConfig) -> Self {
        Self {
            urgency: config.urgency,
            high_progress_threshold: config.alerts.high_progress_threshold,
            entities: config.entities.clone(),
        }
    }
}

/// Result of a mutating facade call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// The record as the caller may see it; `None` after a removal.
    pub initiative: Option<Initiative>,
    #[serde(serialize_with = "serialize_effect")]
    pub effect: Effect,
    /// A staged change was merged over a newer revision.
    pub conflict: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_effect<S: serde::Serializer>(effect: &Effect, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(effect.as_str())
}

/// Access control and approval workflow over a record store and a notifier.
#[derive(Debug)]
pub struct Engine<S, N, C> {
    store: S,
    notifier: N,
    clock: C,
    settings: Settings,
}

impl<S: RecordStore, N: Notifier, C: Clock> Engine<S, N, C> {
    pub fn new(store: S, notifier: N, clock: C) -> Self {
        Self::with_settings(store, notifier, clock, Settings::default())
    }

    pub const fn with_settings(store: S, notifier: N, clock: C, settings: Settings) -> Self {
        Self {
            store,
            notifier,
            clock,
            settings,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    pub const fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Create an initiative: approved immediately for admins, queued as
    /// `PendingCreate` for members.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without a user or outside the member's entity,
    /// `Validation` for malformed input, `StorageUnavailable` on store failure.
    pub fn submit_create(&mut self, identity: &dyn IdentityContext, proposal: Proposal) -> Result<Outcome, WorkflowError> {
        let user = identity.current_user();
        let access = Access::new(user.as_ref());
        let actor = access.check_entity(Action::Create, &proposal.entity)?;
        self.check_known_entity(&proposal.entity)?;

        let ctx = self.context(actor);
        let id = self.fresh_id(actor.id(), &proposal.name)?;
        let transition = workflow::create(&ctx, id, proposal)?;
        self.commit(&ctx, transition, None, None)
    }

    /// Replace an initiative's mutable fields (admins) or stage the change
    /// for approval (members, own approved initiatives only).
    ///
    /// # Errors
    ///
    /// `NotFound` when the id is unknown or invisible, `PermissionDenied`,
    /// `InvalidState` when a member's initiative is not approved,
    /// `Validation`, `StorageUnavailable`.
    pub fn submit_update(
        &mut self,
        identity: &dyn IdentityContext,
        id: &InitiativeId,
        proposal: Proposal,
    ) -> Result<Outcome, WorkflowError> {
        let user = identity.current_user();
        let access = Access::new(user.as_ref());
        access.require_user(Action::Update)?;
        let current = self.load_visible(&access, id)?;
        let actor = access.check_edit(Action::Update, &current)?;
        access.check_entity(Action::Update, &proposal.entity)?;
        self.check_known_entity(&proposal.entity)?;

        let ctx = self.context(actor);
        let transition = workflow::update(&ctx, current, proposal)?;
        self.commit(&ctx, transition, None, None)
    }

    /// Delete immediately (admins) or request deletion (members).
    ///
    /// # Errors
    ///
    /// `NotFound`, `PermissionDenied`, `InvalidState`, `StorageUnavailable`.
    pub fn submit_delete(&mut self, identity: &dyn IdentityContext, id: &InitiativeId) -> Result<Outcome, WorkflowError> {
        let user = identity.current_user();
        let access = Access::new(user.as_ref());
        access.require_user(Action::Delete)?;
        let current = self.load_visible(&access, id)?;
        let actor = access.check_edit(Action::Delete, &current)?;

        let ctx = self.context(actor);
        let transition = workflow::delete(&ctx, current)?;
        self.commit(&ctx, transition, None, None)
    }

    /// Set the progress of one key activity (or of the initiative itself
    /// when it has none) and re-run the rollup.
    ///
    /// # Errors
    ///
    /// `NotFound`, `PermissionDenied`, `InvalidState`, `Validation`,
    /// `StorageUnavailable`.
    pub fn update_activity_progress(
        &mut self,
        identity: &dyn IdentityContext,
        id: &InitiativeId,
        target: ProgressTarget,
        progress: u8,
    ) -> Result<Outcome, WorkflowError> {
        let user = identity.current_user();
        let access = Access::new(user.as_ref());
        access.require_user(Action::UpdateProgress)?;
        let current = self.load_visible(&access, id)?;
        let actor = access.check_update_progress(&current)?;

        let ctx = self.context(actor);
        let transition = workflow::update_progress(&ctx, current, target, progress)?;
        self.commit(&ctx, transition, None, None)
    }

    /// Approve a pending request. `note` is appended to the notification.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for non-admins, `NotFound`, `InvalidState` unless
    /// pending, `StorageUnavailable`.
    pub fn approve(
        &mut self,
        identity: &dyn IdentityContext,
        id: &InitiativeId,
        note: Option<&str>,
    ) -> Result<Outcome, WorkflowError> {
        let user = identity.current_user();
        let access = Access::new(user.as_ref());
        let actor = access.check_admin(Action::Approve)?;
        let current = self.load(id)?;
        let requester = workflow::requester(&current).cloned();

        let ctx = self.context(actor);
        let transition = workflow::approve(&ctx, current)?;
        self.commit(&ctx, transition, requester, note)
    }

    /// Reject a pending request. The reason is included in the creator's
    /// notification; an empty reason is allowed.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for non-admins, `NotFound`, `InvalidState` unless
    /// pending, `StorageUnavailable`.
    pub fn reject(&mut self, identity: &dyn IdentityContext, id: &InitiativeId, reason: &str) -> Result<Outcome, WorkflowError> {
        let user = identity.current_user();
        let access = Access::new(user.as_ref());
        let actor = access.check_admin(Action::Reject)?;
        let current = self.load(id)?;
        let requester = workflow::requester(&current).cloned();

        let ctx = self.context(actor);
        let transition = workflow::reject(&ctx, current, reason)?;
        self.commit(&ctx, transition, requester, Some(reason))
    }

    /// Pin `Hold`/`CarryOver`/`Cancelled`, or clear the pin with any other
    /// status. Admin only.
    ///
    /// # Errors
    ///
    /// `PermissionDenied`, `NotFound`, `StorageUnavailable`.
    pub fn set_status(&mut self, identity: &dyn IdentityContext, id: &InitiativeId, status: Status) -> Result<Outcome, WorkflowError> {
        let user = identity.current_user();
        let access = Access::new(user.as_ref());
        let actor = access.check_admin(Action::SetStatus)?;
        let current = self.load(id)?;

        let ctx = self.context(actor);
        let transition = workflow::set_status(&ctx, current, status);
        self.commit(&ctx, transition, None, None)
    }

    /// Everything the caller may see, in store order. Anonymous callers get
    /// an empty list.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` when the store cannot be read.
    pub fn list(&self, identity: &dyn IdentityContext) -> Result<Vec<Initiative>, WorkflowError> {
        let user = identity.current_user();
        if user.is_none() {
            debug!("list without a current user");
            return Ok(Vec::new());
        }
        Ok(visibility::filter_for_user(user.as_ref(), self.store.list()?))
    }

    /// One initiative, if the caller may see it.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without a user, `NotFound` when missing or not
    /// visible, `StorageUnavailable`.
    pub fn show(&self, identity: &dyn IdentityContext, id: &InitiativeId) -> Result<Initiative, WorkflowError> {
        let user = identity.current_user();
        let access = Access::new(user.as_ref());
        access.require_user(Action::View)?;
        self.load_visible(&access, id)
    }

    /// Requests awaiting review, in store order. Admin only.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for non-admins, `StorageUnavailable`.
    pub fn pending(&self, identity: &dyn IdentityContext) -> Result<Vec<Initiative>, WorkflowError> {
        let user = identity.current_user();
        Access::new(user.as_ref()).check_admin(Action::ReviewQueue)?;
        Ok(visibility::pending_queue(self.store.list()?))
    }

    /// Badge count for the review queue; zero for non-admins.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable`.
    pub fn pending_count(&self, identity: &dyn IdentityContext) -> Result<usize, WorkflowError> {
        match self.pending(identity) {
            Ok(queue) => Ok(queue.len()),
            Err(WorkflowError::PermissionDenied { .. }) => Ok(0),
            Err(err) => Err(err),
        }
    }

    /// Dashboard figures over the caller's visible set.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable`.
    pub fn stats(&self, identity: &dyn IdentityContext) -> Result<Stats, WorkflowError> {
        Ok(visibility::entity_stats(&self.list(identity)?))
    }

    /// Deadline and progress alerts over the caller's visible set.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable`.
    pub fn alerts(&self, identity: &dyn IdentityContext) -> Result<Vec<Alert>, WorkflowError> {
        let visible = self.list(identity)?;
        Ok(alerts::alerts_for(
            &visible,
            self.today(),
            self.settings.high_progress_threshold,
        ))
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    fn context<'u>(&self, actor: &'u User) -> Context<'u> {
        Context {
            actor,
            now: self.clock.now(),
            thresholds: self.settings.urgency,
        }
    }

    fn check_known_entity(&self, entity: &EntityId) -> Result<(), ValidationError> {
        if self.settings.entities.is_empty() || self.settings.entities.contains(entity) {
            Ok(())
        } else {
            Err(ValidationError::UnknownEntity(entity.clone()))
        }
    }

    fn fresh_id(&self, creator: &UserId, name: &str) -> Result<InitiativeId, WorkflowError> {
        let now = self.clock.now();
        for salt in 0..MAX_ID_ATTEMPTS {
            let id = InitiativeId::generate(creator, name, now, salt);
            if !self.store.contains(&id)? {
                return Ok(id);
            }
            debug!(%id, salt, "initiative id collision, retrying");
        }
        Err(crate::error::StoreError::Unavailable(
            "could not allocate a unique initiative id".to_string(),
        )
        .into())
    }

    fn load(&self, id: &InitiativeId) -> Result<Initiative, WorkflowError> {
        self.store
            .get(id)?
            .ok_or_else(|| WorkflowError::NotFound(id.clone()))
    }

    /// Load and hide records the caller may not see behind `NotFound`.
    fn load_visible(&self, access: &Access<'_>, id: &InitiativeId) -> Result<Initiative, WorkflowError> {
        let initiative = self.load(id)?;
        if access.can_view(&initiative) {
            Ok(initiative)
        } else {
            debug!(initiative = %id, "not visible to caller");
            Err(WorkflowError::NotFound(id.clone()))
        }
    }

    fn commit(
        &mut self,
        ctx: &Context<'_>,
        transition: Transition,
        requester: Option<UserId>,
        note: Option<&str>,
    ) -> Result<Outcome, WorkflowError> {
        let Transition {
            next,
            effect,
            from,
            conflict,
        } = transition;

        match &next {
            Next::Put(initiative) => self.store.put(initiative)?,
            Next::Remove(initiative) => self.store.delete(initiative.id())?,
        }

        let record = next.initiative();
        let to = match &next {
            Next::Put(initiative) => initiative.approval_kind().as_str(),
            Next::Remove(_) => "removed",
        };
        info!(
            initiative = %record.id(),
            actor = %ctx.actor.id(),
            effect = %effect,
            from = from.map_or("none", ApprovalKind::as_str),
            to,
            "transition committed"
        );
        if conflict {
            warn!(
                initiative = %record.id(),
                revision = record.revision(),
                "approved a change staged against an older revision; last write wins"
            );
        }

        for notice in notices(ctx, effect, record, requester.as_ref(), note) {
            let kind = notice.kind;
            if let Err(err) = self.notifier.notify(notice) {
                warn!(initiative = %record.id(), %kind, error = %err, "notification failed");
            }
        }

        let access = Access::new(Some(ctx.actor));
        let initiative = match next {
            Next::Put(initiative) if access.can_view(&initiative) => Some(initiative),
            Next::Put(_) | Next::Remove(_) => None,
        };
        Ok(Outcome {
            initiative,
            effect,
            conflict,
        })
    }
}

impl<S: RecordStore, N: Notifier + Inbox, C: Clock> Engine<S, N, C> {
    /// Notifications addressed to the caller, newest first.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without a user, `StorageUnavailable`.
    pub fn inbox(&self, identity: &dyn IdentityContext) -> Result<Vec<Notification>, WorkflowError> {
        let user = identity.current_user();
        let user = Access::new(user.as_ref()).require_user(Action::View)?.clone();
        Ok(self.notifier.inbox(&user)?)
    }

    /// Mark a notification read. Returns `false` if it is not in the
    /// caller's inbox.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without a user, `StorageUnavailable`.
    pub fn mark_read(&mut self, identity: &dyn IdentityContext, id: u64) -> Result<bool, WorkflowError> {
        let user = identity.current_user();
        let user = Access::new(user.as_ref()).require_user(Action::View)?.clone();
        Ok(self.notifier.mark_read(&user, id)?)
    }

    /// # Errors
    ///
    /// `StorageUnavailable`. Anonymous callers get zero.
    pub fn unread_count(&self, identity: &dyn IdentityContext) -> Result<usize, WorkflowError> {
        match identity.current_user() {
            Some(user) => Ok(self.notifier.unread_count(&user)?),
            None => Ok(0),
        }
    }
}

/// Notifications implied by a committed transition.
#[allow(clippy::too_many_lines)]
fn notices(
    ctx: &Context<'_>,
    effect: Effect,
    initiative: &Initiative,
    requester: Option<&UserId>,
    note: Option<&str>,
) -> Vec<Notice> {
    let actor = ctx.actor.id();
    let name = &initiative.fields().name;
    let creator = initiative.created_by();
    let note = note.map(str::trim).filter(|n| !n.is_empty());
    let reason = note.map(|n| format!(" Reason: {n}")).unwrap_or_default();
    let remark = note.map(|n| format!(" Note: {n}")).unwrap_or_default();

    let notice = |recipient: Recipient, kind: NotificationKind, message: String| Notice {
        recipient,
        kind,
        message,
        initiative: Some(initiative.id().clone()),
        at: ctx.now,
    };
    // creator first, then whoever submitted the request if different
    let involved = || {
        let mut users = vec![creator.clone()];
        if let Some(requester) = requester.filter(|r| *r != creator) {
            users.push(requester.clone());
        }
        users
    };
    let to_involved = |kind: NotificationKind, message: String| -> Vec<Notice> {
        involved()
            .into_iter()
            .map(|user| notice(Recipient::User(user), kind, message.clone()))
            .collect()
    };

    match effect {
        Effect::Created => Vec::new(),
        Effect::SubmittedCreate => vec![notice(
            Recipient::Admins,
            NotificationKind::ApprovalRequest,
            format!("\"{name}\" submitted by {actor} requires your approval."),
        )],
        Effect::SubmittedUpdate => vec![notice(
            Recipient::Admins,
            NotificationKind::ApprovalRequest,
            format!("Update to \"{name}\" submitted by {actor} requires your approval."),
        )],
        Effect::ProgressStaged => vec![notice(
            Recipient::Admins,
            NotificationKind::ApprovalRequest,
            format!("Progress update to \"{name}\" submitted by {actor} requires your approval."),
        )],
        Effect::SubmittedDelete => vec![notice(
            Recipient::Admins,
            NotificationKind::ApprovalRequest,
            format!("Deletion of \"{name}\" requested by {actor} requires your approval."),
        )],
        Effect::ApprovedCreate => to_involved(
            NotificationKind::Approved,
            format!("Your initiative \"{name}\" has been approved by {actor}.{remark}"),
        ),
        Effect::ApprovedUpdate => to_involved(
            NotificationKind::ApprovedUpdate,
            format!("Your update to \"{name}\" has been approved by {actor}.{remark}"),
        ),
        Effect::ApprovedDelete => to_involved(
            NotificationKind::ApprovedDelete,
            format!("Your request to delete \"{name}\" has been approved by {actor}.{remark}"),
        ),
        Effect::RejectedCreate => to_involved(
            NotificationKind::Rejected,
            format!("Your initiative \"{name}\" was not approved.{reason}"),
        ),
        Effect::RejectedUpdate => to_involved(
            NotificationKind::RejectedUpdate,
            format!("Your update to \"{name}\" was not approved.{reason}"),
        ),
        Effect::RejectedDelete => to_involved(
            NotificationKind::RejectedDelete,
            format!("Your request to delete \"{name}\" was not approved.{reason}"),
        ),
        Effect::ProgressUpdated if ctx.actor.is_admin() && creator != actor => vec![notice(
            Recipient::Broadcast,
            NotificationKind::ProgressUpdated,
            format!(
                "Progress on \"{name}\" updated to {}% by {actor}.",
                initiative.progress()
            ),
        )],
        Effect::Deleted if creator != actor => vec![notice(
            Recipient::User(creator.clone()),
            NotificationKind::Deleted,
            format!("Your initiative \"{name}\" was deleted by {actor}."),
        )],
        Effect::Updated if creator != actor => vec![notice(
            Recipient::User(creator.clone()),
            NotificationKind::Info,
            format!("Your initiative \"{name}\" was updated by {actor}."),
        )],
        Effect::StatusSet if creator != actor => vec![notice(
            Recipient::User(creator.clone()),
            NotificationKind::Info,
            format!(
                "Status of \"{name}\" set to {} by {actor}.",
                initiative.status()
            ),
        )],
        Effect::ProgressUpdated | Effect::Deleted | Effect::Updated | Effect::StatusSet => Vec::new(),
    }
}
