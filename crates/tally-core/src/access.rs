//! Access predicates over `(user, initiative)`.
//!
//! Every predicate fails closed: without a resolved user the answer is
//! always `false`. The `check_*` variants explain a refusal as a
//! [`WorkflowError`] so the facade can surface it unchanged.

use crate::error::{Action, DenyReason, WorkflowError};
use crate::model::{ApprovalKind, EntityId, Initiative, User};

/// Access evaluator bound to the (possibly absent) acting user.
#[derive(Debug, Clone, Copy)]
pub struct Access<'a> {
    user: Option<&'a User>,
}

impl<'a> Access<'a> {
    #[must_use]
    pub const fn new(user: Option<&'a User>) -> Self {
        Self { user }
    }

    #[must_use]
    pub const fn user(&self) -> Option<&'a User> {
        self.user
    }

    /// Admins see everything. Members see their own initiatives in any
    /// state, plus approved (or approved-with-pending-update) initiatives of
    /// their entity.
    #[must_use]
    pub fn can_view(&self, initiative: &Initiative) -> bool {
        let Some(user) = self.user else {
            return false;
        };
        if user.is_admin() || is_creator(user, initiative) {
            return true;
        }
        in_scope(user, initiative)
            && matches!(
                initiative.approval_kind(),
                ApprovalKind::Approved | ApprovalKind::PendingUpdate
            )
    }

    /// Whether the user may submit an update (members: own + approved only).
    #[must_use]
    pub fn can_edit(&self, initiative: &Initiative) -> bool {
        let Some(user) = self.user else {
            return false;
        };
        user.is_admin()
            || (is_creator(user, initiative)
                && initiative.approval_kind() == ApprovalKind::Approved)
    }

    #[must_use]
    pub fn can_delete(&self, initiative: &Initiative) -> bool {
        self.can_edit(initiative)
    }

    #[must_use]
    pub fn can_update_progress(&self, initiative: &Initiative) -> bool {
        let Some(user) = self.user else {
            return false;
        };
        user.is_admin()
            || is_creator(user, initiative)
            || (in_scope(user, initiative)
                && initiative.approval_kind() == ApprovalKind::Approved)
    }

    #[must_use]
    pub fn can_approve(&self) -> bool {
        self.user.is_some_and(User::is_admin)
    }

    #[must_use]
    pub fn can_reject(&self) -> bool {
        self.can_approve()
    }

    /// Whether the user may place an initiative in `entity`.
    #[must_use]
    pub fn can_create_in(&self, entity: &EntityId) -> bool {
        self.user
            .is_some_and(|user| user.is_admin() || user.entity().covers(entity))
    }

    /// The acting user, or `PermissionDenied(Unauthenticated)`.
    ///
    /// # Errors
    ///
    /// Fails when no user is resolved.
    pub fn require_user(&self, action: Action) -> Result<&'a User, WorkflowError> {
        self.user
            .ok_or_else(|| WorkflowError::denied(action, DenyReason::Unauthenticated))
    }

    /// # Errors
    ///
    /// Fails unless the user is an administrator.
    pub fn check_admin(&self, action: Action) -> Result<&'a User, WorkflowError> {
        let user = self.require_user(action)?;
        if user.is_admin() {
            Ok(user)
        } else {
            Err(WorkflowError::denied(action, DenyReason::Role))
        }
    }

    /// # Errors
    ///
    /// Fails when a member targets an entity other than their own.
    pub fn check_entity(&self, action: Action, entity: &EntityId) -> Result<&'a User, WorkflowError> {
        let user = self.require_user(action)?;
        if self.can_create_in(entity) {
            Ok(user)
        } else {
            Err(WorkflowError::denied(action, DenyReason::EntityScope))
        }
    }

    /// Explain [`Self::can_edit`] / [`Self::can_delete`].
    ///
    /// A creator whose initiative is not `Approved` gets `InvalidState`
    /// rather than a permission error: the request is blocked by the
    /// approval state, not by who they are.
    ///
    /// # Errors
    ///
    /// Fails when the edit or delete is not allowed.
    pub fn check_edit(&self, action: Action, initiative: &Initiative) -> Result<&'a User, WorkflowError> {
        let user = self.require_user(action)?;
        if self.can_edit(initiative) {
            return Ok(user);
        }
        if is_creator(user, initiative) {
            return Err(WorkflowError::InvalidState {
                action,
                state: initiative.approval_kind(),
            });
        }
        Err(WorkflowError::denied(action, scope_or_ownership(user, initiative)))
    }

    /// Explain [`Self::can_update_progress`].
    ///
    /// # Errors
    ///
    /// Fails when the progress update is not allowed.
    pub fn check_update_progress(&self, initiative: &Initiative) -> Result<&'a User, WorkflowError> {
        let user = self.require_user(Action::UpdateProgress)?;
        if self.can_update_progress(initiative) {
            Ok(user)
        } else {
            Err(WorkflowError::denied(
                Action::UpdateProgress,
                scope_or_ownership(user, initiative),
            ))
        }
    }
}

fn is_creator(user: &User, initiative: &Initiative) -> bool {
    initiative.created_by() == user.id()
}

fn in_scope(user: &User, initiative: &Initiative) -> bool {
    user.entity().covers(initiative.entity())
}

fn scope_or_ownership(user: &User, initiative: &Initiative) -> DenyReason {
    if in_scope(user, initiative) {
        DenyReason::Ownership
    } else {
        DenyReason::EntityScope
    }
}
