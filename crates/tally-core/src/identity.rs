//! Resolution of the acting user.
//!
//! The engine never keeps a "current session"; every facade call receives
//! an [`IdentityContext`] and asks it who is acting.

use tracing::debug;

use crate::model::{User, UserId};

pub trait IdentityContext {
    /// The acting user, or `None` when nobody is authenticated.
    fn current_user(&self) -> Option<User>;
}

/// A fixed answer, optionally anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentity(Option<User>);

impl StaticIdentity {
    #[must_use]
    pub const fn new(user: User) -> Self {
        Self(Some(user))
    }

    #[must_use]
    pub const fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityContext for StaticIdentity {
    fn current_user(&self) -> Option<User> {
        self.0.clone()
    }
}

impl IdentityContext for User {
    fn current_user(&self) -> Option<User> {
        Some(self.clone())
    }
}

/// The set of known users, as listed in the project config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    users: Vec<User>,
}

impl Directory {
    #[must_use]
    pub const fn new(users: Vec<User>) -> Self {
        Self { users }
    }

    #[must_use]
    pub fn lookup(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|user| user.id() == id)
    }

    /// Identity for a claimed id. Unknown or missing ids resolve to an
    /// anonymous identity, so every operation fails closed.
    #[must_use]
    pub fn resolve(&self, claimed: Option<&str>) -> StaticIdentity {
        let Some(raw) = claimed.map(str::trim).filter(|s| !s.is_empty()) else {
            return StaticIdentity::anonymous();
        };
        match self.lookup(&UserId::new(raw)) {
            Some(user) => StaticIdentity::new(user.clone()),
            None => {
                debug!(user = raw, "user not in directory");
                StaticIdentity::anonymous()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Directory {
        Directory::new(vec![User::admin("root"), User::member("dina", "sgn")])
    }

    #[test]
    fn resolves_known_users() {
        let identity = directory().resolve(Some("dina"));
        assert_eq!(identity.current_user(), Some(User::member("dina", "sgn")));
    }

    #[test]
    fn unknown_or_blank_ids_are_anonymous() {
        assert_eq!(directory().resolve(Some("mallory")).current_user(), None);
        assert_eq!(directory().resolve(Some("  ")).current_user(), None);
        assert_eq!(directory().resolve(None).current_user(), None);
    }

    #[test]
    fn user_is_its_own_identity() {
        let admin = User::admin("root");
        assert_eq!(admin.current_user(), Some(admin.clone()));
        assert_eq!(StaticIdentity::default().current_user(), None);
    }
}
