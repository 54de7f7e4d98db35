use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ParseEnumError;

/// Identifier of an acting user (their login name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// An organizational business unit that scopes a member's visibility.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `All` is reserved for the administrator scope and never names a unit.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.0.trim().eq_ignore_ascii_case(ALL_ENTITIES)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

const ALL_ENTITIES: &str = "All";

/// The two roles an acting user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Ok(Self::Admin),
            // legacy directories call members plain "user"
            "member" | "user" => Ok(Self::Member),
            _ => Err(ParseEnumError {
                expected: "role",
                got: s.to_string(),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Which entities a user's view is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityScope {
    All,
    Entity(EntityId),
}

impl EntityScope {
    /// Whether this scope covers initiatives owned by `entity`.
    #[must_use]
    pub fn covers(&self, entity: &EntityId) -> bool {
        match self {
            Self::All => true,
            Self::Entity(own) => own == entity,
        }
    }
}

impl fmt::Display for EntityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL_ENTITIES),
            Self::Entity(entity) => entity.fmt(f),
        }
    }
}

impl From<&str> for EntityScope {
    fn from(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case(ALL_ENTITIES) {
            Self::All
        } else {
            Self::Entity(EntityId::new(value.trim()))
        }
    }
}

impl Serialize for EntityScope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityScope {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// Error returned when a user record violates the role/scope rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("member '{0}' cannot be scoped to all entities")]
pub struct InvalidUser(pub UserId);

/// The acting user. Immutable for the duration of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawUser", into = "RawUser")]
pub struct User {
    id: UserId,
    role: Role,
    entity: EntityScope,
}

impl User {
    /// Build a user, rejecting members scoped to `All`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidUser`] when a member is given the `All` scope.
    pub fn new(id: impl Into<UserId>, role: Role, entity: EntityScope) -> Result<Self, InvalidUser> {
        let id = id.into();
        if role == Role::Member && entity == EntityScope::All {
            return Err(InvalidUser(id));
        }
        Ok(Self { id, role, entity })
    }

    /// Administrator that sees every entity.
    #[must_use]
    pub fn admin(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            role: Role::Admin,
            entity: EntityScope::All,
        }
    }

    /// Member scoped to a single entity.
    #[must_use]
    pub fn member(id: impl Into<UserId>, entity: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            role: Role::Member,
            entity: EntityScope::Entity(entity.into()),
        }
    }

    #[must_use]
    pub const fn id(&self) -> &UserId {
        &self.id
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub const fn entity(&self) -> &EntityScope {
        &self.entity
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Serialize, Deserialize)]
struct RawUser {
    id: UserId,
    role: Role,
    entity: EntityScope,
}

impl TryFrom<RawUser> for User {
    type Error = InvalidUser;

    fn try_from(raw: RawUser) -> Result<Self, Self::Error> {
        Self::new(raw.id, raw.role, raw.entity)
    }
}

impl From<User> for RawUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            entity: user.entity,
        }
    }
}
