//! Notification collaborators.
//!
//! The engine hands every [`Notice`] to a [`Notifier`] after the store
//! write succeeded. Delivery is fire-and-forget: a failing notifier is
//! logged by the engine and never rolls a transition back.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, path::Path, str::FromStr};

use crate::db;
use crate::error::StoreError;
use crate::model::{InitiativeId, ParseEnumError, User, UserId};

/// Default number of notifications kept by the SQLite notifier.
pub const DEFAULT_MAX_RETAINED: usize = 50;

/// Who a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "to", content = "user", rename_all = "snake_case")]
pub enum Recipient {
    User(UserId),
    /// Every administrator.
    Admins,
    /// Everyone.
    Broadcast,
}

impl Recipient {
    /// Whether `user` should see a notification sent to this recipient.
    #[must_use]
    pub fn includes(&self, user: &User) -> bool {
        match self {
            Self::User(id) => id == user.id(),
            Self::Admins => user.is_admin(),
            Self::Broadcast => true,
        }
    }

    const fn kind_str(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Admins => "admins",
            Self::Broadcast => "broadcast",
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => id.fmt(f),
            Self::Admins => f.write_str("admins"),
            Self::Broadcast => f.write_str("everyone"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApprovalRequest,
    Approved,
    ApprovedUpdate,
    ApprovedDelete,
    Rejected,
    RejectedUpdate,
    RejectedDelete,
    ProgressUpdated,
    Deleted,
    Info,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApprovalRequest => "approval_request",
            Self::Approved => "approved",
            Self::ApprovedUpdate => "approved_update",
            Self::ApprovedDelete => "approved_delete",
            Self::Rejected => "rejected",
            Self::RejectedUpdate => "rejected_update",
            Self::RejectedDelete => "rejected_delete",
            Self::ProgressUpdated => "progress_updated",
            Self::Deleted => "deleted",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approval_request" => Ok(Self::ApprovalRequest),
            "approved" => Ok(Self::Approved),
            "approved_update" => Ok(Self::ApprovedUpdate),
            "approved_delete" => Ok(Self::ApprovedDelete),
            "rejected" => Ok(Self::Rejected),
            "rejected_update" => Ok(Self::RejectedUpdate),
            "rejected_delete" => Ok(Self::RejectedDelete),
            "progress_updated" => Ok(Self::ProgressUpdated),
            "deleted" => Ok(Self::Deleted),
            "info" => Ok(Self::Info),
            _ => Err(ParseEnumError {
                expected: "notification kind",
                got: s.to_string(),
            }),
        }
    }
}

/// A message the engine wants delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub recipient: Recipient,
    pub kind: NotificationKind,
    pub message: String,
    pub initiative: Option<InitiativeId>,
    pub at: DateTime<Utc>,
}

/// A delivered notice as seen in one user's inbox. `read` is that user's
/// own read state; shared notices are read separately by each recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub recipient: Recipient,
    pub kind: NotificationKind,
    pub message: String,
    pub initiative: Option<InitiativeId>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    fn from_notice(id: u64, notice: Notice) -> Self {
        let Notice {
            recipient,
            kind,
            message,
            initiative,
            at,
        } = notice;
        Self {
            id,
            recipient,
            kind,
            message,
            initiative,
            created_at: at,
            read: false,
        }
    }
}

pub trait Notifier {
    /// Deliver one notice.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when delivery fails.
    fn notify(&mut self, notice: Notice) -> Result<(), StoreError>;
}

/// Read side of a notifier that keeps what it delivered.
pub trait Inbox {
    /// Notifications visible to `user`, newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend cannot be read.
    fn inbox(&self, user: &User) -> Result<Vec<Notification>, StoreError>;

    /// Mark one of `user`'s notifications read. Returns `false` when `id` is
    /// not in the user's inbox.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the write fails.
    fn mark_read(&mut self, user: &User, id: u64) -> Result<bool, StoreError>;

    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend cannot be read.
    fn unread_count(&self, user: &User) -> Result<usize, StoreError> {
        Ok(self.inbox(user)?.iter().filter(|n| !n.read).count())
    }
}

/// Keeps notifications in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    delivered: Vec<Notification>,
    reads: HashSet<(u64, UserId)>,
    next_id: u64,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, oldest first, without per-user read
    /// state.
    #[must_use]
    pub fn delivered(&self) -> &[Notification] {
        &self.delivered
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&mut self, notice: Notice) -> Result<(), StoreError> {
        self.next_id += 1;
        self.delivered
            .push(Notification::from_notice(self.next_id, notice));
        Ok(())
    }
}

impl Inbox for MemoryNotifier {
    fn inbox(&self, user: &User) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .delivered
            .iter()
            .rev()
            .filter(|n| n.recipient.includes(user))
            .map(|n| Notification {
                read: self.reads.contains(&(n.id, user.id().clone())),
                ..n.clone()
            })
            .collect())
    }

    fn mark_read(&mut self, user: &User, id: u64) -> Result<bool, StoreError> {
        let known = self
            .delivered
            .iter()
            .any(|n| n.id == id && n.recipient.includes(user));
        if known {
            self.reads.insert((id, user.id().clone()));
        }
        Ok(known)
    }
}

/// Persists notifications in the workspace database, pruning the oldest
/// beyond `max_retained`. Read state lives in `notification_reads`, one row
/// per reader.
#[derive(Debug)]
pub struct SqliteNotifier {
    conn: Connection,
    max_retained: usize,
}

const INBOX_FILTER: &str = "(recipient_kind = 'broadcast'
        OR (recipient_kind = 'user' AND recipient_user = ?1)
        OR (recipient_kind = 'admins' AND ?2 = 1))";

const READ_BY_USER: &str = "EXISTS (SELECT 1 FROM notification_reads r
        WHERE r.notification_id = notifications.id AND r.user_id = ?1)";

impl SqliteNotifier {
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path, max_retained: usize) -> anyhow::Result<Self> {
        Ok(Self::from_connection(db::open_db(path)?, max_retained))
    }

    #[must_use]
    pub const fn from_connection(conn: Connection, max_retained: usize) -> Self {
        Self { conn, max_retained }
    }

    fn prune(&self) -> Result<usize, StoreError> {
        let keep = i64::try_from(self.max_retained).unwrap_or(i64::MAX);
        let removed = self.conn.execute(
            "DELETE FROM notifications
             WHERE id NOT IN (SELECT id FROM notifications ORDER BY id DESC LIMIT ?1)",
            [keep],
        )?;
        Ok(removed)
    }
}

impl Notifier for SqliteNotifier {
    fn notify(&mut self, notice: Notice) -> Result<(), StoreError> {
        let recipient_user = match &notice.recipient {
            Recipient::User(id) => Some(id.as_str()),
            Recipient::Admins | Recipient::Broadcast => None,
        };
        self.conn.execute(
            "INSERT INTO notifications
                (recipient_kind, recipient_user, kind, message, initiative_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                notice.recipient.kind_str(),
                recipient_user,
                notice.kind.as_str(),
                notice.message,
                notice.initiative.as_ref().map(InitiativeId::as_str),
                notice.at.to_rfc3339(),
            ],
        )?;
        let pruned = self.prune()?;
        if pruned > 0 {
            tracing::debug!(pruned, "pruned old notifications");
        }
        Ok(())
    }
}

struct Row {
    id: i64,
    recipient_kind: String,
    recipient_user: Option<String>,
    kind: String,
    message: String,
    initiative: Option<String>,
    created_at: String,
    read: bool,
}

impl Row {
    fn into_notification(self) -> Result<Notification, StoreError> {
        let recipient = match (self.recipient_kind.as_str(), self.recipient_user) {
            ("user", Some(user)) => Recipient::User(UserId::new(user)),
            ("admins", _) => Recipient::Admins,
            ("broadcast", _) => Recipient::Broadcast,
            (other, _) => return Err(StoreError::Corrupt(format!("recipient kind '{other}'"))),
        };
        let kind = self
            .kind
            .parse()
            .map_err(|e: ParseEnumError| StoreError::Corrupt(e.to_string()))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {e}", self.created_at)))?
            .with_timezone(&Utc);
        Ok(Notification {
            id: u64::try_from(self.id).unwrap_or_default(),
            recipient,
            kind,
            message: self.message,
            initiative: self.initiative.map(InitiativeId::new),
            created_at,
            read: self.read,
        })
    }
}

impl Inbox for SqliteNotifier {
    fn inbox(&self, user: &User) -> Result<Vec<Notification>, StoreError> {
        let sql = format!(
            "SELECT id, recipient_kind, recipient_user, kind, message, initiative_id, created_at,
                    {READ_BY_USER}
             FROM notifications WHERE {INBOX_FILTER} ORDER BY id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user.id().as_str(), user.is_admin()], |row| {
            Ok(Row {
                id: row.get(0)?,
                recipient_kind: row.get(1)?,
                recipient_user: row.get(2)?,
                kind: row.get(3)?,
                message: row.get(4)?,
                initiative: row.get(5)?,
                created_at: row.get(6)?,
                read: row.get(7)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_notification()?);
        }
        Ok(out)
    }

    fn mark_read(&mut self, user: &User, id: u64) -> Result<bool, StoreError> {
        let Ok(id) = i64::try_from(id) else {
            return Ok(false);
        };
        let sql =
            format!("SELECT EXISTS (SELECT 1 FROM notifications WHERE id = ?3 AND {INBOX_FILTER})");
        let known: bool = self.conn.query_row(
            &sql,
            params![user.id().as_str(), user.is_admin(), id],
            |row| row.get(0),
        )?;
        if known {
            self.conn.execute(
                "INSERT OR IGNORE INTO notification_reads (notification_id, user_id) VALUES (?1, ?2)",
                params![id, user.id().as_str()],
            )?;
        }
        Ok(known)
    }

    fn unread_count(&self, user: &User) -> Result<usize, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) FROM notifications WHERE {INBOX_FILTER} AND NOT {READ_BY_USER}"
        );
        let count: i64 = self.conn.query_row(
            &sql,
            params![user.id().as_str(), user.is_admin()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn notice(recipient: Recipient, message: &str) -> Notice {
        Notice {
            recipient,
            kind: NotificationKind::Info,
            message: message.to_string(),
            initiative: Some(InitiativeId::new("in-1")),
            at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    fn deliver_sample(notifier: &mut impl Notifier) {
        notifier.notify(notice(Recipient::Admins, "for admins")).unwrap();
        notifier
            .notify(notice(Recipient::User(UserId::new("dina")), "for dina"))
            .unwrap();
        notifier.notify(notice(Recipient::Broadcast, "for all")).unwrap();
        notifier
            .notify(notice(Recipient::User(UserId::new("rina")), "for rina"))
            .unwrap();
    }

    fn messages(list: &[Notification]) -> Vec<&str> {
        list.iter().map(|n| n.message.as_str()).collect()
    }

    fn check_inbox_semantics(notifier: &mut (impl Notifier + Inbox)) {
        deliver_sample(notifier);
        let dina = User::member("dina", "sgn");
        let admin = User::admin("root");

        assert_eq!(messages(&notifier.inbox(&dina).unwrap()), vec!["for all", "for dina"]);
        assert_eq!(messages(&notifier.inbox(&admin).unwrap()), vec!["for all", "for admins"]);
        assert_eq!(notifier.unread_count(&dina).unwrap(), 2);

        let first = notifier.inbox(&dina).unwrap()[1].id;
        assert!(notifier.mark_read(&dina, first).unwrap());
        assert_eq!(notifier.unread_count(&dina).unwrap(), 1);

        // admin-only notifications are not in a member's inbox
        let admins_only = notifier.inbox(&admin).unwrap()[1].id;
        assert!(!notifier.mark_read(&dina, admins_only).unwrap());

        // shared notices are read per reader
        let budi = User::member("budi", "lpp");
        let broadcast = notifier.inbox(&dina).unwrap()[0].id;
        assert!(notifier.mark_read(&dina, broadcast).unwrap());
        assert_eq!(notifier.unread_count(&dina).unwrap(), 0);
        assert_eq!(notifier.unread_count(&budi).unwrap(), 1);
        assert!(!notifier.inbox(&budi).unwrap()[0].read);
        assert!(notifier.inbox(&dina).unwrap()[0].read);

        let other_admin = User::admin("rina");
        assert!(notifier.mark_read(&admin, admins_only).unwrap());
        assert_eq!(notifier.unread_count(&other_admin).unwrap(), 3);
    }

    #[test]
    fn memory_inbox() {
        check_inbox_semantics(&mut MemoryNotifier::new());
    }

    #[test]
    fn sqlite_inbox() {
        let conn = db::open_in_memory().unwrap();
        check_inbox_semantics(&mut SqliteNotifier::from_connection(conn, DEFAULT_MAX_RETAINED));
    }

    #[test]
    fn sqlite_prunes_oldest() {
        let conn = db::open_in_memory().unwrap();
        let mut notifier = SqliteNotifier::from_connection(conn, 2);
        for i in 0..5 {
            notifier
                .notify(notice(Recipient::Broadcast, &format!("n{i}")))
                .unwrap();
        }
        let all = notifier.inbox(&User::admin("root")).unwrap();
        assert_eq!(messages(&all), vec!["n4", "n3"]);
        assert_eq!(all[0].initiative, Some(InitiativeId::new("in-1")));
        assert_eq!(all[0].kind, NotificationKind::Info);
    }

    #[test]
    fn sqlite_prune_drops_read_markers() {
        let conn = db::open_in_memory().unwrap();
        let mut notifier = SqliteNotifier::from_connection(conn, 1);
        let admin = User::admin("root");
        notifier.notify(notice(Recipient::Broadcast, "old")).unwrap();
        let old = notifier.inbox(&admin).unwrap()[0].id;
        assert!(notifier.mark_read(&admin, old).unwrap());
        notifier.notify(notice(Recipient::Broadcast, "new")).unwrap();

        let markers: i64 = notifier
            .conn
            .query_row("SELECT COUNT(*) FROM notification_reads", [], |row| row.get(0))
            .unwrap();
        assert_eq!(markers, 0);
        assert_eq!(notifier.unread_count(&admin).unwrap(), 1);
    }

    #[test]
    fn recipient_serializes_with_tag() {
        let json = serde_json::to_value(Recipient::User(UserId::new("dina"))).unwrap();
        assert_eq!(json, serde_json::json!({"to": "user", "user": "dina"}));
        let json = serde_json::to_value(Recipient::Admins).unwrap();
        assert_eq!(json, serde_json::json!({"to": "admins"}));
    }

    #[test]
    fn kind_parses_back() {
        for kind in [
            NotificationKind::ApprovalRequest,
            NotificationKind::RejectedDelete,
            NotificationKind::ProgressUpdated,
        ] {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
        }
    }
}
