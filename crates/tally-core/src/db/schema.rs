//! SQLite schema for the tally workspace database.
//!
//! - `initiatives` holds one row per initiative: a few indexed columns for
//!   filtering plus the full JSON document, which is authoritative
//! - `seq` preserves insertion order across upserts
//! - `notifications` is the inbox written by the SQLite notifier
//! - `notification_reads` holds one row per (notification, reader) pair, so
//!   shared notices are read by each recipient independently
//! - `store_meta` records the schema version for diagnostics

/// Migration v1: initiative records and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS initiatives (
    id TEXT PRIMARY KEY CHECK (length(trim(id)) > 0),
    seq INTEGER NOT NULL UNIQUE,
    entity TEXT NOT NULL,
    created_by TEXT NOT NULL,
    approval TEXT NOT NULL DEFAULT 'approved' CHECK (approval IN (
        'approved', 'pending_create', 'pending_update', 'pending_delete', 'rejected'
    )),
    revision INTEGER NOT NULL DEFAULT 0,
    document TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 0);

CREATE INDEX IF NOT EXISTS idx_initiatives_entity ON initiatives(entity);
CREATE INDEX IF NOT EXISTS idx_initiatives_approval ON initiatives(approval);
";

/// Migration v2: notification inbox.
pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient_kind TEXT NOT NULL CHECK (recipient_kind IN ('user', 'admins', 'broadcast')),
    recipient_user TEXT,
    kind TEXT NOT NULL,
    message TEXT NOT NULL,
    initiative_id TEXT,
    created_at TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0 CHECK (is_read IN (0, 1)),
    CHECK ((recipient_kind = 'user') = (recipient_user IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient
    ON notifications(recipient_kind, recipient_user);
";

/// Migration v3: per-reader read state. Direct notices already marked read
/// carry their flag over; shared ones start unread for everyone.
pub const MIGRATION_V3_SQL: &str = r"
CREATE TABLE IF NOT EXISTS notification_reads (
    notification_id INTEGER NOT NULL REFERENCES notifications(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    PRIMARY KEY (notification_id, user_id)
);

INSERT OR IGNORE INTO notification_reads (notification_id, user_id)
    SELECT id, recipient_user FROM notifications
    WHERE is_read = 1 AND recipient_kind = 'user';
";

/// Indexes expected after all migrations.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_initiatives_entity",
    "idx_initiatives_approval",
    "idx_notifications_recipient",
];
