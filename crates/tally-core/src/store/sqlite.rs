use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use super::RecordStore;
use crate::db;
use crate::error::StoreError;
use crate::model::{Initiative, InitiativeId};

/// Record store backed by the workspace SQLite database.
///
/// The JSON `document` column is authoritative; the other columns are
/// indexes kept in sync on every `put`.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating and migrating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: db::open_db(path)?,
        })
    }

    /// # Errors
    ///
    /// Returns an error if migrations fail.
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: db::open_in_memory()?,
        })
    }

    /// Wrap an already migrated connection.
    #[must_use]
    pub const fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Number of stored initiatives.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the count query fails.
    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM initiatives", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn decode(document: &str) -> Result<Initiative, StoreError> {
    Ok(serde_json::from_str(document)?)
}

impl RecordStore for SqliteStore {
    fn list(&self) -> Result<Vec<Initiative>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT document FROM initiatives ORDER BY seq ASC")?;
        let documents = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for document in documents {
            out.push(decode(&document?)?);
        }
        Ok(out)
    }

    fn get(&self, id: &InitiativeId) -> Result<Option<Initiative>, StoreError> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM initiatives WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        document.as_deref().map(decode).transpose()
    }

    fn put(&mut self, initiative: &Initiative) -> Result<(), StoreError> {
        let document = serde_json::to_string(initiative)?;
        let revision = i64::try_from(initiative.revision()).unwrap_or(i64::MAX);
        self.conn.execute(
            "INSERT INTO initiatives (id, seq, entity, created_by, approval, revision, document)
             VALUES (?1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM initiatives), ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                entity = excluded.entity,
                created_by = excluded.created_by,
                approval = excluded.approval,
                revision = excluded.revision,
                document = excluded.document",
            params![
                initiative.id().as_str(),
                initiative.entity().as_str(),
                initiative.created_by().as_str(),
                initiative.approval_kind().as_str(),
                revision,
                document,
            ],
        )?;
        Ok(())
    }

    fn delete(&mut self, id: &InitiativeId) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM initiatives WHERE id = ?1", [id.as_str()])?;
        Ok(())
    }
}
