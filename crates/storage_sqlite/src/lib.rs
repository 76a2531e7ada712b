use chrono::{DateTime, Utc};
use core_types::{Note, NoteId, NoteRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub const CURRENT_DB_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("note {0} already exists")]
    DuplicateId(NoteId),

    #[error("note {0} not found")]
    NotFound(NoteId),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("invalid stored timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),

    #[error("invalid stored id: {0}")]
    InvalidId(#[from] uuid::Error),

    #[error("invalid schema version: {0}")]
    InvalidSchemaVersion(#[from] std::num::ParseIntError),

    #[error("database schema version {0} is newer than supported {CURRENT_DB_SCHEMA_VERSION}")]
    UnsupportedSchemaVersion(u32),

    #[error("invalid stored theme: {0}")]
    InvalidTheme(i64),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Single point of truth for note persistence. All windows write through
/// here; sqlite serializes conflicting row writes, and no application-level
/// locking is layered on top (last writer wins on concurrent updates).
#[derive(Debug, Clone)]
pub struct NoteStorage {
    pool: SqlitePool,
}

impl NoteStorage {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!(
            "sqlite://{}",
            path.as_ref().to_string_lossy()
        ))?
        .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                theme INTEGER NOT NULL DEFAULT 0,
                pinned INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Never stamp backwards over a database written by a newer build.
        let existing = sqlx::query("SELECT value FROM metadata WHERE key = 'schema_version'")
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = existing {
            let version = row.get::<String, _>("value").parse::<u32>()?;
            if version > CURRENT_DB_SCHEMA_VERSION {
                return Err(StoreError::UnsupportedSchemaVersion(version));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO metadata(key, value)
            VALUES ('schema_version', ?1)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(CURRENT_DB_SCHEMA_VERSION.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn schema_version(&self) -> Result<u32> {
        let row = sqlx::query("SELECT value FROM metadata WHERE key = 'schema_version'")
            .fetch_one(&self.pool)
            .await?;
        let version = row.get::<String, _>("value").parse::<u32>()?;
        Ok(version)
    }

    /// Inserts a new note. The id must be client-assigned and not already
    /// present; the row is written active with both timestamps stamped now.
    pub async fn create_note(&self, note: &Note) -> Result<()> {
        let existing = sqlx::query("SELECT id FROM notes WHERE id = ?1")
            .bind(note.id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(StoreError::DuplicateId(note.id));
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO notes(id, title, content, theme, pinned, active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
            "#,
        )
        .bind(note.id.to_string())
        .bind(&note.title)
        .bind(&note.content)
        .bind(i64::from(note.theme))
        .bind(note.pinned)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn read_note(&self, id: NoteId) -> Result<Option<NoteRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, content, theme, pinned, active, created_at, updated_at
            FROM notes WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_note_row).transpose()
    }

    /// Live notes only, newest first. The id tiebreak keeps the order stable
    /// across calls absent intervening writes.
    pub async fn read_active_notes(&self) -> Result<Vec<NoteRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, content, theme, pinned, active, created_at, updated_at
            FROM notes
            WHERE active = 1
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_note_row).collect()
    }

    /// Every row regardless of the soft-delete flag.
    pub async fn read_all_notes(&self) -> Result<Vec<NoteRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, content, theme, pinned, active, created_at, updated_at
            FROM notes
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_note_row).collect()
    }

    /// Full-record replace of the mutable fields; `updated_at` is refreshed
    /// here, never taken from the caller. `created_at` and `active` are left
    /// untouched.
    pub async fn update_note(&self, note: &Note) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE notes
            SET title = ?2, content = ?3, theme = ?4, pinned = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(note.id.to_string())
        .bind(&note.title)
        .bind(&note.content)
        .bind(i64::from(note.theme))
        .bind(note.pinned)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(note.id));
        }
        Ok(())
    }

    /// Flips the note inactive. Deleting an already-inactive or absent note
    /// is not an error.
    pub async fn soft_delete_note(&self, id: NoteId) -> Result<()> {
        sqlx::query("UPDATE notes SET active = 0 WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Permanently removes the row. Idempotent.
    pub async fn hard_delete_note(&self, id: NoteId) -> Result<()> {
        sqlx::query("DELETE FROM notes WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn map_note_row(row: sqlx::sqlite::SqliteRow) -> Result<NoteRecord> {
    let raw_theme = row.get::<i64, _>("theme");
    Ok(NoteRecord {
        id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
        title: row.get("title"),
        content: row.get("content"),
        theme: u8::try_from(raw_theme).map_err(|_| StoreError::InvalidTheme(raw_theme))?,
        pinned: row.get("pinned"),
        active: row.get("active"),
        created_at: parse_rfc3339(row.get::<String, _>("created_at"))?,
        updated_at: parse_rfc3339(row.get::<String, _>("updated_at"))?,
    })
}

fn parse_rfc3339(value: String) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(&value)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn created_note_reads_back_active_with_caller_fields() {
        let storage = NoteStorage::in_memory().await.expect("storage");
        assert_eq!(
            storage.schema_version().await.expect("schema version"),
            CURRENT_DB_SCHEMA_VERSION
        );

        let note = Note::new("Groceries", "<p>milk</p>", 2);
        storage.create_note(&note).await.expect("create");

        let record = storage
            .read_note(note.id)
            .await
            .expect("read")
            .expect("present");
        assert_eq!(record.id, note.id);
        assert_eq!(record.title, "Groceries");
        assert_eq!(record.content, "<p>milk</p>");
        assert_eq!(record.theme, 2);
        assert!(record.active);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let storage = NoteStorage::in_memory().await.expect("storage");
        let note = Note::new("T", "C", 0);
        storage.create_note(&note).await.expect("create");

        let err = storage.create_note(&note).await.expect_err("duplicate");
        assert!(matches!(err, StoreError::DuplicateId(id) if id == note.id));
    }

    #[tokio::test]
    async fn soft_delete_partitions_active_from_all() {
        let storage = NoteStorage::in_memory().await.expect("storage");
        let note = Note::new("T", "C", 0);
        storage.create_note(&note).await.expect("create");

        storage.soft_delete_note(note.id).await.expect("soft delete");

        let active = storage.read_active_notes().await.expect("active");
        assert!(active.iter().all(|record| record.id != note.id));

        let all = storage.read_all_notes().await.expect("all");
        let record = all
            .iter()
            .find(|record| record.id == note.id)
            .expect("retained");
        assert!(!record.active);
    }

    #[tokio::test]
    async fn hard_delete_removes_the_row() {
        let storage = NoteStorage::in_memory().await.expect("storage");
        let note = Note::new("T", "C", 0);
        storage.create_note(&note).await.expect("create");

        storage.soft_delete_note(note.id).await.expect("soft delete");
        storage.hard_delete_note(note.id).await.expect("hard delete");

        assert!(storage.read_note(note.id).await.expect("read").is_none());
        assert!(storage.read_all_notes().await.expect("all").is_empty());
    }

    #[tokio::test]
    async fn deletes_are_idempotent() {
        let storage = NoteStorage::in_memory().await.expect("storage");
        let note = Note::new("T", "C", 0);
        storage.create_note(&note).await.expect("create");

        storage.soft_delete_note(note.id).await.expect("first soft");
        storage.soft_delete_note(note.id).await.expect("second soft");
        assert_eq!(storage.read_all_notes().await.expect("all").len(), 1);

        storage.hard_delete_note(note.id).await.expect("first hard");
        storage.hard_delete_note(note.id).await.expect("second hard");
        assert!(storage.read_note(note.id).await.expect("read").is_none());
    }

    #[tokio::test]
    async fn update_replaces_every_mutable_field_and_refreshes_updated_at() {
        let storage = NoteStorage::in_memory().await.expect("storage");
        let note = Note::new("T", "C", 1);
        storage.create_note(&note).await.expect("create");
        let before = storage
            .read_note(note.id)
            .await
            .expect("read")
            .expect("present");

        let mut edited = note.clone();
        edited.title = "T2".into();
        edited.content = "C2".into();
        edited.theme = 3;
        storage.update_note(&edited).await.expect("update");

        let after = storage
            .read_note(note.id)
            .await
            .expect("read")
            .expect("present");
        assert_eq!(after.title, "T2");
        assert_eq!(after.content, "C2");
        assert_eq!(after.theme, 3);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn update_of_missing_id_is_not_found() {
        let storage = NoteStorage::in_memory().await.expect("storage");
        let note = Note::new("T", "C", 0);

        let err = storage.update_note(&note).await.expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(id) if id == note.id));
    }

    #[tokio::test]
    async fn last_update_applied_wins_without_field_merge() {
        let storage = NoteStorage::in_memory().await.expect("storage");
        let note = Note::new("T", "C", 0);
        storage.create_note(&note).await.expect("create");

        let mut from_main = note.clone();
        from_main.content = "edited in main".into();
        let mut from_pinned = note.clone();
        from_pinned.title = "edited in pinned".into();

        storage.update_note(&from_main).await.expect("first write");
        storage.update_note(&from_pinned).await.expect("second write");

        let record = storage
            .read_note(note.id)
            .await
            .expect("read")
            .expect("present");
        // Second arrival overwrote the whole record, including the first
        // write's content edit.
        assert_eq!(record.title, "edited in pinned");
        assert_eq!(record.content, "C");
    }

    #[tokio::test]
    async fn migration_refuses_a_newer_database() {
        let storage = NoteStorage::in_memory().await.expect("storage");
        sqlx::query("UPDATE metadata SET value = '99' WHERE key = 'schema_version'")
            .execute(&storage.pool)
            .await
            .expect("bump version");

        let err = storage.migrate().await.expect_err("newer schema");
        assert!(matches!(err, StoreError::UnsupportedSchemaVersion(99)));
        // The newer stamp must survive the refused migration.
        assert_eq!(storage.schema_version().await.expect("version"), 99);
    }

    #[tokio::test]
    async fn out_of_range_stored_theme_is_a_decode_error() {
        let storage = NoteStorage::in_memory().await.expect("storage");
        let note = Note::new("T", "C", 0);
        storage.create_note(&note).await.expect("create");

        sqlx::query("UPDATE notes SET theme = 300 WHERE id = ?1")
            .bind(note.id.to_string())
            .execute(&storage.pool)
            .await
            .expect("corrupt theme");

        let err = storage.read_note(note.id).await.expect_err("decode");
        assert!(matches!(err, StoreError::InvalidTheme(300)));
    }

    #[tokio::test]
    async fn active_listing_is_newest_first_and_stable() {
        let storage = NoteStorage::in_memory().await.expect("storage");
        let first = Note::new("first", "", 0);
        let second = Note::new("second", "", 0);
        storage.create_note(&first).await.expect("create first");
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.create_note(&second).await.expect("create second");

        let listed = storage.read_active_notes().await.expect("active");
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);

        let again = storage.read_active_notes().await.expect("active again");
        assert_eq!(
            listed.iter().map(|r| r.id).collect::<Vec<_>>(),
            again.iter().map(|r| r.id).collect::<Vec<_>>()
        );
    }
}
