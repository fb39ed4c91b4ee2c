use rusqlite::{Connection, params};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// A persisted system-prompt record. Each update appends a new row; the
/// "current" prompt is the row with the greatest `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptConfig {
    pub id: i64,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    EmptyContent,
    Database(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyContent => write!(f, "prompt content must not be empty"),
            Self::Database(msg) => write!(f, "prompt store error: {msg}"),
        }
    }
}

impl Error for StoreError {}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// SQLite-backed prompt store: one table `prompt_configs` with millisecond
/// timestamps. Opens a fresh connection per call on a blocking thread, so
/// every operation round-trips to the database.
#[derive(Debug, Clone)]
pub struct PromptStore {
    db_path: PathBuf,
}

impl PromptStore {
    /// Opens the store at `path` and ensures the table exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        let conn = open_connection(&db_path)?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS prompt_configs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )
        .map_err(db_error)?;
        Ok(Self { db_path })
    }

    /// Returns the record with the greatest `updated_at`, or `None` when the
    /// store has never been seeded. Ties break toward the later insert.
    pub async fn current(&self) -> StoreResult<Option<PromptConfig>> {
        let db_path = self.db_path.clone();
        run_blocking(move || {
            let conn = open_connection(&db_path)?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, content, created_at, updated_at FROM prompt_configs \
                     ORDER BY updated_at DESC, id DESC LIMIT 1",
                )
                .map_err(db_error)?;
            let mut rows = stmt.query([]).map_err(db_error)?;
            match rows.next().map_err(db_error)? {
                Some(row) => Ok(Some(row_to_prompt(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Appends a new record with fresh timestamps and returns it. Rejects
    /// empty or whitespace-only content.
    pub async fn create(&self, content: &str) -> StoreResult<PromptConfig> {
        if content.trim().is_empty() {
            return Err(StoreError::EmptyContent);
        }

        let content = content.to_string();
        let db_path = self.db_path.clone();
        run_blocking(move || {
            let now = now_millis();
            let conn = open_connection(&db_path)?;
            conn.execute(
                "INSERT INTO prompt_configs (content, created_at, updated_at) VALUES (?1, ?2, ?3)",
                params![content, now, now],
            )
            .map_err(db_error)?;
            let id = conn.last_insert_rowid();
            let timestamp = millis_to_datetime(now)?;
            Ok(PromptConfig {
                id,
                content,
                created_at: timestamp,
                updated_at: timestamp,
            })
        })
        .await
    }

    /// All records, newest first by `created_at`.
    pub async fn history(&self) -> StoreResult<Vec<PromptConfig>> {
        let db_path = self.db_path.clone();
        run_blocking(move || {
            let conn = open_connection(&db_path)?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, content, created_at, updated_at FROM prompt_configs \
                     ORDER BY created_at DESC, id DESC",
                )
                .map_err(db_error)?;
            let mut rows = stmt.query([]).map_err(db_error)?;
            let mut out = Vec::new();
            while let Some(row) = rows.next().map_err(db_error)? {
                out.push(row_to_prompt(row)?);
            }
            Ok(out)
        })
        .await
    }

    /// Inserts one record with `default_content` iff the table is empty.
    /// Idempotent across restarts once any record exists.
    pub async fn seed_if_empty(&self, default_content: &str) -> StoreResult<()> {
        let default_content = default_content.to_string();
        let db_path = self.db_path.clone();
        run_blocking(move || {
            let conn = open_connection(&db_path)?;
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM prompt_configs", [], |row| row.get(0))
                .map_err(db_error)?;
            if count == 0 {
                let now = now_millis();
                conn.execute(
                    "INSERT INTO prompt_configs (content, created_at, updated_at) \
                     VALUES (?1, ?2, ?3)",
                    params![default_content, now, now],
                )
                .map_err(db_error)?;
            }
            Ok(())
        })
        .await
    }
}

async fn run_blocking<T: Send + 'static>(
    f: impl FnOnce() -> StoreResult<T> + Send + 'static,
) -> StoreResult<T> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| StoreError::Database(err.to_string()))?
}

fn open_connection(db_path: &Path) -> StoreResult<Connection> {
    Connection::open(db_path).map_err(db_error)
}

fn db_error(err: rusqlite::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

fn row_to_prompt(row: &rusqlite::Row<'_>) -> StoreResult<PromptConfig> {
    let id: i64 = row.get(0).map_err(db_error)?;
    let content: String = row.get(1).map_err(db_error)?;
    let created_at: i64 = row.get(2).map_err(db_error)?;
    let updated_at: i64 = row.get(3).map_err(db_error)?;
    Ok(PromptConfig {
        id,
        content,
        created_at: millis_to_datetime(created_at)?,
        updated_at: millis_to_datetime(updated_at)?,
    })
}

fn now_millis() -> i64 {
    let now = OffsetDateTime::now_utc();
    (now.unix_timestamp_nanos() / 1_000_000) as i64
}

fn millis_to_datetime(millis: i64) -> StoreResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|err| StoreError::Database(format!("invalid stored timestamp {millis}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{PromptStore, StoreError};
    use tempfile::NamedTempFile;

    fn temp_store() -> (NamedTempFile, PromptStore) {
        let file = NamedTempFile::new().expect("temp db file");
        let store = PromptStore::open(file.path()).expect("open store");
        (file, store)
    }

    #[tokio::test]
    async fn current_is_none_on_empty_store() {
        let (_file, store) = temp_store();
        assert_eq!(store.current().await.expect("current"), None);
    }

    #[tokio::test]
    async fn create_rejects_empty_content() {
        let (_file, store) = temp_store();
        assert_eq!(
            store.create("").await.expect_err("empty should fail"),
            StoreError::EmptyContent
        );
        assert_eq!(
            store.create("   ").await.expect_err("blank should fail"),
            StoreError::EmptyContent
        );
        assert_eq!(store.history().await.expect("history").len(), 0);
    }

    #[tokio::test]
    async fn create_is_visible_to_current() {
        let (_file, store) = temp_store();
        let created = store.create("Be terse.").await.expect("create");
        assert_eq!(created.content, "Be terse.");
        assert_eq!(created.created_at, created.updated_at);

        let current = store.current().await.expect("current").expect("some");
        assert_eq!(current, created);
    }

    #[tokio::test]
    async fn current_returns_latest_of_several() {
        let (_file, store) = temp_store();
        store.create("first").await.expect("create first");
        store.create("second").await.expect("create second");
        let last = store.create("third").await.expect("create third");

        let current = store.current().await.expect("current").expect("some");
        assert_eq!(current.id, last.id);
        assert_eq!(current.content, "third");
    }

    #[tokio::test]
    async fn history_is_newest_first_and_complete() {
        let (_file, store) = temp_store();
        for content in ["a", "b", "c"] {
            store.create(content).await.expect("create");
        }

        let history = store.history().await.expect("history");
        assert_eq!(history.len(), 3);
        let contents: Vec<&str> = history.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, ["c", "b", "a"]);
        assert!(history.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn seed_if_empty_inserts_exactly_once() {
        let (_file, store) = temp_store();
        store.seed_if_empty("default").await.expect("first seed");
        store.seed_if_empty("default").await.expect("second seed");

        let history = store.history().await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "default");
    }

    #[tokio::test]
    async fn seed_if_empty_keeps_existing_records() {
        let (_file, store) = temp_store();
        store.create("explicit").await.expect("create");
        store.seed_if_empty("default").await.expect("seed");

        let history = store.history().await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "explicit");
    }

    #[tokio::test]
    async fn open_survives_reopen_with_existing_data() {
        let file = NamedTempFile::new().expect("temp db file");
        {
            let store = PromptStore::open(file.path()).expect("open store");
            store.create("persisted").await.expect("create");
        }

        let store = PromptStore::open(file.path()).expect("reopen store");
        let current = store.current().await.expect("current").expect("some");
        assert_eq!(current.content, "persisted");
    }
}
