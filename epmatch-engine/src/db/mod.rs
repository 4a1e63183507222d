//! Durable corpus storage (SQLite)

pub mod corpus;

pub use corpus::CorpusStore;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

use crate::error::CorpusError;

/// Open (creating if needed) the corpus database at `db_path`
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool, CorpusError> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to corpus database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory corpus database
///
/// A single connection that is never recycled, since each new connection to
/// `:memory:` would see an empty database.
pub async fn init_memory_pool() -> Result<SqlitePool, CorpusError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create the corpus table if it does not exist
///
/// Schema changes are additive only; existing rows keep their strategy.
async fn init_tables(pool: &SqlitePool) -> Result<(), CorpusError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS corpus (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            guid TEXT NOT NULL UNIQUE,
            series TEXT NOT NULL,
            season INTEGER NOT NULL,
            episode INTEGER NOT NULL,
            variant TEXT NOT NULL DEFAULT '',
            episode_name TEXT,
            strategy TEXT NOT NULL,
            source_format TEXT NOT NULL,
            dimension INTEGER,
            fingerprint BLOB NOT NULL,
            text_hash TEXT NOT NULL,
            learned_at TEXT NOT NULL,
            UNIQUE(series, season, episode, variant)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_corpus_series ON corpus(series)")
        .execute(pool)
        .await?;

    Ok(())
}
