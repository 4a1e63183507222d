//! Corpus row persistence
//!
//! Fingerprints are stored in one BLOB column tagged by `strategy`: UTF-8
//! digest text for fuzzy hashes, little-endian f32 values for embeddings
//! (with `dimension` recording the vector length).

use chrono::{DateTime, Utc};
use epmatch_common::{FingerprintStrategy, SourceFormat};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

use crate::error::CorpusError;
use crate::models::{CorpusRecord, EpisodeKey, Fingerprint, FingerprintValue};

const SELECT_COLUMNS: &str = r#"
    SELECT guid, series, season, episode, variant, episode_name, strategy,
           source_format, dimension, fingerprint, text_hash, learned_at
    FROM corpus
"#;

/// SQLite-backed corpus rows
#[derive(Debug, Clone)]
pub struct CorpusStore {
    pool: SqlitePool,
}

impl CorpusStore {
    /// Open the database file, creating it and its table if missing
    pub async fn open(path: &Path) -> Result<Self, CorpusError> {
        Ok(Self {
            pool: super::init_database_pool(path).await?,
        })
    }

    /// Private in-memory database
    pub async fn open_in_memory() -> Result<Self, CorpusError> {
        Ok(Self {
            pool: super::init_memory_pool().await?,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace by key
    ///
    /// An existing row keeps its guid and insertion position; the guid that
    /// ends up stored is returned.
    pub async fn upsert(&self, record: &CorpusRecord) -> Result<Uuid, CorpusError> {
        record.key.validate().map_err(CorpusError::InvalidRecord)?;
        let (blob, dimension) = encode_fingerprint(record.fingerprint.value());

        let row = sqlx::query(
            r#"
            INSERT INTO corpus (
                guid, series, season, episode, variant, episode_name, strategy,
                source_format, dimension, fingerprint, text_hash, learned_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(series, season, episode, variant) DO UPDATE SET
                episode_name = excluded.episode_name,
                strategy = excluded.strategy,
                source_format = excluded.source_format,
                dimension = excluded.dimension,
                fingerprint = excluded.fingerprint,
                text_hash = excluded.text_hash,
                learned_at = excluded.learned_at
            RETURNING guid
            "#,
        )
        .bind(record.guid.to_string())
        .bind(&record.key.series)
        .bind(record.key.season as i64)
        .bind(record.key.episode as i64)
        .bind(record.key.variant_str())
        .bind(&record.episode_name)
        .bind(record.strategy().as_str())
        .bind(record.source_format().as_str())
        .bind(dimension)
        .bind(blob)
        .bind(&record.text_hash)
        .bind(record.learned_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        let guid: String = row.try_get("guid")?;
        Uuid::parse_str(&guid).map_err(|e| CorpusError::CorruptRow {
            guid,
            reason: e.to_string(),
        })
    }

    /// Load one record by key
    pub async fn get(&self, key: &EpisodeKey) -> Result<Option<CorpusRecord>, CorpusError> {
        let query = format!(
            "{} WHERE series = ? AND season = ? AND episode = ? AND variant = ?",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(&key.series)
            .bind(key.season as i64)
            .bind(key.episode as i64)
            .bind(key.variant_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| decode_row(&r)).transpose()
    }

    /// Load every record in insertion order
    ///
    /// Rows written with a strategy this build does not know are skipped;
    /// they stay in the table untouched.
    pub async fn load_all(&self) -> Result<Vec<CorpusRecord>, CorpusError> {
        let query = format!("{} ORDER BY id", SELECT_COLUMNS);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for row in &rows {
            let strategy: String = row.try_get("strategy")?;
            if strategy.parse::<FingerprintStrategy>().is_err() {
                let guid: String = row.try_get("guid")?;
                warn!(guid = %guid, strategy = %strategy, "Skipping corpus row of unknown strategy");
                skipped += 1;
                continue;
            }
            records.push(decode_row(row)?);
        }

        if skipped > 0 {
            warn!(skipped, loaded = records.len(), "Corpus rows skipped on load");
        }
        Ok(records)
    }

    pub async fn count(&self) -> Result<i64, CorpusError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM corpus")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

fn encode_fingerprint(value: &FingerprintValue) -> (Vec<u8>, Option<i64>) {
    match value {
        FingerprintValue::FuzzyHash(digest) => (digest.as_bytes().to_vec(), None),
        FingerprintValue::Embedding(vector) => (
            vector.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Some(vector.len() as i64),
        ),
    }
}

fn decode_row(row: &SqliteRow) -> Result<CorpusRecord, CorpusError> {
    let guid: String = row.try_get("guid")?;
    let corrupt = |reason: String| CorpusError::CorruptRow {
        guid: guid.clone(),
        reason,
    };

    let strategy: String = row.try_get("strategy")?;
    let strategy: FingerprintStrategy = strategy.parse().map_err(|e| corrupt(format!("{}", e)))?;
    let source_format: String = row.try_get("source_format")?;
    let source_format: SourceFormat =
        source_format.parse().map_err(|e| corrupt(format!("{}", e)))?;

    let blob: Vec<u8> = row.try_get("fingerprint")?;
    let dimension: Option<i64> = row.try_get("dimension")?;

    let fingerprint = match strategy {
        FingerprintStrategy::FuzzyHash => {
            let digest = String::from_utf8(blob).map_err(|e| corrupt(e.to_string()))?;
            Fingerprint::fuzzy_hash(digest, source_format).map_err(|e| corrupt(e.to_string()))?
        }
        FingerprintStrategy::Embedding => {
            if blob.len() % 4 != 0 {
                return Err(corrupt(format!("embedding blob of {} bytes", blob.len())));
            }
            let vector: Vec<f32> = blob
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            if dimension != Some(vector.len() as i64) {
                return Err(corrupt(format!(
                    "dimension column {:?} does not match {} stored values",
                    dimension,
                    vector.len()
                )));
            }
            Fingerprint::embedding(vector, source_format).map_err(|e| corrupt(e.to_string()))?
        }
    };

    let season: i64 = row.try_get("season")?;
    let episode: i64 = row.try_get("episode")?;
    let variant: String = row.try_get("variant")?;
    let learned_at: String = row.try_get("learned_at")?;
    let learned_at = DateTime::parse_from_rfc3339(&learned_at)
        .map_err(|e| corrupt(e.to_string()))?
        .with_timezone(&Utc);

    let key = EpisodeKey {
        series: row.try_get("series")?,
        season: u32::try_from(season).map_err(|e| corrupt(e.to_string()))?,
        episode: u32::try_from(episode).map_err(|e| corrupt(e.to_string()))?,
        variant: None,
    }
    .with_variant(variant);

    Ok(CorpusRecord {
        guid: Uuid::parse_str(&guid).map_err(|e| corrupt(e.to_string()))?,
        key,
        episode_name: row.try_get("episode_name")?,
        fingerprint,
        text_hash: row.try_get("text_hash")?,
        learned_at,
    })
}
