//! Persisted corpus: SQLite rows plus the in-memory search index
//!
//! Writes go to the store first; the index snapshot is only swapped after
//! the row is committed, so a failed or abandoned write leaves the index
//! untouched.

use epmatch_common::EngineConfig;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::corpus_index::{CorpusIndex, CorpusSnapshot, SearchQuery, UpsertKind};
use crate::db::CorpusStore;
use crate::error::CorpusError;
use crate::models::{CorpusRecord, EpisodeKey, Fingerprint, MatchCandidate};

/// Durable, concurrently searchable corpus
#[derive(Debug)]
pub struct Corpus {
    store: CorpusStore,
    index: CorpusIndex,
    write_lock: Mutex<()>,
}

impl Corpus {
    /// Open the corpus database and load its rows into the index
    pub async fn open(path: &Path) -> Result<Self, CorpusError> {
        let corpus = Self::with_store(CorpusStore::open(path).await?).await?;
        info!(
            path = %path.display(),
            records = corpus.len(),
            "Corpus loaded"
        );
        Ok(corpus)
    }

    /// Open the corpus at the configured path (or the platform default)
    pub async fn open_configured(config: &EngineConfig) -> Result<Self, CorpusError> {
        Self::open(&config.resolved_corpus_path()).await
    }

    /// Empty in-memory corpus
    pub async fn open_in_memory() -> Result<Self, CorpusError> {
        Self::with_store(CorpusStore::open_in_memory().await?).await
    }

    async fn with_store(store: CorpusStore) -> Result<Self, CorpusError> {
        let records = store.load_all().await?;
        Ok(Self {
            index: CorpusIndex::from_records(records),
            store,
            write_lock: Mutex::new(()),
        })
    }

    /// Insert or replace a record by key
    ///
    /// Returns the record as indexed (its guid is the stored one).
    pub async fn upsert(
        &self,
        mut record: CorpusRecord,
    ) -> Result<(Arc<CorpusRecord>, UpsertKind), CorpusError> {
        let _writer = self.write_lock.lock().await;

        record.guid = self.store.upsert(&record).await?;
        let key = record.key.clone();
        let kind = self.index.upsert(record);

        let stored = self
            .index
            .snapshot()
            .get(&key)
            .cloned()
            .ok_or_else(|| CorpusError::InvalidRecord(format!("{} missing after upsert", key)))?;
        Ok((stored, kind))
    }

    pub fn search(&self, fingerprint: &Fingerprint, query: &SearchQuery) -> Vec<MatchCandidate> {
        self.index.search(fingerprint, query)
    }

    pub fn get(&self, key: &EpisodeKey) -> Option<Arc<CorpusRecord>> {
        self.index.snapshot().get(key).cloned()
    }

    pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
        self.index.snapshot()
    }

    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
