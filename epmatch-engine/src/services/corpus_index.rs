//! In-memory corpus index
//!
//! Copy-on-write snapshot swap: searches clone an `Arc<CorpusSnapshot>` and
//! score against it without holding any lock, while upserts are serialized
//! through a writer mutex, build a new snapshot and swap it in. A search
//! never sees a half-applied upsert.
//!
//! Series and season filters narrow the pool before scoring, so a topK cut
//! can never push a filtered-in match out in favour of excluded rows.

use epmatch_common::config::SearchParams;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

use crate::models::{normalize_series, CorpusRecord, EpisodeKey, Fingerprint, MatchCandidate};

/// Search parameters for one query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub top_k: usize,
    /// Drop candidates below this normalized similarity
    pub min_similarity: f32,
    /// Restrict to one series (case-insensitive)
    pub series: Option<String>,
    pub season: Option<u32>,
}

impl SearchQuery {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            min_similarity: 0.0,
            series: None,
            season: None,
        }
    }

    pub fn from_params(params: &SearchParams) -> Self {
        Self {
            top_k: params.top_k,
            min_similarity: params.min_similarity,
            series: None,
            season: None,
        }
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    pub fn with_series(mut self, series: impl Into<String>) -> Self {
        self.series = Some(series.into());
        self
    }

    pub fn with_season(mut self, season: u32) -> Self {
        self.season = Some(season);
        self
    }
}

/// What an upsert did to the index
#[derive(Debug, Clone)]
pub enum UpsertKind {
    Inserted,
    /// Replaced the record previously stored under the same key
    Replaced { previous: Arc<CorpusRecord> },
}

/// Immutable view of the corpus
#[derive(Debug, Clone, Default)]
pub struct CorpusSnapshot {
    /// Records in insertion order
    entries: Vec<Arc<CorpusRecord>>,
    by_key: HashMap<EpisodeKey, usize>,
    /// Normalized series name → positions, ascending
    by_series: HashMap<String, Vec<usize>>,
}

impl CorpusSnapshot {
    fn from_records(records: Vec<CorpusRecord>) -> Self {
        let mut snapshot = Self::default();
        for record in records {
            snapshot.apply(record);
        }
        snapshot
    }

    fn apply(&mut self, mut record: CorpusRecord) -> UpsertKind {
        if let Some(&pos) = self.by_key.get(&record.key) {
            let previous = Arc::clone(&self.entries[pos]);
            record.guid = previous.guid;
            self.entries[pos] = Arc::new(record);
            return UpsertKind::Replaced { previous };
        }

        let pos = self.entries.len();
        self.by_key.insert(record.key.clone(), pos);
        self.by_series
            .entry(record.key.series_key())
            .or_default()
            .push(pos);
        self.entries.push(Arc::new(record));
        UpsertKind::Inserted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &EpisodeKey) -> Option<&Arc<CorpusRecord>> {
        self.by_key.get(key).map(|&pos| &self.entries[pos])
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<CorpusRecord>> {
        self.entries.iter()
    }

    /// Score `fingerprint` against the filtered pool
    ///
    /// Results are in descending similarity, ties kept in insertion order.
    /// Rows of another strategy or embedding dimension are skipped.
    pub fn search(&self, fingerprint: &Fingerprint, query: &SearchQuery) -> Vec<MatchCandidate> {
        if query.top_k == 0 {
            return Vec::new();
        }

        let pool: Box<dyn Iterator<Item = usize> + '_> = match &query.series {
            Some(series) => match self.by_series.get(&normalize_series(series)) {
                Some(positions) => Box::new(positions.iter().copied()),
                None => {
                    debug!(series = %series, "Series filter matched no corpus rows");
                    return Vec::new();
                }
            },
            None => Box::new(0..self.entries.len()),
        };

        let strategy = fingerprint.strategy();
        let mut skipped = 0usize;
        let mut scored = Vec::new();

        for pos in pool {
            let record = &self.entries[pos];
            if query.season.is_some_and(|s| s != record.key.season) {
                continue;
            }
            if record.strategy() != strategy {
                skipped += 1;
                continue;
            }
            match fingerprint.compare(&record.fingerprint) {
                Ok(sim) if sim.normalized >= query.min_similarity => scored.push((record, sim)),
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        guid = %record.guid,
                        key = %record.key,
                        error = %e,
                        "Skipping incomparable corpus row"
                    );
                }
            }
        }

        if skipped > 0 {
            debug!(skipped, strategy = %strategy, "Skipped corpus rows of another strategy");
        }

        // sort_by is stable: equal scores keep pool (insertion) order
        scored.sort_by(|a, b| b.1.normalized.total_cmp(&a.1.normalized));
        scored.truncate(query.top_k);

        scored
            .into_iter()
            .enumerate()
            .map(|(i, (record, sim))| MatchCandidate {
                guid: record.guid,
                key: record.key.clone(),
                episode_name: record.episode_name.clone(),
                source_format: record.source_format(),
                similarity: sim.normalized,
                raw_score: sim.raw,
                rank: i + 1,
            })
            .collect()
    }
}

/// Concurrent corpus index handle
#[derive(Debug, Default)]
pub struct CorpusIndex {
    current: RwLock<Arc<CorpusSnapshot>>,
    writer: Mutex<()>,
}

impl CorpusIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records in insertion order
    pub fn from_records(records: Vec<CorpusRecord>) -> Self {
        Self {
            current: RwLock::new(Arc::new(CorpusSnapshot::from_records(records))),
            writer: Mutex::new(()),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Insert or replace by key
    pub fn upsert(&self, record: CorpusRecord) -> UpsertKind {
        let _writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());

        let mut next = CorpusSnapshot::clone(&self.snapshot());
        let kind = next.apply(record);

        let mut guard = self.current.write().unwrap_or_else(|p| p.into_inner());
        *guard = Arc::new(next);
        kind
    }

    pub fn search(&self, fingerprint: &Fingerprint, query: &SearchQuery) -> Vec<MatchCandidate> {
        self.snapshot().search(fingerprint, query)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
