//! Identification and learning pipelines
//!
//! identify: text → relevance filter → fingerprint → corpus search → decision
//! learn:    text → relevance filter → fingerprint → corpus upsert
//!
//! Each call uses the one configuration snapshot it was given. The
//! cancellation token is checked between stages and raced against the
//! fingerprint backend; once a corpus write has started it runs to
//! completion, and nothing is written before it.

use epmatch_common::{EngineConfig, FingerprintStrategy, SourceFormat};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::corpus::Corpus;
use super::corpus_index::SearchQuery;
use super::embedding_client::EmbeddingBackend;
use super::fingerprinter::{text_hash, FingerprintGenerator};
use super::match_decision::MatchDecisionEngine;
use super::relevance_filter::{ExtractionResult, RelevanceFilter};
use crate::error::IdentifyError;
use crate::models::{CorpusRecord, EpisodeKey, Fingerprint, IdentificationResult, MatchMethod};

/// Dialogue to identify
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyRequest {
    /// Cleaned UTF-8 dialogue
    pub text: String,
    pub source_format: SourceFormat,
    /// Only consider this series
    #[serde(default)]
    pub series: Option<String>,
    /// Only consider this season
    #[serde(default)]
    pub season: Option<u32>,
}

impl IdentifyRequest {
    pub fn new(text: impl Into<String>, source_format: SourceFormat) -> Self {
        Self {
            text: text.into(),
            source_format,
            series: None,
            season: None,
        }
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

/// Known episode dialogue to add to the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnRequest {
    pub key: EpisodeKey,
    pub episode_name: Option<String>,
    pub text: String,
    pub source_format: SourceFormat,
}

/// What a learn call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnOutcome {
    /// New key
    Inserted { guid: Uuid },
    /// Fingerprint recomputed for an existing key (new text or strategy)
    Refingerprinted {
        guid: Uuid,
        previous_strategy: FingerprintStrategy,
    },
    /// Metadata changed; the stored fingerprint was reused
    Updated { guid: Uuid },
    /// Same text, strategy and metadata; nothing written
    Unchanged { guid: Uuid },
}

impl LearnOutcome {
    pub fn guid(&self) -> Uuid {
        match self {
            LearnOutcome::Inserted { guid }
            | LearnOutcome::Refingerprinted { guid, .. }
            | LearnOutcome::Updated { guid }
            | LearnOutcome::Unchanged { guid } => *guid,
        }
    }
}

/// Runs the identify and learn pipelines against one corpus
#[derive(Clone)]
pub struct EpisodeIdentifier {
    corpus: Arc<Corpus>,
    embedding_backend: Option<Arc<dyn EmbeddingBackend>>,
}

impl EpisodeIdentifier {
    pub fn new(corpus: Arc<Corpus>) -> Self {
        Self {
            corpus,
            embedding_backend: None,
        }
    }

    /// Backend used when the configured strategy is `embedding`
    pub fn with_embedding_backend(mut self, backend: Arc<dyn EmbeddingBackend>) -> Self {
        self.embedding_backend = Some(backend);
        self
    }

    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    /// Identify which learned episode `request.text` belongs to
    ///
    /// NoMatch and Ambiguous are verdicts inside the result, not errors.
    ///
    /// # Errors
    /// - `InvalidInput` for empty dialogue
    /// - `Config` for out-of-range relevance tunables
    /// - `Fingerprint` when the backend fails
    /// - `Cancelled` when `cancel` fires before the decision
    pub async fn identify(
        &self,
        request: &IdentifyRequest,
        config: &EngineConfig,
        cancel: &CancellationToken,
    ) -> Result<IdentificationResult, IdentifyError> {
        if request.text.trim().is_empty() {
            return Err(IdentifyError::InvalidInput(
                "dialogue text is empty".to_string(),
            ));
        }

        check_cancelled(cancel, "extraction")?;
        let extraction = RelevanceFilter::new(config.relevance.clone())?.extract(&request.text);

        check_cancelled(cancel, "fingerprint")?;
        let fingerprint = self
            .fingerprint(&extraction, request.source_format, config, cancel)
            .await?;

        check_cancelled(cancel, "search")?;
        let mut query = SearchQuery::from_params(&config.search);
        query.series = request.series.clone();
        query.season = request.season;
        let candidates = self.corpus.search(&fingerprint, &query);
        debug!(
            candidates = candidates.len(),
            series = ?query.series,
            season = ?query.season,
            "Corpus search complete"
        );

        check_cancelled(cancel, "decision")?;
        let method = MatchMethod {
            strategy: fingerprint.strategy(),
            text_scope: extraction.text_scope(),
        };
        let mut result = MatchDecisionEngine::new(config.search.ambiguity_band).decide(
            candidates,
            config.thresholds.tier(request.source_format),
            method,
            request.source_format,
        );
        result.extraction = Some(extraction.summary());

        Ok(result)
    }

    /// Learn (or re-learn) an episode's dialogue
    ///
    /// A stored record is re-fingerprinted only when its strategy or
    /// embedding dimension differs from the configured one, or the dialogue
    /// changed.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty series or dialogue
    /// - `Fingerprint` / `Corpus` on backend or store failure
    /// - `Cancelled` when `cancel` fires before the corpus write
    pub async fn learn(
        &self,
        request: &LearnRequest,
        config: &EngineConfig,
        cancel: &CancellationToken,
    ) -> Result<LearnOutcome, IdentifyError> {
        request.key.validate().map_err(IdentifyError::InvalidInput)?;
        if request.text.trim().is_empty() {
            return Err(IdentifyError::InvalidInput(
                "dialogue text is empty".to_string(),
            ));
        }

        let hash = text_hash(&request.text);
        let existing = self.corpus.get(&request.key);

        let reusable = existing.as_ref().filter(|r| {
            r.strategy() == config.strategy
                && r.text_hash == hash
                && r.source_format() == request.source_format
                && r
                    .fingerprint
                    .dimension()
                    .map_or(true, |d| d == config.embedding.dimension)
        });
        if let Some(record) = reusable {
            if record.episode_name == request.episode_name {
                debug!(key = %request.key, "Corpus record already current");
                return Ok(LearnOutcome::Unchanged { guid: record.guid });
            }

            check_cancelled(cancel, "corpus write")?;
            let updated = CorpusRecord::new(
                request.key.clone(),
                request.episode_name.clone(),
                record.fingerprint.clone(),
                hash,
            );
            let (stored, _) = self.corpus.upsert(updated).await?;
            info!(key = %request.key, "Updated corpus record metadata");
            return Ok(LearnOutcome::Updated { guid: stored.guid });
        }

        check_cancelled(cancel, "extraction")?;
        let extraction = RelevanceFilter::new(config.relevance.clone())?.extract(&request.text);

        check_cancelled(cancel, "fingerprint")?;
        let fingerprint = self
            .fingerprint(&extraction, request.source_format, config, cancel)
            .await?;

        check_cancelled(cancel, "corpus write")?;
        let record = CorpusRecord::new(
            request.key.clone(),
            request.episode_name.clone(),
            fingerprint,
            hash,
        );
        let (stored, _) = self.corpus.upsert(record).await?;

        let outcome = match existing {
            None => LearnOutcome::Inserted { guid: stored.guid },
            Some(previous) => LearnOutcome::Refingerprinted {
                guid: stored.guid,
                previous_strategy: previous.strategy(),
            },
        };

        info!(
            key = %request.key,
            strategy = %config.strategy,
            fallback = extraction.fallback_triggered,
            outcome = ?outcome,
            "Learned episode"
        );
        Ok(outcome)
    }

    async fn fingerprint(
        &self,
        extraction: &ExtractionResult,
        source_format: SourceFormat,
        config: &EngineConfig,
        cancel: &CancellationToken,
    ) -> Result<Fingerprint, IdentifyError> {
        let generator = FingerprintGenerator::for_strategy(
            config.strategy,
            self.embedding_backend.clone(),
            config.embedding.dimension,
        )?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(IdentifyError::Cancelled { stage: "fingerprint" }),
            fingerprint = generator.fingerprint(&extraction.filtered_text, source_format) => {
                Ok(fingerprint?)
            }
        }
    }
}

fn check_cancelled(cancel: &CancellationToken, stage: &'static str) -> Result<(), IdentifyError> {
    if cancel.is_cancelled() {
        debug!(stage, "Pipeline cancelled");
        return Err(IdentifyError::Cancelled { stage });
    }
    Ok(())
}
