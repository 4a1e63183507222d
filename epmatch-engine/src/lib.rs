//! epmatch-engine - Episode identification by dialogue fingerprinting
//!
//! Identifies which episode of a series a video's dialogue belongs to by
//! comparing it against a corpus of learned episode fingerprints.
//!
//! # Pipeline
//! dialogue text → sentence segmentation → relevance filtering (graph ranking)
//! → fingerprint (fuzzy hash or embedding) → corpus search → match decision
//!
//! Subtitle extraction, OCR, renaming and CLI handling are collaborators
//! outside this crate; the engine never touches media files.

pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{CorpusError, IdentifyError};
pub use crate::models::{
    CorpusRecord, EpisodeKey, Fingerprint, FingerprintError, FingerprintValue,
    IdentificationResult, MatchCandidate, MatchMethod, Verdict,
};
pub use crate::services::{
    Corpus, CorpusIndex, EmbeddingBackend, EpisodeIdentifier, ExtractionResult,
    FingerprintGenerator, HttpEmbeddingClient, IdentifyRequest, LearnOutcome, LearnRequest,
    MatchDecisionEngine, RelevanceFilter, SearchQuery, SentenceSegmenter,
};
pub use epmatch_common::{EngineConfig, FingerprintStrategy, SourceFormat, ThresholdTier};
pub use tokio_util::sync::CancellationToken;
