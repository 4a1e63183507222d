//! Data models for epmatch-engine

pub mod corpus_record;
pub mod fingerprint;
pub mod identification;

pub use corpus_record::{normalize_series, CorpusRecord, EpisodeKey};
pub use fingerprint::{Fingerprint, FingerprintError, FingerprintValue, Similarity};
pub use identification::{
    ExtractionSummary, IdentificationResult, MatchCandidate, MatchMethod, NoMatchReason,
    TextScope, Verdict,
};
