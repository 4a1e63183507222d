//! Error types for epmatch-engine
//!
//! Storage and backend failures propagate to the caller, which decides
//! whether to retry. Fallback extraction, NoMatch and Ambiguous are not
//! errors; they are recorded in the returned results.

use thiserror::Error;

use crate::models::FingerprintError;

/// Corpus persistence and lookup errors
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Store unreachable or query failed
    #[error("Corpus store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// Filesystem error while opening the store
    #[error("Corpus I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record rejected before reaching the store
    #[error("Invalid corpus record: {0}")]
    InvalidRecord(String),

    /// Persisted row cannot be decoded
    #[error("Corrupt corpus row {guid}: {reason}")]
    CorruptRow { guid: String, reason: String },
}

/// Errors from the identify and learn pipelines
#[derive(Debug, Error)]
pub enum IdentifyError {
    /// Empty dialogue, malformed key
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration rejected by validation
    #[error(transparent)]
    Config(#[from] epmatch_common::Error),

    /// Fingerprint backend failed or fingerprints are incompatible
    #[error("Fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    /// Corpus store failed
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    /// Caller cancelled the call; nothing was written
    #[error("Cancelled before {stage}")]
    Cancelled { stage: &'static str },
}
