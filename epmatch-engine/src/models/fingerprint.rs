//! Fingerprint values and their comparison
//!
//! A fingerprint is either a fuzzy-hash digest or a unit-length embedding
//! vector. The variant is the strategy tag; comparison dispatches on it and
//! refuses to compare fingerprints of different strategies.

use epmatch_common::{FingerprintStrategy, SourceFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::fuzzy_hash;

/// Fingerprinting errors
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// Empty or otherwise unusable text
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Hash/embedding backend unreachable or errored
    #[error("Fingerprint backend unavailable: {0}")]
    Unavailable(String),

    /// Embedding length differs from the configured dimension
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding has zero or non-finite norm and cannot be normalized
    #[error("Embedding vector is degenerate (zero or non-finite norm)")]
    DegenerateVector,

    /// Fingerprints generated by different strategies
    #[error("Cannot compare {left} fingerprint with {right} fingerprint")]
    StrategyMismatch {
        left: FingerprintStrategy,
        right: FingerprintStrategy,
    },

    /// Fuzzy-hash digest does not parse
    #[error("Invalid fuzzy hash digest: {0}")]
    InvalidDigest(String),
}

/// Strategy-tagged fingerprint payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "value", rename_all = "snake_case")]
pub enum FingerprintValue {
    /// `blocksize:digest1:digest2`
    FuzzyHash(String),
    /// L2-normalized embedding
    Embedding(Vec<f32>),
}

impl FingerprintValue {
    /// Strategy that produced this value
    pub fn strategy(&self) -> FingerprintStrategy {
        match self {
            FingerprintValue::FuzzyHash(_) => FingerprintStrategy::FuzzyHash,
            FingerprintValue::Embedding(_) => FingerprintStrategy::Embedding,
        }
    }
}

/// Similarity between two fingerprints of the same strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Similarity {
    /// Metric-native score: 0-100 for fuzzy hash, cosine for embeddings
    pub raw: f32,
    /// Score mapped to [0, 1], used by thresholds and ranking
    pub normalized: f32,
}

/// Comparable content fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    value: FingerprintValue,
    source_format: SourceFormat,
}

impl Fingerprint {
    /// Wrap a fuzzy-hash digest (validated)
    pub fn fuzzy_hash(
        digest: impl Into<String>,
        source_format: SourceFormat,
    ) -> Result<Self, FingerprintError> {
        let digest = digest.into();
        fuzzy_hash::parse_digest(&digest)?;
        Ok(Self {
            value: FingerprintValue::FuzzyHash(digest),
            source_format,
        })
    }

    /// Wrap an embedding vector, normalizing it to unit length
    pub fn embedding(
        vector: Vec<f32>,
        source_format: SourceFormat,
    ) -> Result<Self, FingerprintError> {
        Ok(Self {
            value: FingerprintValue::Embedding(l2_normalize(vector)?),
            source_format,
        })
    }

    /// Strategy tag
    pub fn strategy(&self) -> FingerprintStrategy {
        self.value.strategy()
    }

    /// Source format tag
    pub fn source_format(&self) -> SourceFormat {
        self.source_format
    }

    /// Tagged payload
    pub fn value(&self) -> &FingerprintValue {
        &self.value
    }

    /// Embedding dimension (None for fuzzy hashes)
    pub fn dimension(&self) -> Option<usize> {
        match &self.value {
            FingerprintValue::Embedding(v) => Some(v.len()),
            FingerprintValue::FuzzyHash(_) => None,
        }
    }

    /// Compare with another fingerprint of the same strategy
    ///
    /// # Errors
    /// - `StrategyMismatch` when the strategy tags differ
    /// - `DimensionMismatch` for embeddings of different length
    /// - `InvalidDigest` for unparseable fuzzy-hash digests
    pub fn compare(&self, other: &Fingerprint) -> Result<Similarity, FingerprintError> {
        match (&self.value, &other.value) {
            (FingerprintValue::FuzzyHash(a), FingerprintValue::FuzzyHash(b)) => {
                let score = fuzzy_hash::compare(a, b)? as f32;
                Ok(Similarity {
                    raw: score,
                    normalized: score / 100.0,
                })
            }
            (FingerprintValue::Embedding(a), FingerprintValue::Embedding(b)) => {
                if a.len() != b.len() {
                    return Err(FingerprintError::DimensionMismatch {
                        expected: a.len(),
                        actual: b.len(),
                    });
                }
                // Both sides are unit length, so the dot product is the cosine
                let cosine: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let cosine = cosine.clamp(-1.0, 1.0);
                Ok(Similarity {
                    raw: cosine,
                    normalized: cosine.max(0.0),
                })
            }
            (left, right) => Err(FingerprintError::StrategyMismatch {
                left: left.strategy(),
                right: right.strategy(),
            }),
        }
    }
}

/// Scale a vector to unit L2 norm
pub fn l2_normalize(mut vector: Vec<f32>) -> Result<Vec<f32>, FingerprintError> {
    if vector.is_empty() {
        return Err(FingerprintError::DegenerateVector);
    }

    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= f32::EPSILON {
        return Err(FingerprintError::DegenerateVector);
    }

    for x in vector.iter_mut() {
        *x /= norm;
    }
    Ok(vector)
}
