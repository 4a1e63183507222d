//! Tags shared between configuration and the matching engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Subtitle source the dialogue text was extracted from
///
/// Image-based sources (PGS, VobSub) pass through OCR upstream and are
/// noisier than text subtitles, so each format gets its own threshold tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Text subtitles (SRT, ASS, WebVTT)
    Text,
    /// Blu-ray bitmap subtitles, OCR'd upstream
    Pgs,
    /// DVD bitmap subtitles, OCR'd upstream
    VobSub,
}

impl SourceFormat {
    /// Convert to string representation (also the persisted form)
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Text => "text",
            SourceFormat::Pgs => "pgs",
            SourceFormat::VobSub => "vobsub",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "srt" => Ok(SourceFormat::Text),
            "pgs" => Ok(SourceFormat::Pgs),
            "vobsub" => Ok(SourceFormat::VobSub),
            other => Err(Error::InvalidInput(format!("Unknown source format: {}", other))),
        }
    }
}

/// Fingerprint generation strategy
///
/// Persisted alongside every corpus fingerprint. Fingerprints produced by
/// different strategies are never compared with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintStrategy {
    /// Context-triggered piecewise hash, compared by edit distance (0-100)
    FuzzyHash,
    /// Dense sentence embedding, compared by cosine similarity
    Embedding,
}

impl FingerprintStrategy {
    /// Convert to string representation (also the persisted form)
    pub fn as_str(&self) -> &'static str {
        match self {
            FingerprintStrategy::FuzzyHash => "fuzzy_hash",
            FingerprintStrategy::Embedding => "embedding",
        }
    }
}

impl fmt::Display for FingerprintStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FingerprintStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fuzzy_hash" => Ok(FingerprintStrategy::FuzzyHash),
            "embedding" => Ok(FingerprintStrategy::Embedding),
            other => Err(Error::InvalidInput(format!(
                "Unknown fingerprint strategy: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_format_round_trips_through_str() {
        for format in [SourceFormat::Text, SourceFormat::Pgs, SourceFormat::VobSub] {
            assert_eq!(format.as_str().parse::<SourceFormat>().unwrap(), format);
        }
        assert_eq!("SRT".parse::<SourceFormat>().unwrap(), SourceFormat::Text);
        assert!("bluray".parse::<SourceFormat>().is_err());
    }

    #[test]
    fn strategy_parse_rejects_unknown() {
        assert_eq!(
            "embedding".parse::<FingerprintStrategy>().unwrap(),
            FingerprintStrategy::Embedding
        );
        assert!("minhash".parse::<FingerprintStrategy>().is_err());
    }
}
