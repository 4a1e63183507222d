//! Learned episode records

use chrono::{DateTime, Utc};
use epmatch_common::{FingerprintStrategy, SourceFormat};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Fingerprint;

/// Corpus key: (series, season, episode[, variant])
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeKey {
    pub series: String,
    pub season: u32,
    pub episode: u32,
    /// Distinguishes cuts of the same episode (e.g. "extended")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl EpisodeKey {
    pub fn new(series: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            series: series.into(),
            season,
            episode,
            variant: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        let variant = variant.into();
        self.variant = if variant.trim().is_empty() {
            None
        } else {
            Some(variant)
        };
        self
    }

    /// Reject keys that cannot be stored
    pub fn validate(&self) -> Result<(), String> {
        if self.series.trim().is_empty() {
            return Err("series name cannot be empty".to_string());
        }
        Ok(())
    }

    /// Case- and whitespace-insensitive series name used by the series pre-filter
    pub fn series_key(&self) -> String {
        normalize_series(&self.series)
    }

    /// Variant as stored (empty string when absent)
    pub fn variant_str(&self) -> &str {
        self.variant.as_deref().unwrap_or("")
    }
}

impl std::fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} S{:02}E{:02}", self.series, self.season, self.episode)?;
        if let Some(variant) = &self.variant {
            write!(f, " [{}]", variant)?;
        }
        Ok(())
    }
}

/// Normalize a series name for filtering
pub fn normalize_series(series: &str) -> String {
    series
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One learned episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub guid: Uuid,
    #[serde(flatten)]
    pub key: EpisodeKey,
    pub episode_name: Option<String>,
    pub fingerprint: Fingerprint,
    /// SHA-256 (hex) of the normalized dialogue the fingerprint was learned from
    pub text_hash: String,
    pub learned_at: DateTime<Utc>,
}

impl CorpusRecord {
    /// Create a new record with a fresh guid
    pub fn new(
        key: EpisodeKey,
        episode_name: Option<String>,
        fingerprint: Fingerprint,
        text_hash: String,
    ) -> Self {
        Self {
            guid: Uuid::new_v4(),
            key,
            episode_name,
            fingerprint,
            text_hash,
            learned_at: Utc::now(),
        }
    }

    pub fn strategy(&self) -> FingerprintStrategy {
        self.fingerprint.strategy()
    }

    pub fn source_format(&self) -> SourceFormat {
        self.fingerprint.source_format()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_key_ignores_case_and_spacing() {
        let key = EpisodeKey::new("  The   Wire ", 1, 3);
        assert_eq!(key.series_key(), "the wire");
        assert_eq!(normalize_series("THE WIRE"), key.series_key());
    }

    #[test]
    fn blank_variant_is_none() {
        let key = EpisodeKey::new("Lost", 2, 1).with_variant("  ");
        assert_eq!(key.variant, None);
        assert_eq!(key.variant_str(), "");

        let key = EpisodeKey::new("Lost", 2, 1).with_variant("extended");
        assert_eq!(key.variant_str(), "extended");
        assert_eq!(key.to_string(), "Lost S02E01 [extended]");
    }

    #[test]
    fn empty_series_is_invalid() {
        assert!(EpisodeKey::new(" ", 1, 1).validate().is_err());
        assert!(EpisodeKey::new("Firefly", 1, 1).validate().is_ok());
    }
}
