//! Identification results
//!
//! Everything here is serializable; the renaming and reporting layers
//! consume it as-is.

use epmatch_common::{FingerprintStrategy, SourceFormat};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EpisodeKey;

/// One corpus row scored against the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub guid: Uuid,
    #[serde(flatten)]
    pub key: EpisodeKey,
    pub episode_name: Option<String>,
    /// Format the corpus row was learned from
    pub source_format: SourceFormat,
    /// Similarity in [0, 1]
    pub similarity: f32,
    /// Metric-native score (0-100 fuzzy score or raw cosine)
    pub raw_score: f32,
    /// 1-based position in the search result
    pub rank: usize,
}

/// Which text the query fingerprint was computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextScope {
    /// Relevance-filtered subset
    Filtered,
    /// Full text after an extraction fallback
    FullText,
}

/// How the match was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchMethod {
    pub strategy: FingerprintStrategy,
    pub text_scope: TextScope,
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scope = match self.text_scope {
            TextScope::Filtered => "filtered",
            TextScope::FullText => "full_text",
        };
        write!(f, "{}/{}", self.strategy, scope)
    }
}

/// Why a search produced no match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchReason {
    /// Corpus (after filters) had nothing comparable
    NoCandidates,
    /// Best similarity below the tier's embed-similarity gate
    BelowSimilarityGate { similarity: f32, gate: f32 },
    /// Confidence below the tier's match-confidence gate
    BelowMatchConfidence { confidence: f32, gate: f32 },
}

/// Final decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Match,
    Ambiguous,
    NoMatch { reason: NoMatchReason },
}

/// Extraction metadata carried into the result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub total_count: usize,
    pub selected_count: usize,
    pub selection_percentage: f64,
    pub fallback_triggered: bool,
    pub fallback_reason: Option<String>,
    pub processing_time_ms: u64,
}

/// Outcome of one identification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationResult {
    pub verdict: Verdict,
    pub matched: bool,
    pub ambiguous: bool,
    /// Confidence reached the tier's rename gate
    pub rename_eligible: bool,
    /// Identity of the match (None unless `matched`)
    pub key: Option<EpisodeKey>,
    pub episode_name: Option<String>,
    /// Format of the query dialogue
    pub source_format: SourceFormat,
    /// Confidence of the best candidate (0 with no candidates)
    pub match_confidence: f32,
    pub match_method: MatchMethod,
    /// Full ranked candidate list
    pub candidates: Vec<MatchCandidate>,
    /// Candidates tied within the ambiguity band (only when ambiguous)
    pub contenders: Vec<MatchCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionSummary>,
}

impl IdentificationResult {
    /// Best candidate, if any
    pub fn best(&self) -> Option<&MatchCandidate> {
        self.candidates.first()
    }
}
