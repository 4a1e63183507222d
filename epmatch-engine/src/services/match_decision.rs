//! Match decision engine
//!
//! Turns a ranked candidate list into a Match / Ambiguous / NoMatch verdict
//! using the threshold tier of the query's source format.
//!
//! Gates, applied to the best candidate's normalized similarity:
//! 1. below `embed_similarity` → NoMatch
//! 2. below `match_confidence` → NoMatch
//! 3. two or more candidates above `match_confidence` within the ambiguity
//!    band of the best → Ambiguous (all of them returned, none picked)
//! 4. at or above `rename_confidence` → rename-eligible Match
//!
//! Tier ordering is validated when configuration loads; tiers passed in
//! here are used as given.

use epmatch_common::{SourceFormat, ThresholdTier};
use tracing::info;

use crate::models::{IdentificationResult, MatchCandidate, MatchMethod, NoMatchReason, Verdict};

/// Slack added to the band so candidates exactly `band` apart still tie
const BAND_EPSILON: f32 = 1e-6;

/// Applies threshold tiers to ranked candidates
#[derive(Debug, Clone, Copy)]
pub struct MatchDecisionEngine {
    ambiguity_band: f32,
}

impl Default for MatchDecisionEngine {
    fn default() -> Self {
        Self {
            ambiguity_band: 0.02,
        }
    }
}

impl MatchDecisionEngine {
    pub fn new(ambiguity_band: f32) -> Self {
        Self { ambiguity_band }
    }

    pub fn ambiguity_band(&self) -> f32 {
        self.ambiguity_band
    }

    /// Decide on `candidates` (ranked, best first)
    pub fn decide(
        &self,
        candidates: Vec<MatchCandidate>,
        tier: &ThresholdTier,
        match_method: MatchMethod,
        source_format: SourceFormat,
    ) -> IdentificationResult {
        let mut result = IdentificationResult {
            verdict: Verdict::NoMatch {
                reason: NoMatchReason::NoCandidates,
            },
            matched: false,
            ambiguous: false,
            rename_eligible: false,
            key: None,
            episode_name: None,
            source_format,
            match_confidence: 0.0,
            match_method,
            candidates: Vec::new(),
            contenders: Vec::new(),
            extraction: None,
        };

        let Some(best) = candidates.first().cloned() else {
            info!(%source_format, "No candidates to decide on");
            return result;
        };

        // Both strategies already report similarity in [0, 1]
        let confidence = best.similarity;
        result.match_confidence = confidence;

        if best.similarity < tier.embed_similarity {
            result.verdict = Verdict::NoMatch {
                reason: NoMatchReason::BelowSimilarityGate {
                    similarity: best.similarity,
                    gate: tier.embed_similarity,
                },
            };
        } else if confidence < tier.match_confidence {
            result.verdict = Verdict::NoMatch {
                reason: NoMatchReason::BelowMatchConfidence {
                    confidence,
                    gate: tier.match_confidence,
                },
            };
        } else {
            let contenders: Vec<MatchCandidate> = candidates
                .iter()
                .filter(|c| {
                    c.similarity >= tier.match_confidence
                        && best.similarity - c.similarity <= self.ambiguity_band + BAND_EPSILON
                })
                .cloned()
                .collect();

            if contenders.len() >= 2 {
                result.verdict = Verdict::Ambiguous;
                result.ambiguous = true;
                result.contenders = contenders;
            } else {
                result.verdict = Verdict::Match;
                result.matched = true;
                result.rename_eligible = confidence >= tier.rename_confidence;
                result.key = Some(best.key.clone());
                result.episode_name = best.episode_name.clone();
            }
        }

        info!(
            verdict = ?result.verdict,
            confidence,
            rename_eligible = result.rename_eligible,
            candidates = candidates.len(),
            best = %best.key,
            method = %match_method,
            "Match decision"
        );

        result.candidates = candidates;
        result
    }
}
