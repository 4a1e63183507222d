//! Relevance filter
//!
//! Ranks sentences over a similarity graph and keeps the top share, in
//! original document order. When the selection would be too thin to
//! fingerprint reliably the full original text is returned instead, and
//! the reason is recorded.

use epmatch_common::config::RelevanceParams;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::rank_graph::SentenceGraph;
use super::sentence_segmenter::{word_count, SentenceSegmenter};
use crate::models::{ExtractionSummary, TextScope};

/// A sentence with its normalized rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSentence {
    pub text: String,
    /// Share of the document's total rank, in [0, 1]
    pub score: f64,
    pub original_index: usize,
    pub word_count: usize,
    pub selected: bool,
}

/// Why the filter returned the full text
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Fewer than two sentences, so no graph can be built
    TooFewSentences { total: usize },
    /// Selected fewer sentences than `min_sentences`
    BelowMinSentences { selected: usize, min: usize },
    /// Selected share below `min_percentage`
    BelowMinPercentage { percentage: f64, min: f64 },
    /// Filtered text shorter than `min_filtered_chars`
    FilteredTextTooShort { chars: usize, min: usize },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::TooFewSentences { total } => write!(
                f,
                "{} sentence(s) is below the minimum sentence count of 2 needed for ranking",
                total
            ),
            FallbackReason::BelowMinSentences { selected, min } => write!(
                f,
                "{} selected sentence(s) is below the minimum sentence count of {}",
                selected, min
            ),
            FallbackReason::BelowMinPercentage { percentage, min } => write!(
                f,
                "selection of {:.1}% is below the minimum percentage of {}%",
                percentage, min
            ),
            FallbackReason::FilteredTextTooShort { chars, min } => write!(
                f,
                "filtered text of {} characters is below the minimum of {}",
                chars, min
            ),
        }
    }
}

/// Result of one extraction
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Text to fingerprint: the selection, or the original text on fallback
    pub filtered_text: String,
    pub total_count: usize,
    /// Sentences chosen by ranking (reported even when falling back)
    pub selected_count: usize,
    /// Mean score of selected sentences
    pub average_score: f64,
    pub selection_percentage: f64,
    pub fallback_triggered: bool,
    pub fallback_reason: Option<FallbackReason>,
    pub processing_time: Duration,
    pub iterations: usize,
    pub converged: bool,
    pub sentences: Vec<RankedSentence>,
}

impl ExtractionResult {
    /// Which text the result carries
    pub fn text_scope(&self) -> TextScope {
        if self.fallback_triggered {
            TextScope::FullText
        } else {
            TextScope::Filtered
        }
    }

    /// Serializable metadata for reporting
    pub fn summary(&self) -> ExtractionSummary {
        ExtractionSummary {
            total_count: self.total_count,
            selected_count: self.selected_count,
            selection_percentage: self.selection_percentage,
            fallback_triggered: self.fallback_triggered,
            fallback_reason: self.fallback_reason.map(|r| r.to_string()),
            processing_time_ms: self.processing_time.as_millis() as u64,
        }
    }
}

/// Graph-ranked sentence selection
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    params: RelevanceParams,
    segmenter: SentenceSegmenter,
}

impl RelevanceFilter {
    /// Create a filter; out-of-range tunables are rejected
    pub fn new(params: RelevanceParams) -> epmatch_common::Result<Self> {
        params.validate()?;
        let segmenter = SentenceSegmenter::new(params.min_words);
        Ok(Self { params, segmenter })
    }

    pub fn params(&self) -> &RelevanceParams {
        &self.params
    }

    /// Rank, select and apply the fallback policy
    pub fn extract(&self, text: &str) -> ExtractionResult {
        let started = Instant::now();
        let sentences = self.segmenter.segment(text);
        let total_count = sentences.len();

        if total_count < 2 {
            let reason = FallbackReason::TooFewSentences { total: total_count };
            warn!(total_count, reason = %reason, "Relevance filter fell back to full text");
            return ExtractionResult {
                filtered_text: text.to_string(),
                total_count,
                selected_count: 0,
                average_score: 0.0,
                selection_percentage: 0.0,
                fallback_triggered: true,
                fallback_reason: Some(reason),
                processing_time: started.elapsed(),
                iterations: 0,
                converged: false,
                sentences: sentences
                    .into_iter()
                    .enumerate()
                    .map(|(i, s)| RankedSentence {
                        word_count: word_count(&s),
                        text: s,
                        score: 1.0,
                        original_index: i,
                        selected: false,
                    })
                    .collect(),
            };
        }

        let graph = SentenceGraph::build(&sentences, self.params.similarity_threshold);
        let outcome = graph.rank(
            self.params.damping,
            self.params.convergence_threshold,
            self.params.max_iterations,
        );

        let rank_total: f64 = outcome.ranks.iter().sum();
        let scores: Vec<f64> = outcome
            .ranks
            .iter()
            .map(|r| if rank_total > 0.0 { r / rank_total } else { 0.0 })
            .collect();

        let target = ((total_count as f64 * self.params.percentage / 100.0).ceil() as usize)
            .clamp(1, total_count);

        let mut order: Vec<usize> = (0..total_count).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
        let mut selected = vec![false; total_count];
        for &idx in order.iter().take(target) {
            selected[idx] = true;
        }

        let ranked: Vec<RankedSentence> = sentences
            .into_iter()
            .enumerate()
            .map(|(i, s)| RankedSentence {
                word_count: word_count(&s),
                text: s,
                score: scores[i],
                original_index: i,
                selected: selected[i],
            })
            .collect();

        let selection_text = ranked
            .iter()
            .filter(|s| s.selected)
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let selected_count = target;
        let selection_percentage = selected_count as f64 / total_count as f64 * 100.0;
        let average_score = ranked
            .iter()
            .filter(|s| s.selected)
            .map(|s| s.score)
            .sum::<f64>()
            / selected_count as f64;

        let fallback_reason = self.fallback_reason(
            selected_count,
            selection_percentage,
            selection_text.chars().count(),
        );

        debug!(
            total_count,
            selected_count,
            edges = graph.edge_count(),
            iterations = outcome.iterations,
            converged = outcome.converged,
            "Ranked sentences"
        );

        let filtered_text = match &fallback_reason {
            Some(reason) => {
                warn!(
                    total_count,
                    selected_count,
                    reason = %reason,
                    "Relevance filter fell back to full text"
                );
                text.to_string()
            }
            None => selection_text,
        };

        ExtractionResult {
            filtered_text,
            total_count,
            selected_count,
            average_score,
            selection_percentage,
            fallback_triggered: fallback_reason.is_some(),
            fallback_reason,
            processing_time: started.elapsed(),
            iterations: outcome.iterations,
            converged: outcome.converged,
            sentences: ranked,
        }
    }

    fn fallback_reason(
        &self,
        selected: usize,
        percentage: f64,
        chars: usize,
    ) -> Option<FallbackReason> {
        if selected < self.params.min_sentences {
            return Some(FallbackReason::BelowMinSentences {
                selected,
                min: self.params.min_sentences,
            });
        }
        if percentage < self.params.min_percentage {
            return Some(FallbackReason::BelowMinPercentage {
                percentage,
                min: self.params.min_percentage,
            });
        }
        if chars < self.params.min_filtered_chars {
            return Some(FallbackReason::FilteredTextTooShort {
                chars,
                min: self.params.min_filtered_chars,
            });
        }
        None
    }
}
