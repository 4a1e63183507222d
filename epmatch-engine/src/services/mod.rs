//! Engine services

pub mod corpus;
pub mod corpus_index;
pub mod embedding_client;
pub mod episode_identifier;
pub mod fingerprinter;
pub mod fuzzy_hash;
pub mod match_decision;
pub mod rank_graph;
pub mod relevance_filter;
pub mod sentence_segmenter;

pub use corpus::Corpus;
pub use corpus_index::{CorpusIndex, CorpusSnapshot, SearchQuery, UpsertKind};
pub use embedding_client::{EmbeddingBackend, HttpEmbeddingClient};
pub use episode_identifier::{EpisodeIdentifier, IdentifyRequest, LearnOutcome, LearnRequest};
pub use fingerprinter::{normalize_text, text_hash, FingerprintGenerator};
pub use match_decision::MatchDecisionEngine;
pub use rank_graph::{RankOutcome, SentenceGraph};
pub use relevance_filter::{ExtractionResult, FallbackReason, RankedSentence, RelevanceFilter};
pub use sentence_segmenter::SentenceSegmenter;
