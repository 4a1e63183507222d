//! Test Helper Utilities
//!
//! Shared utilities for testing epmatch-engine

#![allow(dead_code)]

pub mod backends;
pub mod dialogue;

pub use backends::{
    hash_embed, FailingBackend, HashingEmbeddingBackend, SlowBackend, TEST_DIMENSION,
};
pub use dialogue::{episode_dialogue, episode_text, Lcg, FILLER};

use epmatch_engine::{
    Corpus, CorpusRecord, EngineConfig, EpisodeKey, Fingerprint, FingerprintStrategy,
    SourceFormat,
};
use epmatch_common::config::LoggingConfig;
use std::sync::Arc;

/// Route engine logs to the test output (first call wins)
pub fn init_test_logging() {
    let _ = epmatch_common::logging::init_tracing(&LoggingConfig {
        level: "epmatch_engine=debug".to_string(),
        file: None,
    });
}

/// Default configuration for the given strategy
pub fn config_for(strategy: FingerprintStrategy) -> EngineConfig {
    EngineConfig {
        strategy,
        ..EngineConfig::default()
    }
}

pub async fn memory_corpus() -> Arc<Corpus> {
    Arc::new(Corpus::open_in_memory().await.unwrap())
}

/// Corpus record holding an embedding
pub fn embedding_record(series: &str, season: u32, episode: u32, vector: Vec<f32>) -> CorpusRecord {
    CorpusRecord::new(
        EpisodeKey::new(series, season, episode),
        Some(format!("{} {}x{:02}", series, season, episode)),
        Fingerprint::embedding(vector, SourceFormat::Text).unwrap(),
        format!("hash-{}-{}-{}", series, season, episode),
    )
}

/// Unit-ish vector pointing mostly along `axis`, nudged by `offset`
pub fn near_axis(axis: usize, offset: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; 16];
    v[axis] = 1.0;
    v[(axis + 1) % 16] = offset;
    v
}
