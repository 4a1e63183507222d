//! In-test embedding backends

use async_trait::async_trait;
use epmatch_engine::{EmbeddingBackend, FingerprintError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const TEST_DIMENSION: usize = 384;

/// Deterministic bag-of-words embedding: each word hashes to a signed slot
#[derive(Debug)]
pub struct HashingEmbeddingBackend {
    calls: AtomicUsize,
    dimension: usize,
}

impl Default for HashingEmbeddingBackend {
    fn default() -> Self {
        Self::with_dimension(TEST_DIMENSION)
    }
}

impl HashingEmbeddingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stand-in for a model producing `dimension`-length vectors
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            dimension,
        }
    }

    /// Number of `embed` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for b in word.to_lowercase().bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x0100_0000_01b3);
        }
        let slot = (h % dimension as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        vector[slot] += sign;
    }
    vector
}

#[async_trait]
impl EmbeddingBackend for HashingEmbeddingBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, FingerprintError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(hash_embed(text, self.dimension))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "test-hashing"
    }
}

/// Backend that is always down
#[derive(Debug, Default)]
pub struct FailingBackend;

#[async_trait]
impl EmbeddingBackend for FailingBackend {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, FingerprintError> {
        Err(FingerprintError::Unavailable(
            "connection refused".to_string(),
        ))
    }

    fn dimension(&self) -> usize {
        TEST_DIMENSION
    }

    fn model_name(&self) -> &str {
        "test-failing"
    }
}

/// Backend that answers only after `delay`
#[derive(Debug)]
pub struct SlowBackend {
    pub delay: Duration,
}

#[async_trait]
impl EmbeddingBackend for SlowBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, FingerprintError> {
        tokio::time::sleep(self.delay).await;
        Ok(hash_embed(text, TEST_DIMENSION))
    }

    fn dimension(&self) -> usize {
        TEST_DIMENSION
    }

    fn model_name(&self) -> &str {
        "test-slow"
    }
}
