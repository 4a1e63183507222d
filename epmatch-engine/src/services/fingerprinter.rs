//! Dialogue fingerprinting
//!
//! Turns (filtered) dialogue text into a strategy-tagged [`Fingerprint`].
//! Both strategies see the same normalized text: lowercased with
//! whitespace collapsed, so formatting noise from subtitle cleanup does not
//! change the result.

use epmatch_common::{FingerprintStrategy, SourceFormat};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use super::embedding_client::EmbeddingBackend;
use super::fuzzy_hash;
use crate::models::Fingerprint;

pub use crate::models::FingerprintError;

/// Normalize dialogue before hashing or embedding
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// SHA-256 (hex) of the normalized text
pub fn text_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(normalize_text(text).as_bytes()))
}

/// Fingerprint generator for one strategy
#[derive(Clone)]
pub struct FingerprintGenerator {
    strategy: FingerprintStrategy,
    backend: Option<Arc<dyn EmbeddingBackend>>,
    dimension: usize,
}

impl std::fmt::Debug for FingerprintGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintGenerator")
            .field("strategy", &self.strategy)
            .field("model", &self.backend.as_ref().map(|b| b.model_name().to_string()))
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FingerprintGenerator {
    /// Fuzzy-hash generator (no external backend)
    pub fn fuzzy_hash() -> Self {
        Self {
            strategy: FingerprintStrategy::FuzzyHash,
            backend: None,
            dimension: 0,
        }
    }

    /// Embedding generator expecting vectors of `dimension`
    pub fn embedding(backend: Arc<dyn EmbeddingBackend>, dimension: usize) -> Self {
        Self {
            strategy: FingerprintStrategy::Embedding,
            backend: Some(backend),
            dimension,
        }
    }

    /// Generator for the configured strategy
    ///
    /// # Errors
    /// `Unavailable` when the embedding strategy is requested without a backend
    pub fn for_strategy(
        strategy: FingerprintStrategy,
        backend: Option<Arc<dyn EmbeddingBackend>>,
        dimension: usize,
    ) -> Result<Self, FingerprintError> {
        match strategy {
            FingerprintStrategy::FuzzyHash => Ok(Self::fuzzy_hash()),
            FingerprintStrategy::Embedding => backend
                .map(|b| Self::embedding(b, dimension))
                .ok_or_else(|| {
                    FingerprintError::Unavailable("no embedding backend configured".to_string())
                }),
        }
    }

    pub fn strategy(&self) -> FingerprintStrategy {
        self.strategy
    }

    /// Fingerprint `text`, tagging it with `source_format`
    ///
    /// # Errors
    /// - `InvalidInput` for empty text
    /// - `Unavailable` when the backend fails
    /// - `DimensionMismatch` / `DegenerateVector` for unusable embeddings
    pub async fn fingerprint(
        &self,
        text: &str,
        source_format: SourceFormat,
    ) -> Result<Fingerprint, FingerprintError> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Err(FingerprintError::InvalidInput(
                "dialogue text is empty".to_string(),
            ));
        }

        match (&self.strategy, &self.backend) {
            (FingerprintStrategy::FuzzyHash, _) => {
                let chars = normalized.len();
                let digest =
                    tokio::task::spawn_blocking(move || fuzzy_hash::digest(normalized.as_bytes()))
                        .await
                        .map_err(|e| {
                            FingerprintError::Unavailable(format!("hash task failed: {}", e))
                        })?;
                debug!(chars, digest = %digest, "Computed fuzzy hash");
                Fingerprint::fuzzy_hash(digest, source_format)
            }
            (FingerprintStrategy::Embedding, Some(backend)) => {
                let vector = backend.embed(&normalized).await?;
                if vector.len() != self.dimension {
                    return Err(FingerprintError::DimensionMismatch {
                        expected: self.dimension,
                        actual: vector.len(),
                    });
                }
                debug!(
                    model = backend.model_name(),
                    dimension = vector.len(),
                    "Computed embedding"
                );
                Fingerprint::embedding(vector, source_format)
            }
            (FingerprintStrategy::Embedding, None) => Err(FingerprintError::Unavailable(
                "no embedding backend configured".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedBackend(Vec<f32>);

    #[async_trait]
    impl EmbeddingBackend for FixedBackend {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, FingerprintError> {
            Ok(self.0.clone())
        }
        fn dimension(&self) -> usize {
            self.0.len()
        }
        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn normalization_ignores_case_and_spacing() {
        assert_eq!(normalize_text("  Hello\n  WORLD "), "hello world");
        assert_eq!(text_hash("Hello   world"), text_hash("hello world"));
        assert_ne!(text_hash("hello world"), text_hash("hello there"));
    }

    #[tokio::test]
    async fn fuzzy_hash_is_idempotent() {
        let generator = FingerprintGenerator::fuzzy_hash();
        let text = "The reactor is failing. We have ten minutes. Get everyone to the shuttle bay now.";
        let a = generator.fingerprint(text, SourceFormat::Text).await.unwrap();
        let b = generator.fingerprint(text, SourceFormat::Text).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.strategy(), FingerprintStrategy::FuzzyHash);
        assert_eq!(a.source_format(), SourceFormat::Text);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let generator = FingerprintGenerator::fuzzy_hash();
        assert!(matches!(
            generator.fingerprint(" \n ", SourceFormat::Pgs).await,
            Err(FingerprintError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected() {
        let generator = FingerprintGenerator::embedding(Arc::new(FixedBackend(vec![1.0; 8])), 384);
        assert!(matches!(
            generator.fingerprint("some text", SourceFormat::Text).await,
            Err(FingerprintError::DimensionMismatch {
                expected: 384,
                actual: 8
            })
        ));
    }

    #[tokio::test]
    async fn zero_vector_is_never_substituted() {
        let generator = FingerprintGenerator::embedding(Arc::new(FixedBackend(vec![0.0; 4])), 4);
        assert!(matches!(
            generator.fingerprint("some text", SourceFormat::VobSub).await,
            Err(FingerprintError::DegenerateVector)
        ));
    }

    #[test]
    fn embedding_strategy_requires_backend() {
        assert!(matches!(
            FingerprintGenerator::for_strategy(FingerprintStrategy::Embedding, None, 384),
            Err(FingerprintError::Unavailable(_))
        ));
    }
}
