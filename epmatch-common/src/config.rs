//! Configuration loading and validation
//!
//! The engine reads a single TOML document. Every section is optional and
//! falls back to built-in defaults, but values that are present are range
//! checked once at load time and rejected (never clamped) when invalid.
//!
//! # Resolution order for the config file
//! 1. `EPMATCH_CONFIG` environment variable
//! 2. `<config_dir>/epmatch/epmatch.toml`
//! 3. Built-in defaults (missing file is not an error)

use crate::types::{FingerprintStrategy, SourceFormat};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "EPMATCH_CONFIG";

/// Three-level confidence gate applied to one subtitle source format
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTier {
    /// Minimum raw similarity of the best candidate
    pub embed_similarity: f32,
    /// Minimum confidence to report a match
    pub match_confidence: f32,
    /// Minimum confidence for the match to be rename-eligible
    pub rename_confidence: f32,
}

impl ThresholdTier {
    /// Create a tier without validation (validation happens at config load)
    pub const fn new(embed_similarity: f32, match_confidence: f32, rename_confidence: f32) -> Self {
        Self {
            embed_similarity,
            match_confidence,
            rename_confidence,
        }
    }

    /// Check `embed_similarity < match_confidence < rename_confidence`, all in [0,1]
    pub fn validate(&self, label: &str) -> Result<()> {
        for (name, value) in [
            ("embed_similarity", self.embed_similarity),
            ("match_confidence", self.match_confidence),
            ("rename_confidence", self.rename_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "thresholds.{}.{} must be within [0, 1], got {}",
                    label, name, value
                )));
            }
        }

        if !(self.embed_similarity < self.match_confidence
            && self.match_confidence < self.rename_confidence)
        {
            return Err(Error::Config(format!(
                "thresholds.{} must satisfy embed_similarity < match_confidence < rename_confidence \
                 (got {} / {} / {})",
                label, self.embed_similarity, self.match_confidence, self.rename_confidence
            )));
        }

        Ok(())
    }
}

/// Threshold tiers for each source format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdTable {
    pub text: ThresholdTier,
    pub pgs: ThresholdTier,
    pub vobsub: ThresholdTier,
}

impl ThresholdTable {
    /// Tier for a source format
    pub fn tier(&self, format: SourceFormat) -> &ThresholdTier {
        match format {
            SourceFormat::Text => &self.text,
            SourceFormat::Pgs => &self.pgs,
            SourceFormat::VobSub => &self.vobsub,
        }
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        // OCR'd sources carry recognition noise, so their gates sit lower
        Self {
            text: ThresholdTier::new(0.60, 0.70, 0.85),
            pgs: ThresholdTier::new(0.55, 0.65, 0.80),
            vobsub: ThresholdTier::new(0.50, 0.60, 0.75),
        }
    }
}

/// Relevance filter tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceParams {
    /// Share of sentences to keep, in percent
    ///
    /// Valid range: [10, 50]
    /// Default: 25
    pub percentage: f64,

    /// Fall back to full text when fewer sentences are selected
    ///
    /// Default: 15
    pub min_sentences: usize,

    /// Fall back to full text when the selected share drops below this percent
    ///
    /// Valid range: [0, 100]
    /// Default: 10
    pub min_percentage: f64,

    /// Damping factor `d` of the rank propagation
    ///
    /// Valid range: (0, 1)
    /// Default: 0.85
    pub damping: f64,

    /// Stop once no node rank moves more than this in one sweep
    ///
    /// Default: 1e-4
    pub convergence_threshold: f64,

    /// Hard cap on propagation sweeps
    ///
    /// Default: 100
    pub max_iterations: usize,

    /// Edges with lower cosine weight are omitted from the graph
    ///
    /// Valid range: [0, 1]
    /// Default: 0.1
    pub similarity_threshold: f64,

    /// Sentences with fewer words are dropped by the segmenter
    ///
    /// Default: 3
    pub min_words: usize,

    /// Fall back to full text when the filtered text is shorter than this
    ///
    /// Default: 100 characters
    pub min_filtered_chars: usize,
}

impl Default for RelevanceParams {
    fn default() -> Self {
        Self {
            percentage: 25.0,
            min_sentences: 15,
            min_percentage: 10.0,
            damping: 0.85,
            convergence_threshold: 1e-4,
            max_iterations: 100,
            similarity_threshold: 0.1,
            min_words: 3,
            min_filtered_chars: 100,
        }
    }
}

impl RelevanceParams {
    /// Range-check every tunable
    pub fn validate(&self) -> Result<()> {
        if !(10.0..=50.0).contains(&self.percentage) {
            return Err(Error::Config(format!(
                "relevance.percentage must be within [10, 50], got {}",
                self.percentage
            )));
        }
        if !(0.0..=100.0).contains(&self.min_percentage) {
            return Err(Error::Config(format!(
                "relevance.min_percentage must be within [0, 100], got {}",
                self.min_percentage
            )));
        }
        if !(self.damping > 0.0 && self.damping < 1.0) {
            return Err(Error::Config(format!(
                "relevance.damping must be within (0, 1), got {}",
                self.damping
            )));
        }
        if !(self.convergence_threshold > 0.0) {
            return Err(Error::Config(format!(
                "relevance.convergence_threshold must be positive, got {}",
                self.convergence_threshold
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::Config(
                "relevance.max_iterations must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::Config(format!(
                "relevance.similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.min_words == 0 {
            return Err(Error::Config(
                "relevance.min_words must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Corpus search tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Maximum number of candidates returned per search
    pub top_k: usize,
    /// Candidates below this normalized similarity are dropped
    pub min_similarity: f32,
    /// Candidates within this distance of the best one count as tied
    pub ambiguity_band: f32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_similarity: 0.0,
            ambiguity_band: 0.02,
        }
    }
}

/// External embedding model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// OpenAI-compatible embeddings endpoint
    pub endpoint: String,
    /// Model identifier sent with each request
    pub model: String,
    /// Expected vector dimension
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/v1/embeddings".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: 384,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_strategy() -> FingerprintStrategy {
    FingerprintStrategy::FuzzyHash
}

/// Complete engine configuration
///
/// One immutable instance is used for the whole of an identification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite corpus location (defaults under the platform data dir)
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,

    /// Active fingerprint strategy for new fingerprints and queries
    #[serde(default = "default_strategy")]
    pub strategy: FingerprintStrategy,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub relevance: RelevanceParams,

    #[serde(default)]
    pub search: SearchParams,

    #[serde(default)]
    pub thresholds: ThresholdTable,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            strategy: default_strategy(),
            logging: LoggingConfig::default(),
            relevance: RelevanceParams::default(),
            search: SearchParams::default(),
            thresholds: ThresholdTable::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    ///
    /// A missing file yields validated defaults with a warning; an unreadable
    /// or invalid file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                path = %path.display(),
                "Config file not found, using built-in defaults"
            );
            let config = EngineConfig::default();
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        let config = Self::from_toml_str(&content)?;

        info!(
            path = %path.display(),
            strategy = %config.strategy,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.relevance.validate()?;

        if self.search.top_k == 0 {
            return Err(Error::Config("search.top_k must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.search.min_similarity) {
            return Err(Error::Config(format!(
                "search.min_similarity must be within [0, 1], got {}",
                self.search.min_similarity
            )));
        }
        if !(0.0..1.0).contains(&self.search.ambiguity_band) {
            return Err(Error::Config(format!(
                "search.ambiguity_band must be within [0, 1), got {}",
                self.search.ambiguity_band
            )));
        }

        self.thresholds.text.validate("text")?;
        self.thresholds.pgs.validate("pgs")?;
        self.thresholds.vobsub.validate("vobsub")?;

        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        if self.strategy == FingerprintStrategy::Embedding && self.embedding.endpoint.trim().is_empty()
        {
            return Err(Error::Config(
                "embedding.endpoint is required when strategy = \"embedding\"".to_string(),
            ));
        }

        Ok(())
    }

    /// Corpus database path, falling back to the platform data directory
    pub fn resolved_corpus_path(&self) -> PathBuf {
        self.corpus_path
            .clone()
            .unwrap_or_else(default_corpus_path)
    }
}

/// Resolve the configuration file path (environment first, then platform default)
pub fn resolve_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::config_dir()
        .map(|d| d.join("epmatch").join("epmatch.toml"))
        .unwrap_or_else(|| PathBuf::from("epmatch.toml"))
}

/// Default corpus location under the platform data directory
pub fn default_corpus_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("epmatch").join("corpus.db"))
        .unwrap_or_else(|| PathBuf::from("./epmatch_data/corpus.db"))
}

/// Write configuration to a TOML file atomically (temp file + rename)
pub fn write_toml_config(config: &EngineConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}
