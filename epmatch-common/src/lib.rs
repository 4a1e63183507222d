//! # epmatch Common Library
//!
//! Shared code for the episode matching engine:
//! - Common error type
//! - Source format and fingerprint strategy tags
//! - TOML configuration loading and validation
//! - Hot-reloadable configuration snapshots
//! - Logging initialization

pub mod config;
pub mod error;
pub mod logging;
pub mod snapshot;
pub mod types;

pub use config::{EngineConfig, ThresholdTier};
pub use error::{Error, Result};
pub use snapshot::ConfigHandle;
pub use types::{FingerprintStrategy, SourceFormat};
