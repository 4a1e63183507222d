//! Hot-reloadable configuration handle
//!
//! Read-frequently, write-rarely access pattern using RwLock. Callers take an
//! `Arc<EngineConfig>` snapshot at the start of an identification and keep it
//! for the whole call; a reload swaps in a new snapshot for later calls and
//! never mutates one that is already handed out.

use crate::config::EngineConfig;
use crate::{Error, Result};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Shared handle to the current configuration snapshot
#[derive(Debug)]
pub struct ConfigHandle {
    current: RwLock<Arc<EngineConfig>>,
}

impl ConfigHandle {
    /// Wrap an already validated configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// Load the initial configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            current: RwLock::new(Arc::new(EngineConfig::load(path)?)),
        })
    }

    /// Current configuration snapshot
    pub fn snapshot(&self) -> Arc<EngineConfig> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            // A panicking writer cannot leave a half-built Arc behind
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the snapshot with a validated configuration
    pub fn replace(&self, config: EngineConfig) -> Result<Arc<EngineConfig>> {
        config.validate()?;
        let next = Arc::new(config);

        let mut guard = self
            .current
            .write()
            .map_err(|_| Error::Internal("Configuration lock poisoned".to_string()))?;
        *guard = Arc::clone(&next);

        Ok(next)
    }

    /// Reload from a file, keeping the previous snapshot if the file is invalid
    pub fn reload(&self, path: &Path) -> Result<Arc<EngineConfig>> {
        match EngineConfig::load(path) {
            Ok(config) => {
                let next = self.replace(config)?;
                info!(path = %path.display(), "Configuration reloaded");
                Ok(next)
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Configuration reload rejected, keeping previous snapshot"
                );
                Err(e)
            }
        }
    }
}
