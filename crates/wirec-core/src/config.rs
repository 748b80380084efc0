use std::path::Path;

use serde::Deserialize;

use crate::error::CompressionError;
use crate::ring::MAX_KEEP_OLD_TABLES;

/// Per value-kind knobs.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct KindConfig {
    /// Heavy hitters kept per origin. Power of two; 0 disables the kind.
    pub max: usize,
    /// Scheduler cadence for advertisement cycles.
    pub advertisement_interval_ms: u64,
}

impl Default for KindConfig {
    fn default() -> Self {
        Self {
            max: 256,
            advertisement_interval_ms: 60_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub actor_refs: KindConfig,
    pub manifests: KindConfig,
    pub sketch_depth: usize,
    pub sketch_width: usize,
    pub keep_old_tables: usize,
    pub max_advertisement_resends: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            actor_refs: KindConfig::default(),
            manifests: KindConfig::default(),
            sketch_depth: 16,
            sketch_width: 1024,
            keep_old_tables: 3,
            max_advertisement_resends: 3,
        }
    }
}

impl CompressionConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, CompressionError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| CompressionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CompressionError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), CompressionError> {
        if self.sketch_depth == 0 {
            return Err(CompressionError::Config("sketch_depth must be > 0".into()));
        }
        if !self.sketch_width.is_power_of_two() {
            return Err(CompressionError::Config(format!(
                "sketch_width must be a power of two, got {}",
                self.sketch_width
            )));
        }
        if self.keep_old_tables > MAX_KEEP_OLD_TABLES {
            return Err(CompressionError::Config(format!(
                "keep_old_tables must be at most {}, got {}",
                MAX_KEEP_OLD_TABLES, self.keep_old_tables
            )));
        }
        for (name, kind) in [("actor_refs", &self.actor_refs), ("manifests", &self.manifests)] {
            if kind.max != 0 && !kind.max.is_power_of_two() {
                return Err(CompressionError::Config(format!(
                    "{name}.max must be a power of two (or 0), got {}",
                    kind.max
                )));
            }
            if kind.advertisement_interval_ms == 0 {
                return Err(CompressionError::Config(format!(
                    "{name}.advertisement_interval_ms must be > 0"
                )));
            }
        }
        Ok(())
    }
}
