//! Configuration for ingestion limits and session lifecycle.
//!
//! Every struct here has a [`Default`] matching the service defaults, and deserializes from TOML
//! with missing keys filled from those defaults:
//!
//! ```toml
//! [ingestion]
//! chunk_size = 10000
//! max_chunks = 100
//!
//! [ingestion.limits]
//! max_columns = 500
//!
//! [upload]
//! max_file_size_bytes = 62914560
//!
//! [sessions]
//! expiry_seconds = 3600
//! sweep_interval_seconds = 600
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Row/column bounds enforced on every parsed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralLimits {
    pub min_rows: usize,
    pub max_rows: usize,
    pub min_columns: usize,
    pub max_columns: usize,
}

impl Default for StructuralLimits {
    fn default() -> Self {
        Self {
            min_rows: 1,
            max_rows: 1_000_000,
            min_columns: 1,
            max_columns: 500,
        }
    }
}

/// Serializable part of [`crate::ingestion::IngestionOptions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    /// Rows per chunk, and the estimated row count above which chunking kicks in.
    pub chunk_size: usize,
    /// Hard ceiling on chunks read from one input.
    pub max_chunks: usize,
    /// Detection confidence above which the detected encoding is tried first.
    pub high_confidence_threshold: f32,
    /// Whether to make a final lossy UTF-8 attempt after every candidate failed.
    pub allow_lossy_fallback: bool,
    pub limits: StructuralLimits,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            max_chunks: 100,
            high_confidence_threshold: 0.7,
            allow_lossy_fallback: true,
            limits: StructuralLimits::default(),
        }
    }
}

/// Limits checked before any parsing happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    pub max_file_size_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 60 * 1024 * 1024,
        }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are evicted by the sweep.
    pub expiry_seconds: u64,
    /// Interval between sweeps.
    pub sweep_interval_seconds: u64,
    /// Optional cap on live sessions across all owners.
    pub max_sessions: Option<usize>,
    /// When the cap is reached, evict the least recently accessed session instead of refusing.
    pub evict_oldest_when_full: bool,
}

impl SessionConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_seconds: 3600,
            sweep_interval_seconds: 600,
            max_sessions: None,
            evict_oldest_when_full: false,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub ingestion: IngestionSettings,
    pub upload: UploadLimits,
    pub sessions: SessionConfig,
}

impl CoreConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };
        if self.ingestion.chunk_size == 0 {
            return invalid("ingestion.chunk_size must be > 0");
        }
        if self.ingestion.max_chunks == 0 {
            return invalid("ingestion.max_chunks must be > 0");
        }
        if !(0.0..=1.0).contains(&self.ingestion.high_confidence_threshold) {
            return invalid("ingestion.high_confidence_threshold must be within [0, 1]");
        }
        let limits = &self.ingestion.limits;
        if limits.min_rows > limits.max_rows || limits.min_columns > limits.max_columns {
            return invalid("ingestion.limits minimums must not exceed maximums");
        }
        if self.sessions.sweep_interval_seconds == 0 {
            return invalid("sessions.sweep_interval_seconds must be > 0");
        }
        if self.sessions.max_sessions == Some(0) {
            return invalid("sessions.max_sessions must be > 0 when set");
        }
        Ok(())
    }
}
