//! Deployment configuration, loaded from TOML or JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::background::WorkerConfig;
use crate::codec::{Codec, CodecId, CompressionAlgorithm};
use crate::deadline::TimeoutConfig;
use crate::readiness::ReadinessConfig;

/// Static codec selection for the whole deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// `zstd`, `lz4` or `none`
    pub algorithm: CodecId,
    /// Zstd level; ignored by the other algorithms
    pub level: i32,
    /// Pre-trained Zstd dictionary
    pub dictionary_path: Option<PathBuf>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            algorithm: CodecId::Zstd,
            level: 3,
            dictionary_path: None,
        }
    }
}

impl CodecConfig {
    /// Algorithm with its level resolved.
    pub fn algorithm(&self) -> CompressionAlgorithm {
        match self.algorithm {
            CodecId::None => CompressionAlgorithm::None,
            CodecId::Lz4 => CompressionAlgorithm::Lz4,
            CodecId::Zstd => CompressionAlgorithm::Zstd { level: self.level },
        }
    }

    /// Build the codec, loading the dictionary file if one is configured.
    pub fn build(&self) -> std::io::Result<Codec> {
        let codec = Codec::new(self.algorithm());
        match &self.dictionary_path {
            Some(path) => codec.with_dictionary_file(path),
            None => Ok(codec),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Prefix for every object key
    pub key_prefix: String,
    /// Compression codec
    pub codec: CodecConfig,
    /// Per-dependency call timeouts
    pub timeouts: TimeoutConfig,
    /// Queue draining
    pub worker: WorkerConfig,
    /// Client-side polling on not-ready reads
    pub readiness: ReadinessConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            key_prefix: String::from("notes/"),
            codec: CodecConfig::default(),
            timeouts: TimeoutConfig::default(),
            worker: WorkerConfig::default(),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: PipelineConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: PipelineConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }
}
