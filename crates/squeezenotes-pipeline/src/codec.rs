//! Zstd and LZ4 compression for note payloads.
//!
//! The codec is static configuration: one algorithm (and optionally one
//! pre-trained Zstd dictionary) per deployment. Each compressed record stores
//! the [`CodecId`] it was written with, so decoding never depends on the
//! current configuration except for the dictionary bytes.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Errors raised by the compression primitive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Compression operation failed
    #[error("Compression failed: {0}")]
    CompressionFailed(String),
    /// Decompression operation failed
    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),
}

/// Compression algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// No compression (passthrough)
    None,
    /// LZ4 block format with prepended size
    Lz4,
    /// Zstandard
    Zstd {
        /// Compression level (1=fastest, 19=best ratio, 3=balanced default)
        level: i32,
    },
}

impl Default for CompressionAlgorithm {
    fn default() -> Self {
        CompressionAlgorithm::Zstd { level: 3 }
    }
}

impl CompressionAlgorithm {
    /// Identifier persisted alongside compressed records.
    pub fn id(&self) -> CodecId {
        match self {
            CompressionAlgorithm::None => CodecId::None,
            CompressionAlgorithm::Lz4 => CodecId::Lz4,
            CompressionAlgorithm::Zstd { .. } => CodecId::Zstd,
        }
    }
}

/// Algorithm family a blob was encoded with. Level is irrelevant for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    /// Stored verbatim
    None,
    /// LZ4
    Lz4,
    /// Zstandard
    Zstd,
}

impl CodecId {
    /// File extension used for compressed object keys.
    pub fn extension(&self) -> &'static str {
        match self {
            CodecId::None => ".raw",
            CodecId::Lz4 => ".lz4",
            CodecId::Zstd => ".zst",
        }
    }
}

/// Configured compressor: an algorithm plus an optional Zstd dictionary.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    algorithm: CompressionAlgorithm,
    dictionary: Option<Arc<Vec<u8>>>,
}

impl Codec {
    /// Codec without a dictionary.
    pub fn new(algorithm: CompressionAlgorithm) -> Self {
        Self {
            algorithm,
            dictionary: None,
        }
    }

    /// Attach a pre-trained dictionary. Only Zstd makes use of it.
    pub fn with_dictionary(mut self, dictionary: Vec<u8>) -> Self {
        if self.algorithm.id() != CodecId::Zstd {
            tracing::warn!(algorithm = ?self.algorithm, "Dictionary ignored: only zstd supports dictionaries");
        }
        self.dictionary = Some(Arc::new(dictionary));
        self
    }

    /// Load the dictionary from disk and attach it.
    pub fn with_dictionary_file(self, path: &Path) -> std::io::Result<Self> {
        let dictionary = std::fs::read(path)?;
        tracing::info!(path = %path.display(), bytes = dictionary.len(), "Loaded compression dictionary");
        Ok(self.with_dictionary(dictionary))
    }

    /// Configured algorithm.
    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    /// Identifier of the configured algorithm.
    pub fn id(&self) -> CodecId {
        self.algorithm.id()
    }

    /// Whether a dictionary is attached.
    pub fn has_dictionary(&self) -> bool {
        self.dictionary.is_some()
    }

    /// Compress with the configured algorithm. Deterministic for a given input.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self.algorithm {
            CompressionAlgorithm::None => Ok(data.to_vec()),
            CompressionAlgorithm::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            CompressionAlgorithm::Zstd { level } => match &self.dictionary {
                Some(dict) => compress_with_dict(data, dict, level),
                None => zstd::encode_all(data, level)
                    .map_err(|e| CodecError::CompressionFailed(e.to_string())),
            },
        }
    }

    /// Decompress bytes that were written with `id`.
    pub fn decompress(&self, data: &[u8], id: CodecId) -> Result<Vec<u8>, CodecError> {
        match id {
            CodecId::None => Ok(data.to_vec()),
            CodecId::Lz4 => lz4_flex::decompress_size_prepended(data)
                .map_err(|e| CodecError::DecompressionFailed(e.to_string())),
            CodecId::Zstd => match &self.dictionary {
                Some(dict) => decompress_with_dict(data, dict),
                None => zstd::decode_all(data)
                    .map_err(|e| CodecError::DecompressionFailed(e.to_string())),
            },
        }
    }
}

fn compress_with_dict(data: &[u8], dict: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
    let mut encoder = zstd::stream::Encoder::with_dictionary(Vec::new(), level, dict)
        .map_err(|e| CodecError::CompressionFailed(e.to_string()))?;
    encoder
        .write_all(data)
        .map_err(|e| CodecError::CompressionFailed(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CodecError::CompressionFailed(e.to_string()))
}

fn decompress_with_dict(data: &[u8], dict: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = zstd::stream::Decoder::with_dictionary(data, dict)
        .map_err(|e| CodecError::DecompressionFailed(e.to_string()))?;
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CodecError::DecompressionFailed(e.to_string()))?;
    Ok(out)
}
