// SPDX-License-Identifier: MIT
use crate::error::{ContainerError, Result};

const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
const MIN_BUFFER_SIZE: usize = 4 * 1024;
const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Tuning knobs for the codec. None of them change the on-disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// zlib level, 0 (store) to 9 (best)
    pub compression_level: u32,
    /// Buffer size for source, container and destination streams
    pub buffer_size: usize,
}

impl CodecConfig {
    pub fn from_env() -> Self {
        Self {
            compression_level: std::env::var("TRACE_COMPRESSION_LEVEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_COMPRESSION_LEVEL),
            buffer_size: std::env::var("TRACE_BUFFER_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BUFFER_SIZE),
        }
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(ContainerError::InvalidConfig(format!(
                "TRACE_COMPRESSION_LEVEL must be between 0 and 9, got {}",
                self.compression_level
            )));
        }

        if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&self.buffer_size) {
            return Err(ContainerError::InvalidConfig(format!(
                "TRACE_BUFFER_SIZE must be between {MIN_BUFFER_SIZE} and {MAX_BUFFER_SIZE}, got {}",
                self.buffer_size
            )));
        }

        Ok(())
    }

    pub(crate) fn compression(&self) -> flate2::Compression {
        flate2::Compression::new(self.compression_level)
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}
