//! Fingerprint engine configuration
//!
//! Loaded from environment variables with sensible defaults.

use std::time::Duration;

use crate::error::{FirstmarkError, Result};

/// Fingerprint engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// dHash grid size `n`: the frame is sampled on an (n+1) x n grid and
    /// yields n*n bits (default: 8, i.e. 64 bits)
    pub grid_size: u32,
    /// Largest accepted input buffer in bytes (default: 100 MiB)
    pub max_input_bytes: usize,
    /// Hard limit for a single decode when run through the async entry point
    /// (default: 30 seconds)
    pub decode_timeout: Duration,
    /// How far into a video container to look for an embedded still frame
    /// (default: 16 MiB)
    pub frame_scan_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_size: 8,
            max_input_bytes: 100 * 1024 * 1024,
            decode_timeout: Duration::from_secs(30),
            frame_scan_limit: 16 * 1024 * 1024,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let grid_size = std::env::var("FIRSTMARK_GRID_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.grid_size);

        let max_input_bytes = std::env::var("FIRSTMARK_MAX_INPUT_MB")
            .ok()
            .and_then(|v| mebibytes(&v))
            .unwrap_or(defaults.max_input_bytes);

        let decode_timeout = std::env::var("FIRSTMARK_DECODE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.decode_timeout);

        let frame_scan_limit = std::env::var("FIRSTMARK_FRAME_SCAN_MB")
            .ok()
            .and_then(|v| mebibytes(&v))
            .unwrap_or(defaults.frame_scan_limit);

        Self {
            grid_size,
            max_input_bytes,
            decode_timeout,
            frame_scan_limit,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !(2..=32).contains(&self.grid_size) {
            return Err(FirstmarkError::InvalidConfig(format!(
                "grid_size must be within 2..=32, got {}",
                self.grid_size
            )));
        }
        if self.max_input_bytes == 0 {
            return Err(FirstmarkError::InvalidConfig(
                "max_input_bytes must be > 0".into(),
            ));
        }
        if self.decode_timeout.is_zero() {
            return Err(FirstmarkError::InvalidConfig(
                "decode_timeout must be > 0".into(),
            ));
        }
        if self.frame_scan_limit == 0 {
            return Err(FirstmarkError::InvalidConfig(
                "frame_scan_limit must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Number of bits a perceptual hash carries under this configuration.
    pub fn perceptual_bits(&self) -> u32 {
        self.grid_size * self.grid_size
    }
}

/// Parse a size in MiB; unparsable or overflowing values yield `None`.
fn mebibytes(value: &str) -> Option<usize> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|mb| mb.checked_mul(1024 * 1024))
}
