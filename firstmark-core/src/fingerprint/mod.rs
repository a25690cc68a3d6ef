//! Fingerprint Engine.
//!
//! Turns raw media bytes plus a declared [`MediaKind`] into a
//! [`FingerprintTriple`]:
//!
//! - **exact**: SHA3-256 of the whole buffer, always present
//! - **perceptual**: dHash of a representative frame, images and video only
//! - **audio**: opaque track token, audio only
//!
//! Tiers that do not apply to a kind are `None`, never a magic value, so an
//! absent tier can not collide with a real fingerprint.
//!
//! The engine holds no mutable state; a single instance can be shared across
//! threads. Decoding can be slow or hang on hostile input, so callers that
//! take bytes from the outside should go through
//! [`FingerprintEngine::compute_with_timeout`].

pub mod audio;
pub mod cancel;
pub mod exact;
pub mod frame;
pub mod perceptual;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{FirstmarkError, Result};

pub use audio::{AudioFingerprinter, AudioToken, PcmAudioFingerprinter};
pub use cancel::CancelToken;
pub use exact::{ExactHash, EXACT_HASH_SIZE};
pub use frame::{EmbeddedFrameExtractor, FrameExtractor, MAX_FRAME_CANDIDATES};
pub use perceptual::{
    dhash, hamming_distance, similarity_percent, PerceptualHash, DEFAULT_SIMILARITY_THRESHOLD,
};

/// Declared kind of a submitted media object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Audio,
    Other,
}

impl MediaKind {
    /// Guess the kind from a file extension. Unknown extensions map to `Other`.
    pub fn from_extension(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp") => Self::Image,
            Some("mp4" | "mov" | "avi" | "mkv" | "webm" | "mjpeg" | "mjpg") => Self::Video,
            Some("mp3" | "wav" | "flac" | "aac" | "ogg" | "m4a") => Self::Audio,
            _ => Self::Other,
        }
    }

    /// Whether the perceptual (visual) tier applies.
    pub fn has_visual_tier(&self) -> bool {
        matches!(self, Self::Image | Self::Video)
    }

    /// Whether the audio tier applies.
    pub fn has_audio_tier(&self) -> bool {
        matches!(self, Self::Audio)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

impl FromStr for MediaKind {
    type Err = FirstmarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "image" => Ok(Self::Image),
            "audio" => Ok(Self::Audio),
            "other" => Ok(Self::Other),
            other => Err(FirstmarkError::unsupported(format!(
                "Unknown media kind '{}' (expected video, image, audio or other)",
                other
            ))),
        }
    }
}

/// The three-tier fingerprint of one media object.
///
/// Immutable once computed; derived only from the input bytes and the
/// declared kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintTriple {
    pub exact: ExactHash,
    pub perceptual: Option<PerceptualHash>,
    pub audio: Option<AudioToken>,
}

impl FingerprintTriple {
    /// A triple with only the exact tier, for content with no visual or
    /// audio dimension.
    pub fn exact_only(exact: ExactHash) -> Self {
        Self {
            exact,
            perceptual: None,
            audio: None,
        }
    }

    /// Reject the zero exact hash.
    pub fn validate(&self) -> Result<()> {
        if self.exact.is_zero() {
            return Err(FirstmarkError::InvalidFingerprint(
                "Exact hash must not be zero".into(),
            ));
        }
        Ok(())
    }
}

/// Stateless fingerprint computation with pluggable decode strategies.
#[derive(Clone)]
pub struct FingerprintEngine {
    config: EngineConfig,
    frames: Arc<dyn FrameExtractor>,
    audio: Arc<dyn AudioFingerprinter>,
}

impl FingerprintEngine {
    /// Create an engine with the default strategies.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let frames = Arc::new(EmbeddedFrameExtractor::new(config.frame_scan_limit));
        Ok(Self {
            config,
            frames,
            audio: Arc::new(PcmAudioFingerprinter::new()),
        })
    }

    /// Replace the frame extraction strategy (e.g. a codec-backed decoder).
    pub fn with_frame_extractor<F: FrameExtractor + 'static>(mut self, extractor: F) -> Self {
        self.frames = Arc::new(extractor);
        self
    }

    /// Replace the audio fingerprinting strategy.
    pub fn with_audio_fingerprinter<A: AudioFingerprinter + 'static>(mut self, audio: A) -> Self {
        self.audio = Arc::new(audio);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compute the fingerprint triple for `data` declared as `kind`.
    ///
    /// Fails with `UnsupportedMedia` when the buffer is empty, larger than
    /// the configured limit, or cannot be decoded as declared.
    pub fn compute(&self, data: &[u8], kind: MediaKind) -> Result<FingerprintTriple> {
        self.compute_cancellable(data, kind, &CancelToken::new())
    }

    /// [`compute`](Self::compute) that gives up with `UnsupportedMedia` once
    /// `cancel` trips.
    pub fn compute_cancellable(
        &self,
        data: &[u8],
        kind: MediaKind,
        cancel: &CancelToken,
    ) -> Result<FingerprintTriple> {
        if data.is_empty() {
            return Err(FirstmarkError::unsupported("Empty input buffer"));
        }
        if data.len() > self.config.max_input_bytes {
            return Err(FirstmarkError::unsupported(format!(
                "Input of {} bytes exceeds the {} byte limit",
                data.len(),
                self.config.max_input_bytes
            )));
        }

        let exact = ExactHash::from_bytes(data);

        let perceptual = if kind.has_visual_tier() {
            let frame = self.frames.extract(data, kind, cancel)?;
            Some(dhash(&frame, self.config.grid_size)?)
        } else {
            None
        };

        let audio = if kind.has_audio_tier() {
            cancel.check()?;
            Some(self.audio.fingerprint(data)?)
        } else {
            None
        };

        debug!(
            kind = %kind,
            bytes = data.len(),
            exact = %exact.short(),
            perceptual = ?perceptual.as_ref().map(PerceptualHash::to_hex),
            audio = ?audio.as_ref().map(AudioToken::as_str),
            "Computed fingerprint"
        );

        Ok(FingerprintTriple {
            exact,
            perceptual,
            audio,
        })
    }

    /// Run [`compute`](Self::compute) on the blocking pool, bounded by the
    /// configured decode timeout. Expiry is reported as `UnsupportedMedia`.
    ///
    /// The worker shares a [`CancelToken`] carrying the same deadline, so an
    /// overrunning decode stops at its next check and drops its buffers.
    #[cfg(feature = "runtime")]
    pub async fn compute_with_timeout(
        &self,
        data: Vec<u8>,
        kind: MediaKind,
    ) -> Result<FingerprintTriple> {
        let engine = self.clone();
        let limit = self.config.decode_timeout;
        let cancel = CancelToken::with_timeout(limit);
        let worker_cancel = cancel.clone();
        let task = tokio::task::spawn_blocking(move || {
            engine.compute_cancellable(&data, kind, &worker_cancel)
        });

        let exceeded = || {
            tracing::warn!(kind = %kind, timeout = ?limit, "Fingerprint decode timed out");
            FirstmarkError::unsupported(format!("Decode exceeded {:?}", limit))
        };

        match tokio::time::timeout(limit, task).await {
            Ok(Ok(Err(_))) if cancel.is_cancelled() => Err(exceeded()),
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(FirstmarkError::unsupported(format!(
                "Decode task failed: {}",
                join_error
            ))),
            Err(_) => {
                cancel.cancel();
                Err(exceeded())
            }
        }
    }
}

impl Default for FingerprintEngine {
    fn default() -> Self {
        let config = EngineConfig::default();
        let frames = Arc::new(EmbeddedFrameExtractor::new(config.frame_scan_limit));
        Self {
            config,
            frames,
            audio: Arc::new(PcmAudioFingerprinter::new()),
        }
    }
}

impl fmt::Debug for FingerprintEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerprintEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Compute a fingerprint triple with default settings.
pub fn compute_fingerprint(data: &[u8], kind: MediaKind) -> Result<FingerprintTriple> {
    FingerprintEngine::default().compute(data, kind)
}
