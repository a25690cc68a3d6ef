//! Audio tier: an opaque token identifying an audio track.
//!
//! The token only has to be equal for identical tracks and different for
//! different ones, so the algorithm is pluggable through
//! [`AudioFingerprinter`]. The default [`PcmAudioFingerprinter`] hashes the
//! decoded, mono-mixed PCM stream of WAV files, which makes the token
//! independent of container metadata (LIST/INFO chunks, header layout).

use std::fmt;
use std::io::Cursor;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use tracing::debug;

use crate::error::{FirstmarkError, Result};

const PCM_TOKEN_PREFIX: &str = "pcm1:";
const RAW_TOKEN_PREFIX: &str = "raw1:";
const TOKEN_DIGEST_BYTES: usize = 16;

/// Opaque audio fingerprint token.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AudioToken(String);

impl TryFrom<String> for AudioToken {
    type Error = FirstmarkError;

    fn try_from(token: String) -> Result<Self> {
        Self::new(token)
    }
}

impl From<AudioToken> for String {
    fn from(token: AudioToken) -> Self {
        token.0
    }
}

impl AudioToken {
    /// Wrap a token produced by an external fingerprinting strategy.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(FirstmarkError::InvalidFingerprint(
                "Audio token must not be empty".into(),
            ));
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AudioToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioToken({})", self.0)
    }
}

/// Strategy for deriving an [`AudioToken`] from audio bytes.
pub trait AudioFingerprinter: Send + Sync {
    /// Fails with `UnsupportedMedia` when the bytes cannot be decoded.
    fn fingerprint(&self, data: &[u8]) -> Result<AudioToken>;
}

/// Default strategy: PCM digest for WAV, raw digest for anything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct PcmAudioFingerprinter;

impl PcmAudioFingerprinter {
    pub fn new() -> Self {
        Self
    }

    fn is_wav(data: &[u8]) -> bool {
        data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE"
    }

    fn pcm_token(data: &[u8]) -> Result<AudioToken> {
        let mut reader = hound::WavReader::new(Cursor::new(data))
            .map_err(|e| FirstmarkError::unsupported(format!("Failed to open WAV: {}", e)))?;

        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            return Err(FirstmarkError::unsupported("WAV declares zero channels"));
        }

        let samples: Vec<i16> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<_, _>>(),
            hound::SampleFormat::Int => {
                let bits = spec.bits_per_sample;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| to_i16(v, bits)))
                    .collect::<std::result::Result<_, _>>()
            }
        }
        .map_err(|e| FirstmarkError::unsupported(format!("Failed to decode WAV samples: {}", e)))?;

        if samples.len() < channels {
            return Err(FirstmarkError::unsupported("WAV stream has no samples"));
        }

        let mut hasher = Sha3_256::new();
        hasher.update(b"firstmark-pcm-v1");
        hasher.update(spec.sample_rate.to_le_bytes());
        let mut frames = 0usize;
        for frame in samples.chunks_exact(channels) {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            let mono = (sum / channels as i32) as i16;
            hasher.update(mono.to_le_bytes());
            frames += 1;
        }

        debug!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            frames,
            "Decoded WAV for audio fingerprint"
        );

        let digest = hasher.finalize();
        Ok(AudioToken(format!(
            "{}{}",
            PCM_TOKEN_PREFIX,
            hex::encode(&digest[..TOKEN_DIGEST_BYTES])
        )))
    }

    fn raw_token(data: &[u8]) -> AudioToken {
        let mut hasher = Sha3_256::new();
        hasher.update(b"firstmark-raw-audio-v1");
        hasher.update(data);
        let digest = hasher.finalize();
        AudioToken(format!(
            "{}{}",
            RAW_TOKEN_PREFIX,
            hex::encode(&digest[..TOKEN_DIGEST_BYTES])
        ))
    }
}

impl AudioFingerprinter for PcmAudioFingerprinter {
    fn fingerprint(&self, data: &[u8]) -> Result<AudioToken> {
        if data.is_empty() {
            return Err(FirstmarkError::unsupported("Empty audio buffer"));
        }
        if Self::is_wav(data) {
            Self::pcm_token(data)
        } else {
            Ok(Self::raw_token(data))
        }
    }
}

/// Rescale an integer sample of `bits` width to 16 bits.
fn to_i16(sample: i32, bits: u16) -> i16 {
    match bits {
        0..=16 => (sample << (16 - bits)) as i16,
        _ => (sample >> (bits - 16)) as i16,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[i16], channels: u16, sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn tone(len: usize, period: usize) -> Vec<i16> {
        (0..len)
            .map(|i| if (i / period) % 2 == 0 { 8000 } else { -8000 })
            .collect()
    }

    #[test]
    fn test_same_track_same_token() {
        let fp = PcmAudioFingerprinter::new();
        let wav = wav_bytes(&tone(4000, 20), 1, 16000);
        assert_eq!(fp.fingerprint(&wav).unwrap(), fp.fingerprint(&wav).unwrap());
    }

    #[test]
    fn test_different_tracks_different_tokens() {
        let fp = PcmAudioFingerprinter::new();
        let a = fp.fingerprint(&wav_bytes(&tone(4000, 20), 1, 16000)).unwrap();
        let b = fp.fingerprint(&wav_bytes(&tone(4000, 33), 1, 16000)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_ignores_trailing_container_chunks() {
        let fp = PcmAudioFingerprinter::new();
        let plain = wav_bytes(&tone(2000, 10), 1, 8000);

        // Append an unknown chunk after the data chunk and fix the RIFF size
        let mut tagged = plain.clone();
        tagged.extend_from_slice(b"junk");
        tagged.extend_from_slice(&4u32.to_le_bytes());
        tagged.extend_from_slice(b"meta");
        let riff_size = (tagged.len() - 8) as u32;
        tagged[4..8].copy_from_slice(&riff_size.to_le_bytes());

        assert_ne!(plain, tagged);
        assert_eq!(
            fp.fingerprint(&plain).unwrap(),
            fp.fingerprint(&tagged).unwrap()
        );
    }

    #[test]
    fn test_pcm_token_prefix() {
        let fp = PcmAudioFingerprinter::new();
        let token = fp.fingerprint(&wav_bytes(&tone(100, 5), 2, 8000)).unwrap();
        assert!(token.as_str().starts_with(PCM_TOKEN_PREFIX));
    }

    #[test]
    fn test_non_wav_falls_back_to_raw_token() {
        let fp = PcmAudioFingerprinter::new();
        let token = fp.fingerprint(b"ID3\x03\x00mp3-ish payload").unwrap();
        assert!(token.as_str().starts_with(RAW_TOKEN_PREFIX));
    }

    #[test]
    fn test_empty_audio_unsupported() {
        let fp = PcmAudioFingerprinter::new();
        assert!(matches!(
            fp.fingerprint(b""),
            Err(FirstmarkError::UnsupportedMedia(_))
        ));
    }

    #[test]
    fn test_truncated_wav_unsupported() {
        let fp = PcmAudioFingerprinter::new();
        let wav = wav_bytes(&tone(100, 5), 1, 8000);
        // RIFF/WAVE magic survives but the fmt chunk is cut off
        assert!(matches!(
            fp.fingerprint(&wav[..20]),
            Err(FirstmarkError::UnsupportedMedia(_))
        ));
    }

    #[test]
    fn test_empty_wav_unsupported() {
        let fp = PcmAudioFingerprinter::new();
        let wav = wav_bytes(&[], 1, 8000);
        assert!(fp.fingerprint(&wav).is_err());
    }

    #[test]
    fn test_to_i16() {
        assert_eq!(to_i16(127, 8), 127 << 8);
        assert_eq!(to_i16(-1000, 16), -1000);
        assert_eq!(to_i16(0x12_3456, 24), 0x1234);
    }

    #[test]
    fn test_audio_token_rejects_blank() {
        assert!(AudioToken::new("  ").is_err());
        assert_eq!(AudioToken::new("chroma:abc").unwrap().as_str(), "chroma:abc");
    }

    #[test]
    fn test_audio_token_deserialize_rejects_blank() {
        let token: AudioToken = serde_json::from_str(r#""pcm1:00ff""#).unwrap();
        assert_eq!(token.as_str(), "pcm1:00ff");
        assert_eq!(serde_json::to_string(&token).unwrap(), r#""pcm1:00ff""#);
        assert!(serde_json::from_str::<AudioToken>(r#""   ""#).is_err());
    }
}
