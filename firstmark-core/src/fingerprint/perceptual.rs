//! Perceptual tier: difference hash (dHash) of a representative frame.
//!
//! The frame is resampled to an `(n+1) x n` grid and converted to 8-bit
//! luminance. Each row contributes `n` bits, one per horizontally adjacent
//! pixel pair: `1` when the left pixel is brighter than the right one.
//! Bits are concatenated row-major and packed MSB-first.
//!
//! Visually similar frames (re-encoded, resized, lightly compressed) produce
//! hashes at a small Hamming distance from each other; byte-level changes
//! that do not alter the picture leave the hash unchanged.

use std::fmt;
use std::str::FromStr;

use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::{FirstmarkError, Result};

/// Default similarity threshold (Hamming distance) for 64-bit hashes.
pub const DEFAULT_SIMILARITY_THRESHOLD: u32 = 10;

/// A fixed-length perceptual bit-string.
///
/// Deserialization goes through [`PerceptualHash::from_parts`], so a decoded
/// value always has a byte length matching its bit length.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPerceptualHash")]
pub struct PerceptualHash {
    /// Packed bits, MSB-first; unused trailing bits are zero
    #[serde(with = "hex_bytes")]
    hash: Vec<u8>,
    /// Number of meaningful bits
    bits: u32,
}

#[derive(Deserialize)]
struct RawPerceptualHash {
    #[serde(with = "hex_bytes")]
    hash: Vec<u8>,
    bits: u32,
}

impl TryFrom<RawPerceptualHash> for PerceptualHash {
    type Error = FirstmarkError;

    fn try_from(raw: RawPerceptualHash) -> Result<Self> {
        Self::from_parts(raw.hash, raw.bits)
    }
}

impl PerceptualHash {
    /// Build a hash from packed bytes and an explicit bit length.
    pub fn from_parts(hash: Vec<u8>, bits: u32) -> Result<Self> {
        if bits == 0 {
            return Err(FirstmarkError::InvalidFingerprint(
                "Perceptual hash must carry at least one bit".into(),
            ));
        }
        let expected_len = bits.div_ceil(8) as usize;
        if hash.len() != expected_len {
            return Err(FirstmarkError::InvalidFingerprint(format!(
                "{} bits need {} bytes, got {}",
                bits,
                expected_len,
                hash.len()
            )));
        }
        let padding = expected_len as u32 * 8 - bits;
        if padding > 0 {
            let mask = (1u8 << padding) - 1;
            if hash[expected_len - 1] & mask != 0 {
                return Err(FirstmarkError::InvalidFingerprint(
                    "Perceptual hash padding bits must be zero".into(),
                ));
            }
        }
        Ok(Self { hash, bits })
    }

    /// Pack a sequence of bits (first bit becomes the MSB of byte 0).
    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Result<Self> {
        let mut hash = Vec::new();
        let mut count = 0u32;
        for bit in bits {
            if count % 8 == 0 {
                hash.push(0);
            }
            if bit {
                if let Some(last) = hash.last_mut() {
                    *last |= 0x80 >> (count % 8);
                }
            }
            count += 1;
        }
        Self::from_parts(hash, count)
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.hash
    }

    /// Value of bit `index` (0 = first emitted bit).
    pub fn bit(&self, index: u32) -> Option<bool> {
        if index >= self.bits {
            return None;
        }
        let byte = self.hash.get((index / 8) as usize)?;
        Some(byte & (0x80 >> (index % 8)) != 0)
    }

    /// Hamming distance to another hash of the same bit length.
    pub fn hamming_distance(&self, other: &Self) -> Result<u32> {
        hamming_distance(self, other)
    }

    /// `100 * (1 - distance / length)`.
    pub fn similarity_percent(&self, other: &Self) -> Result<f64> {
        similarity_percent(self, other)
    }

    /// Whether two hashes are within `threshold` bits of each other
    /// (default: 10).
    pub fn is_similar(&self, other: &Self, threshold: Option<u32>) -> Result<bool> {
        let threshold = threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
        Ok(self.hamming_distance(other)? <= threshold)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.hash)
    }

    /// Parse a hex string; the bit length is the full byte length.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let hash = hex::decode(hex_str.trim()).map_err(|e| {
            FirstmarkError::InvalidFingerprint(format!("Invalid perceptual hash hex: {}", e))
        })?;
        let bits = (hash.len() * 8) as u32;
        Self::from_parts(hash, bits)
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PerceptualHash({}/{}b)", self.to_hex(), self.bits)
    }
}

impl FromStr for PerceptualHash {
    type Err = FirstmarkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Compute the Hamming distance between two perceptual hashes.
///
/// Fails with `LengthMismatch` when the bit lengths differ.
pub fn hamming_distance(a: &PerceptualHash, b: &PerceptualHash) -> Result<u32> {
    if a.bits != b.bits {
        return Err(FirstmarkError::LengthMismatch {
            left: a.bits,
            right: b.bits,
        });
    }

    Ok(a.hash
        .iter()
        .zip(b.hash.iter())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum())
}

/// Similarity as a percentage: identical hashes score 100.0, fully inverted
/// hashes score 0.0.
pub fn similarity_percent(a: &PerceptualHash, b: &PerceptualHash) -> Result<f64> {
    let distance = hamming_distance(a, b)?;
    Ok(100.0 * (1.0 - distance as f64 / a.bits as f64))
}

/// Compute the dHash of a decoded frame on an `(n+1) x n` grid.
pub fn dhash(frame: &DynamicImage, grid_size: u32) -> Result<PerceptualHash> {
    if grid_size < 2 {
        return Err(FirstmarkError::InvalidConfig(format!(
            "grid_size must be >= 2, got {}",
            grid_size
        )));
    }
    if frame.width() == 0 || frame.height() == 0 {
        return Err(FirstmarkError::unsupported("Frame has zero dimensions"));
    }

    let (width, height) = (grid_size + 1, grid_size);
    let luma = if frame.width() == width && frame.height() == height {
        frame.to_luma8()
    } else {
        frame
            .resize_exact(width, height, FilterType::Triangle)
            .to_luma8()
    };

    let luma = &luma;
    let bits = (0..height).flat_map(move |y| {
        (0..grid_size).map(move |x| luma.get_pixel(x, y)[0] > luma.get_pixel(x + 1, y)[0])
    });

    PerceptualHash::from_bits(bits)
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
