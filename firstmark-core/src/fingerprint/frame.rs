//! Representative frame extraction for the perceptual tier.
//!
//! Images are decoded directly (the first frame for animated formats).
//! Video containers are scanned for the first embedded still frame, which
//! covers Motion-JPEG style streams; codec-backed extraction can be plugged
//! in through [`FrameExtractor`].

use image::DynamicImage;
use tracing::debug;

use super::{CancelToken, MediaKind};
use crate::error::{FirstmarkError, Result};

const JPEG_SOI: &[u8] = &[0xFF, 0xD8, 0xFF];
const JPEG_EOI: &[u8] = &[0xFF, 0xD9];
const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const PNG_IEND: &[u8] = b"IEND";

/// Upper bound on candidate frames decoded per video container.
pub const MAX_FRAME_CANDIDATES: usize = 64;

/// Produces the single frame the perceptual hash is computed from.
///
/// Implementations must be thread-safe (`Send + Sync`); the engine may be
/// shared across a worker pool.
pub trait FrameExtractor: Send + Sync {
    /// Decode one representative frame from `data`.
    ///
    /// Only called for kinds where the perceptual tier applies
    /// (`Image`, `Video`). Fails with `UnsupportedMedia` on malformed input
    /// or once `cancel` trips; long-running implementations should check it
    /// between units of work.
    fn extract(&self, data: &[u8], kind: MediaKind, cancel: &CancelToken)
        -> Result<DynamicImage>;
}

/// Default extractor: direct image decoding plus embedded-frame scanning.
#[derive(Debug, Clone)]
pub struct EmbeddedFrameExtractor {
    scan_limit: usize,
}

impl EmbeddedFrameExtractor {
    pub fn new(scan_limit: usize) -> Self {
        Self { scan_limit }
    }

    /// Check whether the bytes start with a supported image format.
    pub fn is_supported_image(data: &[u8]) -> bool {
        image::guess_format(data).is_ok()
    }

    fn decode_image(data: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(data)
            .map_err(|e| FirstmarkError::unsupported(format!("Failed to decode image: {}", e)))
    }

    /// Return the first embedded still frame that decodes.
    ///
    /// The scan is a single forward pass over the window and gives up after
    /// [`MAX_FRAME_CANDIDATES`] failed decodes.
    fn first_embedded_frame(&self, data: &[u8], cancel: &CancelToken) -> Result<DynamicImage> {
        let window = &data[..data.len().min(self.scan_limit)];

        for (attempt, (start, end)) in FrameCandidates::new(window).enumerate() {
            cancel.check()?;
            if attempt == MAX_FRAME_CANDIDATES {
                debug!(offset = start, "Candidate frame limit reached");
                break;
            }
            match Self::decode_image(&window[start..end]) {
                Ok(frame) => {
                    debug!(offset = start, len = end - start, "Found embedded frame");
                    return Ok(frame);
                }
                Err(e) => {
                    debug!(offset = start, error = %e, "Skipping undecodable candidate frame");
                }
            }
        }

        Err(FirstmarkError::unsupported(format!(
            "No decodable frame in the first {} bytes of the video container",
            window.len()
        )))
    }
}

impl Default for EmbeddedFrameExtractor {
    fn default() -> Self {
        Self::new(16 * 1024 * 1024)
    }
}

impl FrameExtractor for EmbeddedFrameExtractor {
    fn extract(
        &self,
        data: &[u8],
        kind: MediaKind,
        cancel: &CancelToken,
    ) -> Result<DynamicImage> {
        cancel.check()?;
        match kind {
            MediaKind::Image => Self::decode_image(data),
            MediaKind::Video => {
                // Animated image formats double as video sources
                if Self::is_supported_image(data) {
                    if let Ok(frame) = Self::decode_image(data) {
                        return Ok(frame);
                    }
                }
                self.first_embedded_frame(data, cancel)
            }
            MediaKind::Audio | MediaKind::Other => Err(FirstmarkError::unsupported(format!(
                "No visual frame for {} content",
                kind
            ))),
        }
    }
}

/// Cached forward search for one marker.
///
/// Queries must come with non-decreasing `from` offsets; each byte of the
/// haystack is then examined at most once per marker.
struct Marker {
    needle: &'static [u8],
    hit: Option<usize>,
    exhausted: bool,
}

impl Marker {
    fn new(needle: &'static [u8]) -> Self {
        Self {
            needle,
            hit: None,
            exhausted: false,
        }
    }

    /// First occurrence at or after `from`.
    fn at_or_after(&mut self, data: &[u8], from: usize) -> Option<usize> {
        if self.exhausted {
            return None;
        }
        if let Some(hit) = self.hit.filter(|&hit| hit >= from) {
            return Some(hit);
        }
        self.hit = find(data, self.needle, from);
        self.exhausted = self.hit.is_none();
        self.hit
    }
}

/// Candidate JPEG and PNG byte ranges in offset order.
struct FrameCandidates<'a> {
    data: &'a [u8],
    next: usize,
    soi: Marker,
    eoi: Marker,
    png: Marker,
    iend: Marker,
}

impl<'a> FrameCandidates<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            next: 0,
            soi: Marker::new(JPEG_SOI),
            eoi: Marker::new(JPEG_EOI),
            png: Marker::new(PNG_SIGNATURE),
            iend: Marker::new(PNG_IEND),
        }
    }

    fn jpeg(&mut self) -> Option<(usize, usize)> {
        let start = self.soi.at_or_after(self.data, self.next)?;
        let eoi = self.eoi.at_or_after(self.data, start + JPEG_SOI.len())?;
        Some((start, eoi + JPEG_EOI.len()))
    }

    fn png(&mut self) -> Option<(usize, usize)> {
        let start = self.png.at_or_after(self.data, self.next)?;
        let iend = self.iend.at_or_after(self.data, start + PNG_SIGNATURE.len())?;
        // IEND chunk type is followed by its 4-byte CRC
        Some((start, (iend + PNG_IEND.len() + 4).min(self.data.len())))
    }
}

impl Iterator for FrameCandidates<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let candidate = match (self.jpeg(), self.png()) {
            (Some(j), Some(p)) => Some(if p.0 < j.0 { p } else { j }),
            (j, p) => j.or(p),
        }?;
        self.next = candidate.0 + 1;
        Some(candidate)
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, _| Rgb([(x * 10) as u8, 40, 90]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_find() {
        assert_eq!(find(b"abcabc", b"bc", 0), Some(1));
        assert_eq!(find(b"abcabc", b"bc", 2), Some(4));
        assert_eq!(find(b"abcabc", b"zz", 0), None);
        assert_eq!(find(b"abc", b"a", 10), None);
    }

    #[test]
    fn test_extract_image() {
        let extractor = EmbeddedFrameExtractor::default();
        let frame = extractor
            .extract(&png_bytes(20, 10), MediaKind::Image, &CancelToken::new())
            .unwrap();
        assert_eq!((frame.width(), frame.height()), (20, 10));
    }

    #[test]
    fn test_extract_image_rejects_garbage() {
        let extractor = EmbeddedFrameExtractor::default();
        let err = extractor
            .extract(b"definitely not an image", MediaKind::Image, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, FirstmarkError::UnsupportedMedia(_)));
    }

    #[test]
    fn test_extract_embedded_video_frame() {
        let mut container = b"FAKEVIDEOHEADER\x00\x01\x02".to_vec();
        container.extend_from_slice(&png_bytes(16, 12));
        container.extend_from_slice(b"trailing-stream-data");

        let extractor = EmbeddedFrameExtractor::default();
        let frame = extractor
            .extract(&container, MediaKind::Video, &CancelToken::new())
            .unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 12));
    }

    #[test]
    fn test_video_without_frame_is_unsupported() {
        let extractor = EmbeddedFrameExtractor::default();
        let err = extractor
            .extract(b"ftypisom....moov....mdat", MediaKind::Video, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, FirstmarkError::UnsupportedMedia(_)));
    }

    #[test]
    fn test_scan_limit_bounds_search() {
        let mut container = vec![0u8; 4096];
        container.extend_from_slice(&png_bytes(8, 8));

        let extractor = EmbeddedFrameExtractor::new(1024);
        assert!(extractor
            .extract(&container, MediaKind::Video, &CancelToken::new())
            .is_err());

        let extractor = EmbeddedFrameExtractor::new(1024 * 1024);
        assert!(extractor
            .extract(&container, MediaKind::Video, &CancelToken::new())
            .is_ok());
    }

    #[test]
    fn test_marker_run_is_scanned_in_bounded_time() {
        // Endless back-to-back "JPEG" candidates that never decode
        let evil: Vec<u8> = [0xFF, 0xD8, 0xFF, 0xFF, 0xD9]
            .iter()
            .copied()
            .cycle()
            .take(4 * 1024 * 1024)
            .collect();

        let extractor = EmbeddedFrameExtractor::default();
        let started = Instant::now();
        let err = extractor
            .extract(&evil, MediaKind::Video, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, FirstmarkError::UnsupportedMedia(_)));
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "scan took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_unterminated_markers_are_scanned_once() {
        let mut evil = Vec::new();
        while evil.len() < 4 * 1024 * 1024 {
            evil.extend_from_slice(JPEG_SOI);
            evil.extend_from_slice(PNG_SIGNATURE);
        }

        let started = Instant::now();
        assert_eq!(FrameCandidates::new(&evil).count(), 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_candidates_in_offset_order() {
        let mut data = b"xx".to_vec();
        data.extend_from_slice(PNG_SIGNATURE);
        data.extend_from_slice(b"IENDcrc!");
        data.extend_from_slice(JPEG_SOI);
        data.extend_from_slice(JPEG_EOI);
        data.extend_from_slice(JPEG_SOI);
        data.extend_from_slice(JPEG_EOI);

        let candidates: Vec<_> = FrameCandidates::new(&data).collect();
        assert_eq!(candidates, vec![(2, 18), (18, 23), (23, 28)]);
    }

    #[test]
    fn test_candidate_limit() {
        let mut container = Vec::new();
        for _ in 0..MAX_FRAME_CANDIDATES {
            container.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0x00, 0xFF, 0xD9]);
        }
        container.extend_from_slice(&png_bytes(8, 8));

        let extractor = EmbeddedFrameExtractor::default();
        assert!(extractor
            .extract(&container, MediaKind::Video, &CancelToken::new())
            .is_err());

        // One junk candidate fewer and the frame is reached
        let container = &container[6..];
        assert!(extractor
            .extract(container, MediaKind::Video, &CancelToken::new())
            .is_ok());
    }

    #[test]
    fn test_cancelled_extraction_stops() {
        let mut container = b"HEADER".to_vec();
        container.extend_from_slice(&png_bytes(8, 8));

        let cancel = CancelToken::new();
        cancel.cancel();
        let extractor = EmbeddedFrameExtractor::default();
        let err = extractor
            .extract(&container, MediaKind::Video, &cancel)
            .unwrap_err();
        match err {
            FirstmarkError::UnsupportedMedia(msg) => assert!(msg.contains("cancelled")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_audio_has_no_frame() {
        let extractor = EmbeddedFrameExtractor::default();
        assert!(extractor
            .extract(b"RIFF", MediaKind::Audio, &CancelToken::new())
            .is_err());
    }

    #[test]
    fn test_is_supported_image() {
        assert!(EmbeddedFrameExtractor::is_supported_image(PNG_SIGNATURE));
        assert!(EmbeddedFrameExtractor::is_supported_image(&[0xFF, 0xD8, 0xFF]));
        assert!(!EmbeddedFrameExtractor::is_supported_image(&[0x00, 0x00, 0x00]));
    }
}
