//! JPEG compression and decompression for frame payloads.
//!
//! [`FrameEncoder`] turns captured RGB rasters into JPEG payloads at a
//! fixed quality; [`FrameDecoder`] parses received payloads back into
//! images, optionally scaled down to fit a display bound.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

use crate::error::BeamError;

// ── Constants ────────────────────────────────────────────────────

/// Lowest JPEG quality a session will accept.
pub const MIN_QUALITY: u8 = 10;

/// Highest JPEG quality a session will accept.
pub const MAX_QUALITY: u8 = 95;

// ── FrameEncoder ─────────────────────────────────────────────────

/// Compresses RGB rasters into JPEG payloads at a fixed quality.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    quality: u8,
}

impl FrameEncoder {
    /// Encoder at the given quality.
    ///
    /// Values outside `10..=95` are clamped into range here; session
    /// configs reject them up front instead (see
    /// [`BroadcastConfig::validate`](crate::broadcast::BroadcastConfig::validate)).
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(MIN_QUALITY, MAX_QUALITY),
        }
    }

    /// The effective (clamped) quality.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Compress one raster into a JPEG payload.
    pub fn encode(&self, frame: &RgbImage) -> Result<Bytes, BeamError> {
        let mut buf = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut buf, self.quality);
        frame
            .write_with_encoder(encoder)
            .map_err(|e| BeamError::Encode(format!("jpeg encode failed: {e}")))?;
        Ok(Bytes::from(buf.into_inner()))
    }
}

// ── FrameDecoder ─────────────────────────────────────────────────

/// Parses JPEG payloads into images, scaling down to fit an optional
/// display bound.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    bound: Option<(u32, u32)>,
}

impl FrameDecoder {
    /// Decoder that fits images within `bound` (width, height).
    ///
    /// `None` keeps every image at its encoded size.
    pub fn new(bound: Option<(u32, u32)>) -> Self {
        Self { bound }
    }

    /// Decode one payload.
    ///
    /// A payload that does not parse as a complete image fails with
    /// [`BeamError::Decode`]; there is no partial result. Images larger
    /// than the bound in either dimension are scaled down to fit with
    /// Lanczos resampling, preserving aspect ratio. Smaller images are
    /// returned untouched, never upscaled.
    pub fn decode(&self, payload: &[u8]) -> Result<DynamicImage, BeamError> {
        let image = image::load_from_memory(payload)
            .map_err(|e| BeamError::Decode(format!("jpeg decode failed: {e}")))?;

        Ok(match self.bound {
            Some((max_w, max_h)) if image.width() > max_w || image.height() > max_h => {
                image.resize(max_w, max_h, FilterType::Lanczos3)
            }
            _ => image,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FrameSource, TestPatternSource};

    fn test_raster(width: u32, height: u32) -> RgbImage {
        TestPatternSource::new(width, height).capture().unwrap()
    }

    #[test]
    fn encode_produces_jpeg_magic() {
        let payload = FrameEncoder::new(70).encode(&test_raster(64, 48)).unwrap();
        // JPEG streams open with the SOI marker.
        assert_eq!(&payload[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn roundtrip_preserves_dimensions() {
        let payload = FrameEncoder::new(70).encode(&test_raster(64, 48)).unwrap();
        let image = FrameDecoder::new(None).decode(&payload).unwrap();
        assert_eq!((image.width(), image.height()), (64, 48));
    }

    #[test]
    fn quality_is_clamped_into_range() {
        assert_eq!(FrameEncoder::new(5).quality(), MIN_QUALITY);
        assert_eq!(FrameEncoder::new(100).quality(), MAX_QUALITY);
        assert_eq!(FrameEncoder::new(70).quality(), 70);
    }

    #[test]
    fn higher_quality_yields_larger_payload() {
        let raster = test_raster(320, 240);
        let low = FrameEncoder::new(MIN_QUALITY).encode(&raster).unwrap();
        let high = FrameEncoder::new(MAX_QUALITY).encode(&raster).unwrap();
        assert!(high.len() > low.len());
    }

    #[test]
    fn decode_scales_down_to_fit_bound() {
        let payload = FrameEncoder::new(70).encode(&test_raster(640, 480)).unwrap();
        let image = FrameDecoder::new(Some((320, 320))).decode(&payload).unwrap();
        // Fit within 320×320 preserving 4:3.
        assert_eq!((image.width(), image.height()), (320, 240));
    }

    #[test]
    fn decode_never_upscales() {
        let payload = FrameEncoder::new(70).encode(&test_raster(64, 48)).unwrap();
        let image = FrameDecoder::new(Some((990, 650))).decode(&payload).unwrap();
        assert_eq!((image.width(), image.height()), (64, 48));
    }

    #[test]
    fn garbage_payload_fails_to_decode() {
        let err = FrameDecoder::new(None).decode(&[1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, BeamError::Decode(_)));
    }

    #[test]
    fn truncated_jpeg_fails_to_decode() {
        let payload = FrameEncoder::new(70).encode(&test_raster(64, 48)).unwrap();
        // Cut inside the marker segments, before any scan data.
        let err = FrameDecoder::new(None).decode(&payload[..16]).unwrap_err();
        assert!(matches!(err, BeamError::Decode(_)));
    }
}
