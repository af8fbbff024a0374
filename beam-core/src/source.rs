//! Capture sources for the broadcast pipeline.
//!
//! The pipeline pulls rasters through the [`FrameSource`] trait so it
//! stays independent of any particular capture backend (OS screen
//! grabber, camera, replay file). This crate ships only
//! [`TestPatternSource`]; real grabbers live with the callers that need
//! them.

use image::{Rgb, RgbImage};

use crate::error::BeamError;

// ── FrameSource ──────────────────────────────────────────────────

/// Supplies the current raster to broadcast, one frame per call.
///
/// A failing source (display gone, permission revoked) surfaces as
/// [`BeamError::Encode`] and ends the session.
pub trait FrameSource: Send {
    /// Grab the current frame.
    fn capture(&mut self) -> Result<RgbImage, BeamError>;
}

// ── TestPatternSource ────────────────────────────────────────────

/// Synthetic capture source producing an animated gradient.
///
/// Each call shifts the pattern by one step so consecutive frames
/// differ, which keeps encoded sizes realistic in tests and demos.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    tick: u32,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
        }
    }

    /// Frames produced so far.
    pub fn frames_produced(&self) -> u32 {
        self.tick
    }
}

impl FrameSource for TestPatternSource {
    fn capture(&mut self) -> Result<RgbImage, BeamError> {
        let t = self.tick;
        self.tick = self.tick.wrapping_add(1);
        Ok(RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                (x.wrapping_add(t) % 256) as u8,
                (y.wrapping_add(t.wrapping_mul(3)) % 256) as u8,
                ((x ^ y) % 256) as u8,
            ])
        }))
    }
}

// ── Tests ────────────────────────────────────────────────────────
