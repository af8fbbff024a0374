//! Length-prefixed wire framing.
//!
//! Every frame on the wire is a 4-byte big-endian length followed by
//! exactly that many payload bytes:
//!
//! ```text
//! frame   := header payload
//! header  := u32, big-endian — payload length N
//! payload := N bytes, one complete compressed image
//! ```
//!
//! One logical writer and one logical reader per socket; frames are
//! never interleaved. [`FrameCodec`] plugs into
//! `tokio_util::codec::Framed` on both ends and is where the protocol's
//! one subtle distinction lives: a peer close at a frame boundary is a
//! clean end-of-stream, a close between header and end of payload is
//! [`BeamError::TruncatedFrame`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::BeamError;

// ── Constants ────────────────────────────────────────────────────

/// Wire size of the length header.
pub const HEADER_SIZE: usize = 4;

/// Default upper bound on a single frame's payload.
///
/// The header field admits lengths up to `u32::MAX`; the bound keeps a
/// corrupt or hostile header from forcing a multi-gigabyte allocation.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

// ── FrameCodec ───────────────────────────────────────────────────

/// Codec for length-prefixed image frames.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Codec with the default frame size limit.
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Codec with an explicit frame size limit.
    ///
    /// Capped at `u32::MAX`, the largest length the header can carry.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(u32::MAX as usize),
        }
    }

    /// The active frame size limit.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Read the length header without consuming it.
    fn peek_len(src: &BytesMut) -> usize {
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&src[..HEADER_SIZE]);
        u32::from_be_bytes(header) as usize
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = BeamError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, BeamError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let len = Self::peek_len(src);
        if len > self.max_frame_size {
            return Err(BeamError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        if src.len() < HEADER_SIZE + len {
            // Ask the transport for the rest of this frame in one go.
            src.reserve(HEADER_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        Ok(Some(src.split_to(len).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, BeamError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            // No buffered bytes at EOF: the peer closed at a frame
            // boundary.
            None if src.is_empty() => Ok(None),
            // Leftover bytes that never became a frame: the peer died
            // mid-frame. Report how far through it got.
            None => {
                let (expected, got) = if src.len() < HEADER_SIZE {
                    (HEADER_SIZE, src.len())
                } else {
                    (Self::peek_len(src), src.len() - HEADER_SIZE)
                };
                Err(BeamError::TruncatedFrame { expected, got })
            }
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = BeamError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), BeamError> {
        if item.len() > self.max_frame_size {
            return Err(BeamError::FrameTooLarge {
                size: item.len(),
                max: self.max_frame_size,
            });
        }

        dst.reserve(HEADER_SIZE + item.len());
        dst.put_u32(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
