//! Domain-specific error types for beam sessions.
//!
//! All fallible operations return `Result<T, BeamError>`.
//! No panics on invalid input: every error is typed and recoverable.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// The canonical error type for beam sessions.
#[derive(Debug, Error)]
pub enum BeamError {
    // ── Connection Errors ────────────────────────────────────────
    /// The TCP connect attempt did not complete within its deadline.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The peer actively refused the TCP connection.
    #[error("connection refused by {0}")]
    ConnectionRefused(SocketAddr),

    /// The TCP/IO layer reported a mid-stream fault.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    // ── Framing Errors ───────────────────────────────────────────
    /// The peer closed the connection between a frame header and the
    /// end of its payload.
    ///
    /// A close at a frame boundary is a clean end-of-stream, not an
    /// error; this variant means the stream died inside a frame.
    #[error("connection closed mid-frame: got {got} of {expected} bytes")]
    TruncatedFrame { expected: usize, got: usize },

    /// Frame length exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Codec Errors ─────────────────────────────────────────────
    /// Compressing a captured raster failed, or the capture source
    /// itself could not produce one.
    #[error("encode error: {0}")]
    Encode(String),

    /// A received payload did not parse as a valid image.
    #[error("decode error: {0}")]
    Decode(String),

    // ── Configuration Errors ─────────────────────────────────────
    /// A session was started with a parameter no session can run with.
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}
