//! # beam-core
//!
//! Point-to-point screen-frame streaming over TCP.
//!
//! One producer captures, JPEG-compresses, and length-prefixes frames
//! onto a single TCP connection; one consumer reassembles, decodes,
//! and hands each image to a callback. A best-effort subnet scan
//! locates candidate producers.
//!
//! ```text
//! PRODUCER                                    CONSUMER
//! ┌─────────────────────────┐                ┌──────────────────────┐
//! │ FrameSource::capture    │                │ FrameCodec           │
//! │   ↓                     │                │   ↓                  │
//! │ FrameEncoder (JPEG)     │      TCP       │ FrameDecoder (JPEG)  │
//! │   ↓                     │ ──────────►    │   ↓                  │
//! │ FrameCodec              │                │ frame callback       │
//! └─────────────────────────┘                └──────────────────────┘
//!
//! Discovery: scan() ──[TCP probes on the local /24]──► candidate list
//! ```
//!
//! ## Wire format
//!
//! ```text
//! frame   := header payload
//! header  := u32, big-endian — exact payload length in bytes
//! payload := one complete JPEG image
//! ```
//!
//! No handshake, no version negotiation, no heartbeat: a connection
//! carries a plain frame sequence until one side closes it.
//!
//! ## Sub-modules
//!
//! | Module      | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `codec`     | Length-prefixed wire framing                     |
//! | `jpeg`      | JPEG compression / decompression with bounding   |
//! | `source`    | Capture-source seam + synthetic test pattern     |
//! | `broadcast` | Producer session: capture → encode → send        |
//! | `viewer`    | Consumer session: receive → decode → callback    |
//! | `discovery` | Parallel subnet scan for candidate producers     |
//! | `state`     | Session lifecycle state machine                  |
//! | `stats`     | Per-session transfer counters                    |
//! | `net`       | Deadline-bounded TCP connect                     |
//! | `error`     | `BeamError` — typed error hierarchy              |

pub mod broadcast;
pub mod codec;
pub mod discovery;
pub mod error;
pub mod jpeg;
pub mod net;
pub mod source;
pub mod state;
pub mod stats;
pub mod viewer;

// ── Defaults ─────────────────────────────────────────────────────

/// Default frame port.
pub const DEFAULT_PORT: u16 = 5000;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use broadcast::{BroadcastConfig, BroadcastSession, DEFAULT_FPS, DEFAULT_QUALITY};
pub use codec::{DEFAULT_MAX_FRAME_SIZE, FrameCodec, HEADER_SIZE};
pub use discovery::{
    DEFAULT_CONCURRENCY, DEFAULT_PROBE_TIMEOUT, ScanConfig, scan, scan_with,
};
pub use error::BeamError;
pub use jpeg::{FrameDecoder, FrameEncoder, MAX_QUALITY, MIN_QUALITY};
pub use net::{DEFAULT_CONNECT_TIMEOUT, connect_with_timeout};
pub use source::{FrameSource, TestPatternSource};
pub use state::SessionState;
pub use stats::SessionStats;
pub use viewer::{DecodePolicy, ViewerConfig, ViewerFrame, ViewerMode, ViewerSession};
