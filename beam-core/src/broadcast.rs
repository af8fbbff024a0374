//! Producer side: capture → encode → send at a target rate.
//!
//! [`BroadcastSession`] owns the whole pipeline:
//!
//! 1. A [`FrameSource`] supplies the current raster.
//! 2. [`FrameEncoder`](crate::jpeg::FrameEncoder) compresses it to JPEG.
//! 3. [`FrameCodec`](crate::codec::FrameCodec) length-prefixes it onto
//!    the TCP stream.
//!
//! The pipeline runs in its own Tokio task and shuts down through a
//! `CancellationToken`: checked at the top of every tick and raced
//! against the connect, each frame send, and the pacing sleep, so a
//! stop preempts even a send blocked on a peer that stopped reading.
//! A frame abandoned mid-send reaches the peer truncated.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::SinkExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::codec::FrameCodec;
use crate::error::BeamError;
use crate::jpeg::{FrameEncoder, MAX_QUALITY, MIN_QUALITY};
use crate::net::{DEFAULT_CONNECT_TIMEOUT, connect_with_timeout};
use crate::source::FrameSource;
use crate::state::SessionState;
use crate::stats::SessionStats;

// ── Defaults ─────────────────────────────────────────────────────

/// Default target frame rate.
pub const DEFAULT_FPS: u32 = 10;

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 70;

// ── BroadcastConfig ──────────────────────────────────────────────

/// Configuration for [`BroadcastSession`].
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Where to send frames.
    pub target: SocketAddr,

    /// Target frames per second.
    ///
    /// Pacing is best-effort: each tick sleeps out the remainder of
    /// `1/fps` after capture, encode, and send, so a pipeline slower
    /// than the interval drifts below the target rate rather than
    /// catching up afterwards.
    pub fps: u32,

    /// JPEG quality, `10..=95`.
    pub quality: u8,

    /// Deadline for the initial TCP connect.
    pub connect_timeout: Duration,
}

impl BroadcastConfig {
    /// Config with defaults for everything but the target.
    pub fn new(target: SocketAddr) -> Self {
        Self {
            target,
            fps: DEFAULT_FPS,
            quality: DEFAULT_QUALITY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Reject parameters no session could run with.
    ///
    /// [`BroadcastSession::start`] calls this before any task or
    /// socket exists, so a bad config never produces a half-started
    /// session.
    pub fn validate(&self) -> Result<(), BeamError> {
        if self.fps == 0 {
            return Err(BeamError::InvalidConfig("fps must be at least 1"));
        }
        if self.quality < MIN_QUALITY || self.quality > MAX_QUALITY {
            return Err(BeamError::InvalidConfig("quality must be in 10..=95"));
        }
        if self.target.port() == 0 {
            return Err(BeamError::InvalidConfig("target port must be non-zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(BeamError::InvalidConfig("connect timeout must be non-zero"));
        }
        Ok(())
    }
}

// ── BroadcastSession ─────────────────────────────────────────────

/// Handle to a running producer pipeline.
///
/// Created by [`start`](Self::start); the pipeline keeps running in
/// its own task until the stream ends or [`stop`](Self::stop) is
/// called. One session serves one connection; to stream again, start
/// a new session.
pub struct BroadcastSession {
    cancel: CancellationToken,
    state_tx: Arc<watch::Sender<SessionState>>,
    state_rx: watch::Receiver<SessionState>,
    stats_rx: watch::Receiver<SessionStats>,
    handle: Option<JoinHandle<()>>,
}

impl BroadcastSession {
    /// Validate `config` and spawn the pipeline.
    ///
    /// Returns `Err` only for [`BeamError::InvalidConfig`]; connect
    /// failures happen asynchronously and surface through
    /// [`state`](Self::state) as [`SessionState::Failed`].
    pub fn start(
        config: BroadcastConfig,
        source: Box<dyn FrameSource>,
    ) -> Result<Self, BeamError> {
        config.validate()?;

        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let state_tx = Arc::new(state_tx);
        let (stats_tx, stats_rx) = watch::channel(SessionStats::default());

        let handle = tokio::spawn(run_pipeline(
            config,
            source,
            cancel.clone(),
            Arc::clone(&state_tx),
            stats_tx,
        ));

        Ok(Self {
            cancel,
            state_tx,
            state_rx,
            stats_rx,
            handle: Some(handle),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    /// Latest stats snapshot.
    pub fn stats(&self) -> SessionStats {
        self.stats_rx.borrow().clone()
    }

    /// A receiver that observes every state change.
    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// A receiver that observes a stats snapshot per frame sent.
    pub fn stats_receiver(&self) -> watch::Receiver<SessionStats> {
        self.stats_rx.clone()
    }

    /// Request shutdown.
    ///
    /// Idempotent and safe from any task; repeat calls and calls on a
    /// session that already ended are no-ops. The pipeline notices at
    /// its next await and winds down through `Stopped`; an in-progress
    /// blocking send is abandoned, which closes the socket.
    pub fn stop(&self) {
        self.state_tx.send_if_modified(|s| s.request_stop());
        self.cancel.cancel();
    }

    /// Wait until the session reaches `Stopped` or `Failed`.
    pub async fn wait_terminal(&self) -> SessionState {
        let mut rx = self.state_rx.clone();
        match rx.wait_for(|s| s.is_terminal()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state_rx.borrow().clone(),
        }
    }

    /// Wait for the pipeline task to exit and return the final state.
    pub async fn join(mut self) -> SessionState {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        self.state_rx.borrow().clone()
    }
}

impl Drop for BroadcastSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Pipeline ─────────────────────────────────────────────────────

async fn run_pipeline(
    config: BroadcastConfig,
    source: Box<dyn FrameSource>,
    cancel: CancellationToken,
    state_tx: Arc<watch::Sender<SessionState>>,
    stats_tx: watch::Sender<SessionStats>,
) {
    match stream_frames(&config, source, &cancel, &state_tx, &stats_tx).await {
        Ok(()) => {
            state_tx.send_if_modified(|s| s.finish_stop());
            info!(target = %config.target, "broadcast stopped");
        }
        Err(e) => {
            let reason = e.to_string();
            error!(target = %config.target, error = %reason, "broadcast failed");
            state_tx.send_if_modified(|s| s.fail(reason));
        }
    }
}

async fn stream_frames(
    config: &BroadcastConfig,
    mut source: Box<dyn FrameSource>,
    cancel: &CancellationToken,
    state_tx: &watch::Sender<SessionState>,
    stats_tx: &watch::Sender<SessionStats>,
) -> Result<(), BeamError> {
    if cancel.is_cancelled() {
        return Ok(());
    }

    state_tx.send_if_modified(|s| s.begin_connect());
    debug!(target = %config.target, "connecting");

    let stream = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        result = connect_with_timeout(config.target, config.connect_timeout) => result?,
    };

    let mut framed = Framed::new(stream, FrameCodec::new());
    let encoder = FrameEncoder::new(config.quality);
    let interval = Duration::from_secs_f64(1.0 / f64::from(config.fps));

    state_tx.send_if_modified(|s| s.begin_streaming());
    info!(
        target = %config.target,
        fps = config.fps,
        quality = encoder.quality(),
        "streaming"
    );

    let mut stats = SessionStats::default();

    while !cancel.is_cancelled() {
        let tick_start = Instant::now();

        let raster = source.capture()?;
        let payload = encoder.encode(&raster)?;
        let payload_len = payload.len();

        // Raced so a stop can abandon a send blocked on a peer that
        // stopped reading; the peer sees the abandoned frame as
        // truncated.
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            sent = framed.send(payload) => sent?,
        }

        stats.record_frame(payload_len, Instant::now());
        let _ = stats_tx.send(stats.clone());

        // Sleep out the rest of the tick.
        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(interval - elapsed) => {}
            }
        }
    }

    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
