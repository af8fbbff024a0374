//! Consumer side: receive → decode → deliver to a callback.
//!
//! [`ViewerSession`] owns the receiving half of a stream. It obtains a
//! socket in one of two ways (bind-and-accept-one or dial), then
//! loops: reassemble a frame via
//! [`FrameCodec`](crate::codec::FrameCodec), decode it via
//! [`FrameDecoder`](crate::jpeg::FrameDecoder), and hand the image to
//! the registered callback together with its arrival time.
//!
//! The callback runs on the session's own task; anything with
//! thread-affinity requirements (a rendering surface, a GUI loop)
//! should forward frames onward rather than block here.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use image::DynamicImage;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::FrameCodec;
use crate::error::BeamError;
use crate::jpeg::FrameDecoder;
use crate::net::{DEFAULT_CONNECT_TIMEOUT, connect_with_timeout};
use crate::state::SessionState;
use crate::stats::SessionStats;

// ── ViewerMode ───────────────────────────────────────────────────

/// How the viewer obtains its socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerMode {
    /// Bind the address and accept exactly one incoming producer.
    Listen(SocketAddr),
    /// Dial a remote producer.
    Connect(SocketAddr),
}

// ── DecodePolicy ─────────────────────────────────────────────────

/// What to do with a payload that does not decode.
///
/// The default is [`Fatal`](Self::Fatal): a producer sending
/// undecodable data is treated as a broken stream and the session
/// fails on the first bad payload. [`Skip`](Self::Skip) trades that
/// strictness for robustness: bad payloads are logged and dropped,
/// and the next frame is read as usual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Treat an undecodable payload as a stream-fatal error.
    #[default]
    Fatal,
    /// Log the bad payload and continue with the next frame.
    Skip,
}

// ── ViewerConfig ─────────────────────────────────────────────────

/// Configuration for [`ViewerSession`].
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Listen for the producer or dial it.
    pub mode: ViewerMode,

    /// Fit decoded images within (width, height). `None` keeps every
    /// image at its encoded size. Images are never upscaled.
    pub max_display: Option<(u32, u32)>,

    /// Undecodable-payload handling.
    pub decode_policy: DecodePolicy,

    /// Deadline for the TCP connect in [`ViewerMode::Connect`].
    pub connect_timeout: Duration,
}

impl ViewerConfig {
    /// Config with defaults for everything but the mode.
    pub fn new(mode: ViewerMode) -> Self {
        Self {
            mode,
            max_display: None,
            decode_policy: DecodePolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Reject parameters no session could run with.
    ///
    /// Port 0 stays allowed in [`ViewerMode::Listen`]: it asks the OS
    /// for an ephemeral port, reported via
    /// [`ViewerSession::local_addr`].
    pub fn validate(&self) -> Result<(), BeamError> {
        if let ViewerMode::Connect(target) = self.mode {
            if target.port() == 0 {
                return Err(BeamError::InvalidConfig("target port must be non-zero"));
            }
        }
        if let Some((w, h)) = self.max_display {
            if w == 0 || h == 0 {
                return Err(BeamError::InvalidConfig(
                    "display bound must be non-zero in both dimensions",
                ));
            }
        }
        if self.connect_timeout.is_zero() {
            return Err(BeamError::InvalidConfig("connect timeout must be non-zero"));
        }
        Ok(())
    }
}

// ── ViewerFrame ──────────────────────────────────────────────────

/// One decoded frame as delivered to the frame callback.
#[derive(Debug, Clone)]
pub struct ViewerFrame {
    /// The decoded (and possibly downscaled) image.
    pub image: DynamicImage,
    /// When the frame finished arriving off the wire.
    pub received_at: Instant,
}

// ── ViewerSession ────────────────────────────────────────────────

/// Handle to a running consumer pipeline.
///
/// Created by [`start`](Self::start); the pipeline keeps running in
/// its own task until the producer closes the stream, an error occurs,
/// or [`stop`](Self::stop) is called. One session serves one
/// connection.
pub struct ViewerSession {
    cancel: CancellationToken,
    state_tx: Arc<watch::Sender<SessionState>>,
    state_rx: watch::Receiver<SessionState>,
    stats_rx: watch::Receiver<SessionStats>,
    local_addr_rx: watch::Receiver<Option<SocketAddr>>,
    handle: Option<JoinHandle<()>>,
}

impl ViewerSession {
    /// Validate `config` and spawn the pipeline.
    ///
    /// `on_frame` is invoked on the session task for every decoded
    /// frame, in arrival order. Returns `Err` only for
    /// [`BeamError::InvalidConfig`]; everything that can fail later
    /// surfaces through [`state`](Self::state) as
    /// [`SessionState::Failed`].
    pub fn start<F>(config: ViewerConfig, on_frame: F) -> Result<Self, BeamError>
    where
        F: FnMut(ViewerFrame) + Send + 'static,
    {
        config.validate()?;

        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let state_tx = Arc::new(state_tx);
        let (stats_tx, stats_rx) = watch::channel(SessionStats::default());
        let (local_addr_tx, local_addr_rx) = watch::channel(None);

        let handle = tokio::spawn(run_pipeline(
            config,
            on_frame,
            cancel.clone(),
            Arc::clone(&state_tx),
            stats_tx,
            local_addr_tx,
        ));

        Ok(Self {
            cancel,
            state_tx,
            state_rx,
            stats_rx,
            local_addr_rx,
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

    /// A receiver that observes a stats snapshot per frame delivered.
    pub fn stats_receiver(&self) -> watch::Receiver<SessionStats> {
        self.stats_rx.clone()
    }

    /// The local address of the session's socket.
    ///
    /// In listen mode this is the bound listen address, available as
    /// soon as the listener binds; with port 0 the OS-assigned port
    /// shows up here. In connect mode it is the connected socket's
    /// local end. Resolves `None` if the session ends before a socket
    /// exists.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut rx = self.local_addr_rx.clone();
        match rx.wait_for(|addr| addr.is_some()).await {
            Ok(addr) => *addr,
            Err(_) => None,
        }
    }

    /// Request shutdown.
    ///
    /// Idempotent and safe from any task; repeat calls and calls on a
    /// session that already ended are no-ops. An in-progress blocking
    /// read is abandoned, which closes the socket.
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

impl Drop for ViewerSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Pipeline ─────────────────────────────────────────────────────

async fn run_pipeline<F>(
    config: ViewerConfig,
    mut on_frame: F,
    cancel: CancellationToken,
    state_tx: Arc<watch::Sender<SessionState>>,
    stats_tx: watch::Sender<SessionStats>,
    local_addr_tx: watch::Sender<Option<SocketAddr>>,
) where
    F: FnMut(ViewerFrame) + Send + 'static,
{
    let result = receive_frames(
        &config,
        &mut on_frame,
        &cancel,
        &state_tx,
        &stats_tx,
        &local_addr_tx,
    )
    .await;

    match result {
        Ok(()) => {
            state_tx.send_if_modified(|s| s.finish_stop());
            info!("viewer stopped");
        }
        Err(e) => {
            let reason = e.to_string();
            error!(error = %reason, "viewer failed");
            state_tx.send_if_modified(|s| s.fail(reason));
        }
    }
}

async fn receive_frames<F>(
    config: &ViewerConfig,
    on_frame: &mut F,
    cancel: &CancellationToken,
    state_tx: &watch::Sender<SessionState>,
    stats_tx: &watch::Sender<SessionStats>,
    local_addr_tx: &watch::Sender<Option<SocketAddr>>,
) -> Result<(), BeamError>
where
    F: FnMut(ViewerFrame),
{
    if cancel.is_cancelled() {
        return Ok(());
    }

    state_tx.send_if_modified(|s| s.begin_connect());

    let stream = match config.mode {
        ViewerMode::Listen(bind) => {
            let listener = TcpListener::bind(bind).await?;
            let local = listener.local_addr()?;
            let _ = local_addr_tx.send(Some(local));
            info!(addr = %local, "listening for producer");

            let (stream, peer) = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                result = listener.accept() => result?,
            };
            info!(peer = %peer, "producer connected");
            // The listener drops here: one connection per session.
            stream
        }
        ViewerMode::Connect(target) => {
            debug!(target = %target, "connecting");
            let stream = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                result = connect_with_timeout(target, config.connect_timeout) => result?,
            };
            let _ = local_addr_tx.send(stream.local_addr().ok());
            info!(target = %target, "connected to producer");
            stream
        }
    };

    let mut framed = Framed::new(stream, FrameCodec::new());
    let decoder = FrameDecoder::new(config.max_display);

    state_tx.send_if_modified(|s| s.begin_streaming());

    let mut stats = SessionStats::default();

    loop {
        let payload = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = framed.next() => match next {
                // Peer closed at a frame boundary.
                None => return Ok(()),
                Some(result) => result?,
            },
        };

        let received_at = Instant::now();

        let image = match decoder.decode(&payload) {
            Ok(image) => image,
            Err(e) => match config.decode_policy {
                DecodePolicy::Fatal => return Err(e),
                DecodePolicy::Skip => {
                    warn!(bytes = payload.len(), error = %e, "skipping undecodable frame");
                    continue;
                }
            },
        };

        on_frame(ViewerFrame { image, received_at });

        stats.record_frame(payload.len(), received_at);
        let _ = stats_tx.send(stats.clone());
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ViewerConfig::new(ViewerMode::Listen("0.0.0.0:5000".parse().unwrap()));
        assert_eq!(config.decode_policy, DecodePolicy::Fatal);
        assert!(config.max_display.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn listen_on_port_zero_allowed() {
        let config = ViewerConfig::new(ViewerMode::Listen("127.0.0.1:0".parse().unwrap()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn connect_to_port_zero_rejected() {
        let config = ViewerConfig::new(ViewerMode::Connect("127.0.0.1:0".parse().unwrap()));
        assert!(matches!(
            config.validate(),
            Err(BeamError::InvalidConfig(_))
        ));
    }

    #[test]
    fn degenerate_display_bound_rejected() {
        let mut config = ViewerConfig::new(ViewerMode::Listen("127.0.0.1:0".parse().unwrap()));
        config.max_display = Some((0, 650));
        assert!(config.validate().is_err());

        config.max_display = Some((990, 0));
        assert!(config.validate().is_err());

        config.max_display = Some((990, 650));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_connect_timeout_rejected() {
        let mut config = ViewerConfig::new(ViewerMode::Connect("127.0.0.1:5000".parse().unwrap()));
        config.connect_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
