//! beam-cast — entry point.
//!
//! ```text
//! beam-cast 192.168.1.23:5000                Stream to a viewer at 10 fps
//! beam-cast 192.168.1.23:5000 --fps 5        Override the frame rate
//! beam-cast 192.168.1.23:5000 --quality 85   Override the JPEG quality
//! beam-cast 192.168.1.23:5000 --size 640x480 Set the test-pattern size
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use beam_core::{
    BroadcastConfig, BroadcastSession, DEFAULT_FPS, DEFAULT_QUALITY, SessionState,
    TestPatternSource,
};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "beam-cast", about = "Stream compressed frames to a beam viewer")]
struct Cli {
    /// Viewer address to stream to, e.g. 192.168.1.23:5000.
    target: SocketAddr,

    /// Frames per second.
    #[arg(long, default_value_t = DEFAULT_FPS)]
    fps: u32,

    /// JPEG quality (10..=95).
    #[arg(long, default_value_t = DEFAULT_QUALITY)]
    quality: u8,

    /// Connect timeout in seconds.
    #[arg(long, default_value_t = 5)]
    connect_timeout: u64,

    /// Test-pattern size as WIDTHxHEIGHT.
    #[arg(long, default_value = "1280x720", value_parser = parse_size)]
    size: (u32, u32),
}

/// Parse a `WIDTHxHEIGHT` argument, e.g. `1280x720`.
fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width = w.parse().map_err(|_| format!("bad width '{w}'"))?;
    let height = h.parse().map_err(|_| format!("bad height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err("size must be non-zero".to_string());
    }
    Ok((width, height))
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Init tracing.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("beam-cast v{}", env!("CARGO_PKG_VERSION"));
    info!("target: {}", cli.target);
    info!("frame rate: {} fps", cli.fps);
    info!("JPEG quality: {}", cli.quality);
    info!("pattern size: {}x{}", cli.size.0, cli.size.1);

    let mut config = BroadcastConfig::new(cli.target);
    config.fps = cli.fps;
    config.quality = cli.quality;
    config.connect_timeout = Duration::from_secs(cli.connect_timeout);

    let (width, height) = cli.size;
    let session = BroadcastSession::start(config, Box::new(TestPatternSource::new(width, height)))?;

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received — shutting down");
                session.stop();
            }
            state = session.wait_terminal() => {
                if let SessionState::Failed { reason } = state {
                    error!("stream failed: {reason}");
                    return Err(reason.into());
                }
                break;
            }
            _ = ticker.tick() => {
                let stats = session.stats();
                if stats.frames > 0 {
                    info!(
                        "streamed {} frames ({} bytes, {:.1} fps)",
                        stats.frames, stats.bytes, stats.fps
                    );
                }
            }
        }
    }

    let final_state = session.join().await;
    info!("broadcast finished: {final_state}");

    Ok(())
}
