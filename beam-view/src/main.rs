//! beam-view — entry point.
//!
//! ```text
//! beam-view listen                    Wait for a producer on 0.0.0.0:5000
//! beam-view listen --port 6000        Listen on another port
//! beam-view connect 192.168.1.9:5000  Connect out to a producer
//! beam-view scan                      Probe the local /24 for producers
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use beam_core::{
    DEFAULT_PORT, DecodePolicy, SessionState, ViewerConfig, ViewerFrame, ViewerMode, ViewerSession,
};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "beam-view", about = "Receive and decode a beam frame stream")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wait for one producer to connect in.
    Listen {
        /// Address to bind.
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
        bind: IpAddr,

        /// Port to listen on.
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Largest frame to keep, as WIDTHxHEIGHT.
        #[arg(long, default_value = "990x650", value_parser = parse_size)]
        bound: (u32, u32),

        /// Drop undecodable frames instead of failing the session.
        #[arg(long)]
        skip_bad_frames: bool,
    },

    /// Connect out to a producer.
    Connect {
        /// Producer address, e.g. 192.168.1.9:5000.
        target: SocketAddr,

        /// Largest frame to keep, as WIDTHxHEIGHT.
        #[arg(long, default_value = "990x650", value_parser = parse_size)]
        bound: (u32, u32),

        /// Drop undecodable frames instead of failing the session.
        #[arg(long)]
        skip_bad_frames: bool,
    },

    /// Probe the local /24 subnet for listening producers.
    Scan {
        /// Port to probe on every host.
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

/// Parse a `WIDTHxHEIGHT` argument, e.g. `990x650`.
fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width = w.parse().map_err(|_| format!("bad width '{w}'"))?;
    let height = h.parse().map_err(|_| format!("bad height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err("bound must be non-zero".to_string());
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

    info!("beam-view v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Listen {
            bind,
            port,
            bound,
            skip_bad_frames,
        } => {
            let mode = ViewerMode::Listen(SocketAddr::new(bind, port));
            run_viewer(mode, bound, skip_bad_frames).await
        }
        Command::Connect {
            target,
            bound,
            skip_bad_frames,
        } => run_viewer(ViewerMode::Connect(target), bound, skip_bad_frames).await,
        Command::Scan { port } => {
            info!("scanning local /24 for port {port}");
            let hosts = beam_core::scan(port).await;
            for host in &hosts {
                println!("{host}:{port}");
            }
            info!("{} host(s) listening on port {}", hosts.len(), port);
            Ok(())
        }
    }
}

async fn run_viewer(
    mode: ViewerMode,
    bound: (u32, u32),
    skip_bad_frames: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ViewerConfig::new(mode);
    config.max_display = Some(bound);
    if skip_bad_frames {
        config.decode_policy = DecodePolicy::Skip;
    }

    let viewer = ViewerSession::start(config, |frame: ViewerFrame| {
        debug!("frame {}x{}", frame.image.width(), frame.image.height());
    })?;

    if let Some(addr) = viewer.local_addr().await {
        info!("local address: {addr}");
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received — shutting down");
                viewer.stop();
            }
            state = viewer.wait_terminal() => {
                if let SessionState::Failed { reason } = state {
                    error!("stream failed: {reason}");
                    return Err(reason.into());
                }
                break;
            }
            _ = ticker.tick() => {
                let stats = viewer.stats();
                if stats.frames > 0 {
                    info!(
                        "received {} frames ({} bytes, {:.1} fps)",
                        stats.frames, stats.bytes, stats.fps
                    );
                }
            }
        }
    }

    let final_state = viewer.join().await;
    info!("viewer finished: {final_state}");

    Ok(())
}
