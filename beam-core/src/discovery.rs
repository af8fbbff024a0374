//! Best-effort subnet discovery for candidate producers.
//!
//! Probes every host of a /24 for an open frame port and returns the
//! ones that accept a TCP connection. The /24 prefix comes from the
//! kernel's routing choice for a throwaway UDP socket; deriving it
//! never puts a packet on the wire.
//!
//! The scan is best-effort by contract: an undeterminable local
//! address falls back to a default prefix, probe failures of any kind
//! only shrink the result, and the loopback address is always included
//! as a last-resort candidate. A scan never returns an error.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, info};

// ── Constants ────────────────────────────────────────────────────

/// Prefix probed when the local address cannot be determined.
const FALLBACK_PREFIX: [u8; 3] = [192, 168, 1];

/// Route-resolution target for local-address derivation. No datagram
/// is ever sent to it.
const ROUTE_PROBE_ADDR: &str = "8.8.8.8:80";

/// Host suffixes probed within the /24.
const HOST_RANGE: std::ops::RangeInclusive<u8> = 1..=254;

/// Default per-host connect deadline.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(300);

/// Default number of probes in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 64;

// ── ScanConfig ───────────────────────────────────────────────────

/// Tuning knobs for [`scan_with`].
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Port to probe on every host.
    pub port: u16,

    /// Per-host connect deadline.
    pub probe_timeout: Duration,

    /// How many probes run concurrently. Results keep subnet order
    /// regardless.
    pub concurrency: usize,

    /// Probe the /24 containing this address instead of deriving one
    /// from the local routing table.
    pub subnet_hint: Option<Ipv4Addr>,
}

impl ScanConfig {
    /// Defaults for everything but the port.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            subnet_hint: None,
        }
    }
}

// ── Scan ─────────────────────────────────────────────────────────

/// Scan the local /24 for hosts accepting connections on `port`.
///
/// Hosts come back in subnet order (suffix 1 through 254) with the
/// loopback address appended if the scan did not already find it.
/// Dropping the returned future abandons in-flight probes.
pub async fn scan(port: u16) -> Vec<IpAddr> {
    scan_with(ScanConfig::new(port)).await
}

/// [`scan`] with explicit tuning.
pub async fn scan_with(config: ScanConfig) -> Vec<IpAddr> {
    let base = match config.subnet_hint {
        Some(addr) => addr,
        None => local_ipv4().await.unwrap_or_else(|| {
            debug!("local address unavailable, using fallback prefix");
            let [a, b, c] = FALLBACK_PREFIX;
            Ipv4Addr::new(a, b, c, 0)
        }),
    };
    let [a, b, c, _] = base.octets();
    debug!(prefix = %format!("{a}.{b}.{c}.0/24"), port = config.port, "scanning");

    let port = config.port;
    let probe_timeout = config.probe_timeout;
    let mut found: Vec<IpAddr> = stream::iter(HOST_RANGE)
        .map(|suffix| {
            let host = Ipv4Addr::new(a, b, c, suffix);
            async move { probe(host, port, probe_timeout).await.then_some(IpAddr::V4(host)) }
        })
        .buffered(config.concurrency.max(1))
        .filter_map(|hit| async move { hit })
        .collect()
        .await;

    let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);
    if !found.contains(&loopback) {
        found.push(loopback);
    }

    info!(port = config.port, hosts = found.len(), "scan finished");
    found
}

/// One connect attempt. Any accepted connection counts, even if the
/// peer hangs up immediately afterwards.
async fn probe(host: Ipv4Addr, port: u16, deadline: Duration) -> bool {
    let addr = SocketAddr::from((host, port));
    matches!(timeout(deadline, TcpStream::connect(addr)).await, Ok(Ok(_)))
}

/// The IPv4 address the kernel would source external traffic from.
///
/// "Connecting" a UDP socket only resolves a route and picks a local
/// address; nothing is transmitted.
async fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
    socket.connect(ROUTE_PROBE_ADDR).await.ok()?;
    match socket.local_addr().ok()? {
        SocketAddr::V4(v4) => Some(*v4.ip()),
        SocketAddr::V6(_) => None,
    }
}

// ── Tests ────────────────────────────────────────────────────────
