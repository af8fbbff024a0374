//! Deadline-bounded TCP connect shared by producer and consumer.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::BeamError;

/// Default deadline for establishing a session's TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Dial `target` with a hard deadline.
///
/// The three connect outcomes callers report differently each get
/// their own error: deadline elapsed ([`BeamError::ConnectTimeout`]),
/// peer actively refused ([`BeamError::ConnectionRefused`]), anything
/// else ([`BeamError::Connection`]).
pub async fn connect_with_timeout(
    target: SocketAddr,
    deadline: Duration,
) -> Result<TcpStream, BeamError> {
    match timeout(deadline, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
            Err(BeamError::ConnectionRefused(target))
        }
        Ok(Err(e)) => Err(BeamError::Connection(e)),
        Err(_elapsed) => Err(BeamError::ConnectTimeout(deadline)),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_live_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stream = connect_with_timeout(addr, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(stream.peer_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn refused_port_maps_to_connection_refused() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = connect_with_timeout(addr, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BeamError::ConnectionRefused(a) if a == addr));
    }
}
