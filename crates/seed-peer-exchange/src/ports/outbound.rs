//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the switch requires from its host. Every one is object safe
//! so the switch can hold them as `Arc<dyn _>`.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::domain::{
    AddrBookSnapshot, ConnectionDirection, HandshakeError, NodeInfo, PersistenceError, Timestamp,
};

/// A byte stream to a remote node.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Connection for T {}

/// Owned, type-erased connection.
pub type BoxedConnection = Box<dyn Connection>;

/// Abstract interface for wall-clock time.
///
/// Used for the timestamps stored in the address book. Timers use the
/// runtime's monotonic clock instead.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Durable storage for the address book.
///
/// Calls block; the switch runs them on the blocking pool.
pub trait AddrBookStore: Send + Sync {
    /// Read the last saved snapshot. `Ok(None)` when nothing was saved yet.
    fn load(&self) -> Result<Option<AddrBookSnapshot>, PersistenceError>;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &AddrBookSnapshot) -> Result<(), PersistenceError>;
}

/// Opens outbound transport connections.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Connect to `addr`. Timeouts are applied by the caller.
    async fn dial(&self, addr: SocketAddr) -> io::Result<BoxedConnection>;
}

/// Accepts inbound transport connections.
#[async_trait]
pub trait TransportListener: Send + Sync {
    /// Wait for the next connection.
    async fn accept(&self) -> io::Result<(BoxedConnection, SocketAddr)>;

    /// Address the listener is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// A completed handshake.
pub struct HandshakeOutcome {
    /// What the remote declared about itself.
    pub peer: NodeInfo,
    /// The connection, ready for PEX frames.
    pub conn: BoxedConnection,
}

impl std::fmt::Debug for HandshakeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeOutcome")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

/// Upgrades a raw connection into an authenticated one.
///
/// The switch treats the exchange as opaque: it only needs the remote's
/// [`NodeInfo`] and a connection to speak PEX over. Timeouts are applied by
/// the caller.
#[async_trait]
pub trait Handshaker: Send + Sync {
    /// Run the handshake on `conn`.
    async fn handshake(
        &self,
        conn: BoxedConnection,
        direction: ConnectionDirection,
    ) -> Result<HandshakeOutcome, HandshakeError>;
}
