//! # Driving Ports (Inbound API)
//!
//! The connection manager as the binary sees it.

use std::net::SocketAddr;

use async_trait::async_trait;

use super::outbound::BoxedConnection;
use crate::domain::{AcceptError, AddressBookStats, ConnectionStats, PeerId};

/// Point-in-time view of the switch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchStats {
    /// Session table counts.
    pub connections: ConnectionStats,
    /// Address book counts.
    pub address_book: AddressBookStats,
    /// Peers currently backing off.
    pub backing_off: usize,
    /// Whether shutdown has begun.
    pub shutting_down: bool,
}

/// Primary API of the connection manager.
///
/// # Example
///
/// ```rust,ignore
/// use seed_peer_exchange::ports::ConnectionManagerApi;
///
/// async fn drain<T: ConnectionManagerApi>(switch: &T) {
///     switch.shutdown().await;
///     assert!(switch.stats().shutting_down);
/// }
/// ```
#[async_trait]
pub trait ConnectionManagerApi: Send + Sync {
    /// Admit an inbound connection from `remote`.
    ///
    /// Returns the id of the registered peer. Rejections never touch the
    /// address book.
    async fn accept(
        &self,
        conn: BoxedConnection,
        remote: SocketAddr,
    ) -> Result<PeerId, AcceptError>;

    /// Tear everything down and flush the address book.
    ///
    /// Idempotent. Concurrent callers all return once the single teardown
    /// finished.
    async fn shutdown(&self);

    /// Current counts.
    fn stats(&self) -> SwitchStats;

    /// Ids of every live session.
    fn connected_peers(&self) -> Vec<PeerId>;
}
