//! Connection slots types.

use std::net::{IpAddr, SocketAddr};

use crate::domain::{ConnectionDirection, NetAddress, PeerId, Timestamp};

/// A live session as the switch tracks it
#[derive(Debug)]
pub struct PeerSession<H> {
    /// Id the remote proved during the handshake
    pub peer_id: PeerId,
    /// Unique per process; tells apart consecutive sessions with one peer
    pub session_id: u64,
    /// Transport-level remote endpoint
    pub remote_addr: SocketAddr,
    /// Address the remote advertises for dialing
    pub listen_addr: NetAddress,
    /// Who opened the connection
    pub direction: ConnectionDirection,
    /// When the session was registered
    pub connected_at: Timestamp,
    /// Control handle for the session task
    pub handle: H,
}

/// A held slot, returned by a successful reservation.
///
/// Must be handed back to the table through `register` or `release`.
#[must_use = "a reservation holds a slot until registered or released"]
#[derive(Debug, PartialEq, Eq)]
pub enum Reservation {
    /// Inbound handshake from `ip`
    Inbound {
        /// Remote host
        ip: IpAddr,
    },
    /// Outbound dial to `peer`
    Outbound {
        /// Peer being dialed
        peer: PeerId,
    },
}

impl Reservation {
    /// Direction of the session this slot is for
    pub fn direction(&self) -> ConnectionDirection {
        match self {
            Reservation::Inbound { .. } => ConnectionDirection::Inbound,
            Reservation::Outbound { .. } => ConnectionDirection::Outbound,
        }
    }
}

/// Connection statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Established inbound sessions.
    pub inbound: usize,
    /// Established outbound sessions.
    pub outbound: usize,
    /// Inbound handshakes in flight.
    pub pending_inbound: usize,
    /// Outbound dials in flight.
    pub pending_outbound: usize,
    /// Configured inbound limit.
    pub max_inbound: usize,
    /// Configured outbound limit.
    pub max_outbound: usize,
}
