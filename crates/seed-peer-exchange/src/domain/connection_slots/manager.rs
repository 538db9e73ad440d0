//! Connection slots manager implementation.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use super::config::ConnectionSlotsConfig;
use super::security::HostIndex;
use super::types::{ConnectionStats, PeerSession, Reservation};
use crate::domain::{AcceptError, ConnectionDirection, DialError, PeerId};

/// Session table with slot reservation
///
/// # Invariants
///
/// 1. At most one session per peer id
/// 2. `inbound_count() <= max_inbound` and `outbound_count() <= max_outbound`
/// 3. Without `allow_duplicate_ip`, at most one session or pending inbound
///    handshake per host
/// 4. Nothing is reserved or registered after `close_and_drain`
#[derive(Debug)]
pub struct ConnectionSlots<H> {
    sessions: HashMap<PeerId, PeerSession<H>>,
    hosts: HostIndex,
    pending_inbound: usize,
    pending_outbound: HashSet<PeerId>,
    closed: bool,
    config: ConnectionSlotsConfig,
}

impl<H> ConnectionSlots<H> {
    /// Create an empty table
    pub fn new(config: ConnectionSlotsConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            hosts: HostIndex::new(),
            pending_inbound: 0,
            pending_outbound: HashSet::new(),
            closed: false,
            config,
        }
    }

    pub fn config(&self) -> &ConnectionSlotsConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Inbound sessions plus in-flight inbound handshakes
    pub fn inbound_count(&self) -> usize {
        self.count(ConnectionDirection::Inbound) + self.pending_inbound
    }

    /// Outbound sessions plus in-flight dials
    pub fn outbound_count(&self) -> usize {
        self.count(ConnectionDirection::Outbound) + self.pending_outbound.len()
    }

    /// Check if a dial could reserve a slot right now
    pub fn has_outbound_slot(&self) -> bool {
        !self.closed && self.outbound_count() < self.config.max_outbound
    }

    /// Reserve a slot for an inbound handshake from `ip`
    ///
    /// # Security
    /// Runs before the handshake, so a host cannot hold more than its
    /// share of slots with half-open connections.
    pub fn try_reserve_inbound(&mut self, ip: IpAddr) -> Result<Reservation, AcceptError> {
        if self.closed {
            return Err(AcceptError::ShuttingDown);
        }
        let current = self.inbound_count();
        if current >= self.config.max_inbound {
            return Err(AcceptError::CapacityExceeded {
                current,
                max: self.config.max_inbound,
            });
        }
        if !self.config.allow_duplicate_ip && self.hosts.contains(&ip) {
            return Err(AcceptError::DuplicateIp(ip));
        }
        self.pending_inbound += 1;
        self.hosts.add(&ip);
        Ok(Reservation::Inbound { ip })
    }

    /// Reserve a slot for dialing `peer`
    pub fn try_reserve_outbound(&mut self, peer: &PeerId) -> Result<Reservation, DialError> {
        if self.closed {
            return Err(DialError::ShuttingDown);
        }
        if self.is_connected(peer) || self.pending_outbound.contains(peer) {
            return Err(DialError::AlreadyConnected(peer.clone()));
        }
        if self.outbound_count() >= self.config.max_outbound {
            return Err(DialError::NoSlot);
        }
        self.pending_outbound.insert(peer.clone());
        Ok(Reservation::Outbound { peer: peer.clone() })
    }

    /// Give back a slot without creating a session
    pub fn release(&mut self, reservation: Reservation) {
        match reservation {
            Reservation::Inbound { ip } => {
                self.pending_inbound = self.pending_inbound.saturating_sub(1);
                self.hosts.remove(&ip);
            }
            Reservation::Outbound { peer } => {
                self.pending_outbound.remove(&peer);
            }
        }
    }

    /// Turn a reservation into a live session.
    ///
    /// The reservation is consumed whatever the outcome. The session's
    /// direction is taken from the reservation.
    pub fn register(
        &mut self,
        reservation: Reservation,
        mut session: PeerSession<H>,
    ) -> Result<(), AcceptError> {
        session.direction = reservation.direction();
        self.release(reservation);

        if self.closed {
            return Err(AcceptError::ShuttingDown);
        }
        if self.sessions.contains_key(&session.peer_id) {
            return Err(AcceptError::DuplicatePeer(session.peer_id));
        }
        let ip = session.remote_addr.ip();
        if !self.config.allow_duplicate_ip && self.hosts.contains(&ip) {
            return Err(AcceptError::DuplicateIp(ip));
        }

        self.hosts.add(&ip);
        self.sessions.insert(session.peer_id.clone(), session);
        Ok(())
    }

    /// Remove the session of `peer` if it is still `session_id`
    pub fn remove(&mut self, peer: &PeerId, session_id: u64) -> Option<PeerSession<H>> {
        if self.sessions.get(peer)?.session_id != session_id {
            return None;
        }
        let session = self.sessions.remove(peer)?;
        self.hosts.remove(&session.remote_addr.ip());
        Some(session)
    }

    /// Refuse everything from now on and hand back every live session.
    ///
    /// Idempotent; later calls return nothing.
    pub fn close_and_drain(&mut self) -> Vec<PeerSession<H>> {
        self.closed = true;
        let drained: Vec<PeerSession<H>> = self.sessions.drain().map(|(_, s)| s).collect();
        for session in &drained {
            self.hosts.remove(&session.remote_addr.ip());
        }
        drained
    }

    pub fn get(&self, peer: &PeerId) -> Option<&PeerSession<H>> {
        self.sessions.get(peer)
    }

    /// Check if a peer has a live session
    pub fn is_connected(&self, peer: &PeerId) -> bool {
        self.sessions.contains_key(peer)
    }

    /// Check if a dial to `peer` is in flight
    pub fn is_dialing(&self, peer: &PeerId) -> bool {
        self.pending_outbound.contains(peer)
    }

    /// Ids with a live session or a dial in flight
    pub fn busy_peers(&self) -> HashSet<PeerId> {
        self.sessions
            .keys()
            .chain(self.pending_outbound.iter())
            .cloned()
            .collect()
    }

    /// Check if `ip` holds a session or a pending inbound handshake
    pub fn has_host(&self, ip: &IpAddr) -> bool {
        self.hosts.contains(ip)
    }

    /// Ids of every live session
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.sessions.keys().cloned().collect()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &PeerSession<H>> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Get statistics
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            inbound: self.count(ConnectionDirection::Inbound),
            outbound: self.count(ConnectionDirection::Outbound),
            pending_inbound: self.pending_inbound,
            pending_outbound: self.pending_outbound.len(),
            max_inbound: self.config.max_inbound,
            max_outbound: self.config.max_outbound,
        }
    }

    fn count(&self, direction: ConnectionDirection) -> usize {
        self.sessions
            .values()
            .filter(|s| s.direction == direction)
            .count()
    }
}
