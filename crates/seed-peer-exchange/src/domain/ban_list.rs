//! # Banned Peers
//!
//! Peers disconnected for a protocol violation are refused, inbound and
//! outbound, until their ban runs out. Bans are kept in memory only; a
//! restart forgives everyone.

use std::collections::HashMap;

use crate::domain::{PeerId, ProtocolViolation, Timestamp};

/// One active ban.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanEntry {
    /// First second the peer is welcome again
    pub banned_until: Timestamp,
    /// Violation that earned the ban
    pub reason: String,
}

/// Bans keyed by peer id, expiring on the wall clock.
#[derive(Debug, Clone, Default)]
pub struct BannedPeers {
    entries: HashMap<PeerId, BanEntry>,
}

impl BannedPeers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ban `peer` until `until`. A longer existing ban is kept.
    pub fn ban(&mut self, peer: PeerId, until: Timestamp, violation: &ProtocolViolation) {
        let entry = self.entries.entry(peer).or_insert_with(|| BanEntry {
            banned_until: until,
            reason: violation.to_string(),
        });
        if until >= entry.banned_until {
            entry.banned_until = until;
            entry.reason = violation.to_string();
        }
    }

    /// Whether `peer` is still banned at `now`.
    pub fn is_banned(&self, peer: &PeerId, now: Timestamp) -> bool {
        self.entries
            .get(peer)
            .is_some_and(|entry| entry.banned_until > now)
    }

    pub fn get(&self, peer: &PeerId) -> Option<&BanEntry> {
        self.entries.get(peer)
    }

    /// Ids banned at `now`.
    pub fn active(&self, now: Timestamp) -> impl Iterator<Item = &PeerId> + '_ {
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.banned_until > now)
            .map(|(peer, _)| peer)
    }

    /// Forget expired bans. Returns how many were dropped.
    pub fn gc_expired(&mut self, now: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.banned_until > now);
        before - self.entries.len()
    }

    /// Active bans at `now`.
    pub fn count(&self, now: Timestamp) -> usize {
        self.active(now).count()
    }
}
