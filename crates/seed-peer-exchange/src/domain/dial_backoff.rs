//! # Dial Back-off
//!
//! Per-peer exponential back-off for outbound dials:
//! `min(base * 2^(failures - 1), max)` after the n-th consecutive failure.
//! A success forgets the peer.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::domain::PeerId;

/// Back-off state of one peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffEntry {
    /// Consecutive failed dials
    pub failures: u32,
    /// Earliest instant of the next dial
    pub retry_at: Instant,
}

/// Back-off table for every peer that failed recently
#[derive(Debug, Clone)]
pub struct DialBackoff {
    base: Duration,
    max: Duration,
    entries: HashMap<PeerId, BackoffEntry>,
}

impl DialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            entries: HashMap::new(),
        }
    }

    /// Delay after the `failures`-th consecutive failure
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.checked_pow(failures - 1).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Record a failure at `now` and return the delay before the next try
    pub fn record_failure(&mut self, peer: &PeerId, now: Instant) -> Duration {
        let failures = self
            .entries
            .get(peer)
            .map_or(1, |e| e.failures.saturating_add(1));
        let delay = self.delay_for(failures);
        self.entries.insert(
            peer.clone(),
            BackoffEntry {
                failures,
                retry_at: now + delay,
            },
        );
        delay
    }

    pub fn record_success(&mut self, peer: &PeerId) {
        self.entries.remove(peer);
    }

    /// Whether `peer` may be dialed at `now`
    pub fn is_ready(&self, peer: &PeerId, now: Instant) -> bool {
        self.entries.get(peer).map_or(true, |e| now >= e.retry_at)
    }

    /// Time left before `peer` may be dialed, `None` if not backing off
    pub fn remaining(&self, peer: &PeerId, now: Instant) -> Option<Duration> {
        self.entries
            .get(peer)
            .map(|e| e.retry_at.saturating_duration_since(now))
            .filter(|d| !d.is_zero())
    }

    /// Peers that may not be dialed at `now`
    pub fn blocked_peers(&self, now: Instant) -> HashSet<PeerId> {
        self.entries
            .iter()
            .filter(|(_, e)| now < e.retry_at)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn get(&self, peer: &PeerId) -> Option<&BackoffEntry> {
        self.entries.get(peer)
    }

    /// Forget peers whose back-off ran out and who sit idle long enough
    /// that `max` has passed since `retry_at`
    pub fn prune(&mut self, now: Instant) {
        let max = self.max;
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.retry_at) < max);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
