//! Abuse accounting for a PEX session.
//!
//! SECURITY-CRITICAL: these counters decide when a peer is cut off.

use std::time::{Duration, Instant};

/// Count of unsolicited responses from one peer
///
/// # Security
/// An unsolicited response is an attempt to push addresses into our book
/// without being asked, the cheapest way to poison it.
#[derive(Debug, Clone, Default)]
pub struct MisbehaviorScore {
    score: u32,
}

impl MisbehaviorScore {
    /// Start at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current score
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Count one offence and return the new score
    pub fn record(&mut self) -> u32 {
        self.score = self.score.saturating_add(1);
        self.score
    }

    /// Whether the score is past `max`
    pub fn exceeds(&self, max: u32) -> bool {
        self.score > max
    }
}

/// Decision for an inbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Answer it
    Accept,
    /// Drop it silently
    Ignore {
        /// Requests ignored so far on this session
        ignored: u32,
    },
}

/// Minimum-interval limiter for inbound requests.
///
/// Early requests are ignored rather than punished outright, which
/// tolerates clock skew on the remote side. Ignored requests accumulate
/// for the life of the session.
#[derive(Debug, Clone)]
pub struct RequestRateLimiter {
    min_interval: Duration,
    last_accepted: Option<Instant>,
    ignored: u32,
}

impl RequestRateLimiter {
    /// Create a limiter
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: None,
            ignored: 0,
        }
    }

    /// Requests ignored so far
    pub fn ignored(&self) -> u32 {
        self.ignored
    }

    /// Judge a request arriving at `now`
    pub fn check(&mut self, now: Instant) -> RateDecision {
        match self.last_accepted {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => {
                self.ignored = self.ignored.saturating_add(1);
                RateDecision::Ignore {
                    ignored: self.ignored,
                }
            }
            _ => {
                self.last_accepted = Some(now);
                RateDecision::Accept
            }
        }
    }
}
