//! The per-session PEX state machine.

use std::time::Instant;

use rand::Rng;

use super::config::PexConfig;
use super::security::{MisbehaviorScore, RateDecision, RequestRateLimiter};
use super::types::{PexEvent, PexMessage, PexState};
use crate::domain::{random_jitter, NetAddress, PeerId, ProtocolViolation};

/// PEX state of one session.
///
/// Owned by the session task; nothing else touches it.
#[derive(Debug)]
pub struct PexProtocol {
    peer: PeerId,
    config: PexConfig,
    state: PexState,
    next_request_at: Option<Instant>,
    limiter: RequestRateLimiter,
    misbehavior: MisbehaviorScore,
    exchange_completed: bool,
}

impl PexProtocol {
    /// Start a session at `now`; the first request is due within the
    /// initial jitter.
    pub fn new<R: Rng>(peer: PeerId, config: PexConfig, now: Instant, rng: &mut R) -> Self {
        let first = now + random_jitter(rng, config.initial_request_jitter);
        let limiter = RequestRateLimiter::new(config.min_request_interval);
        Self {
            peer,
            config,
            state: PexState::Idle,
            next_request_at: Some(first),
            limiter,
            misbehavior: MisbehaviorScore::new(),
            exchange_completed: false,
        }
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn state(&self) -> PexState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == PexState::Closed
    }

    /// Whether at least one exchange finished on this session
    pub fn exchange_completed(&self) -> bool {
        self.exchange_completed
    }

    pub fn misbehavior_score(&self) -> u32 {
        self.misbehavior.score()
    }

    /// When the session must call [`poll`](Self::poll) next.
    pub fn next_wakeup(&self) -> Option<Instant> {
        match self.state {
            PexState::Idle => self.next_request_at,
            PexState::AwaitingResponse { deadline } => Some(deadline),
            PexState::Closed => None,
        }
    }

    /// Advance timers.
    ///
    /// Returns a request to send when one is due, or the timeout violation
    /// when our outstanding request went unanswered.
    pub fn poll(&mut self, now: Instant) -> Result<Option<PexMessage>, ProtocolViolation> {
        match self.state {
            PexState::AwaitingResponse { deadline } if now >= deadline => {
                self.state = PexState::Closed;
                Err(ProtocolViolation::ResponseTimeout(self.config.response_timeout))
            }
            PexState::Idle if self.next_request_at.is_some_and(|at| now >= at) => {
                Ok(self.send_request(now))
            }
            _ => Ok(None),
        }
    }

    /// Issue a request right away if none is outstanding.
    pub fn send_request(&mut self, now: Instant) -> Option<PexMessage> {
        if self.state != PexState::Idle {
            return None;
        }
        self.state = PexState::AwaitingResponse {
            deadline: now + self.config.response_timeout,
        };
        self.next_request_at = None;
        Some(PexMessage::Request)
    }

    /// Handle a message from the remote.
    ///
    /// `Ok(None)` once the session is closed.
    pub fn on_message<R: Rng>(
        &mut self,
        message: PexMessage,
        now: Instant,
        rng: &mut R,
    ) -> Result<Option<PexEvent>, ProtocolViolation> {
        if self.is_closed() {
            return Ok(None);
        }
        match message {
            PexMessage::Request => self.on_request(now).map(Some),
            PexMessage::Addrs(addrs) => self.on_addrs(addrs, now, rng).map(Some),
        }
    }

    fn on_request(&mut self, now: Instant) -> Result<PexEvent, ProtocolViolation> {
        match self.limiter.check(now) {
            RateDecision::Accept => Ok(PexEvent::Respond {
                exchange_completed: self.complete_exchange(),
            }),
            RateDecision::Ignore { ignored } if ignored > self.config.max_ignored_requests => {
                self.state = PexState::Closed;
                Err(ProtocolViolation::RequestFlood { ignored })
            }
            RateDecision::Ignore { ignored } => Ok(PexEvent::RequestIgnored { ignored }),
        }
    }

    fn on_addrs<R: Rng>(
        &mut self,
        addrs: Vec<NetAddress>,
        now: Instant,
        rng: &mut R,
    ) -> Result<PexEvent, ProtocolViolation> {
        if !matches!(self.state, PexState::AwaitingResponse { .. }) {
            let score = self.misbehavior.record();
            if self.misbehavior.exceeds(self.config.max_misbehavior) {
                self.state = PexState::Closed;
                return Err(ProtocolViolation::Misbehaving {
                    score,
                    max: self.config.max_misbehavior,
                });
            }
            return Ok(PexEvent::UnsolicitedDiscarded {
                count: addrs.len(),
                score,
            });
        }

        if addrs.len() > self.config.max_addresses_per_response {
            self.state = PexState::Closed;
            return Err(ProtocolViolation::OversizedResponse {
                count: addrs.len(),
                max: self.config.max_addresses_per_response,
            });
        }

        self.state = PexState::Idle;
        self.next_request_at =
            Some(now + self.config.request_interval + random_jitter(rng, self.config.request_jitter));
        Ok(PexEvent::Learned {
            addrs,
            exchange_completed: self.complete_exchange(),
        })
    }

    /// Mark an exchange done; `true` only the first time.
    fn complete_exchange(&mut self) -> bool {
        let first = !self.exchange_completed;
        self.exchange_completed = true;
        first
    }
}
