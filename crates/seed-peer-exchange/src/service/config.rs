//! Switch configuration.

use std::time::Duration;

use crate::adapters::DEFAULT_MAX_FRAME_SIZE;
use crate::domain::{ConnectionSlotsConfig, NetAddress, PexConfig};

/// Connection manager settings
#[derive(Debug, Clone)]
pub struct SwitchConfig {
    /// Caps and duplicate-IP policy
    pub slots: ConnectionSlotsConfig,
    /// Per-session PEX timers and thresholds
    pub pex: PexConfig,
    /// Disconnect peers once an exchange completed
    pub seed_mode: bool,
    /// Dialed while the address book is empty
    pub seeds: Vec<NetAddress>,
    /// Period of the dial loop
    pub dial_interval: Duration,
    /// Most dials started per tick
    pub max_dials_per_tick: usize,
    /// TCP connect limit
    pub dial_timeout: Duration,
    /// Handshake limit, both directions
    pub handshake_timeout: Duration,
    /// Delay between a completed exchange and the churn disconnect
    pub churn_grace: Duration,
    /// Upper bound of the random delay added to `churn_grace`
    pub churn_jitter: Duration,
    /// Back-off after the first failed dial
    pub backoff_base: Duration,
    /// Back-off ceiling
    pub backoff_max: Duration,
    /// How long a peer disconnected for a protocol violation is refused
    pub ban_duration: Duration,
    /// Period of address book persistence
    pub save_interval: Duration,
    /// How long shutdown waits for tasks before aborting them
    pub shutdown_grace: Duration,
    /// Limit for writing one frame
    pub write_timeout: Duration,
    /// Largest frame accepted or sent
    pub max_frame_size: usize,
    /// Capacity of the session-event queue
    pub event_queue_size: usize,
    /// Capacity of each session's command queue
    pub command_queue_size: usize,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            slots: ConnectionSlotsConfig::default(),
            pex: PexConfig::default(),
            seed_mode: true,
            seeds: Vec::new(),
            dial_interval: Duration::from_secs(5),
            max_dials_per_tick: 10,
            dial_timeout: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(20),
            churn_grace: Duration::from_secs(3),
            churn_jitter: Duration::from_secs(2),
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(600),
            ban_duration: Duration::from_secs(24 * 60 * 60),
            save_interval: Duration::from_secs(120),
            shutdown_grace: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            event_queue_size: 1024,
            command_queue_size: 8,
        }
    }
}

impl SwitchConfig {
    /// Testing config: small caps, no jitter, short timers
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        Self {
            slots: ConnectionSlotsConfig {
                max_inbound: 4,
                max_outbound: 4,
                allow_duplicate_ip: true,
            },
            pex: PexConfig {
                initial_request_jitter: Duration::ZERO,
                request_interval: Duration::from_secs(10),
                request_jitter: Duration::ZERO,
                response_timeout: Duration::from_secs(5),
                min_request_interval: Duration::from_secs(2),
                max_ignored_requests: 2,
                max_misbehavior: 2,
                max_addresses_per_response: 16,
            },
            seed_mode: true,
            seeds: Vec::new(),
            dial_interval: Duration::from_secs(1),
            max_dials_per_tick: 4,
            dial_timeout: Duration::from_secs(1),
            handshake_timeout: Duration::from_secs(2),
            churn_grace: Duration::from_secs(3),
            churn_jitter: Duration::ZERO,
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(30),
            ban_duration: Duration::from_secs(3600),
            save_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            event_queue_size: 64,
            command_queue_size: 4,
        }
    }
}
