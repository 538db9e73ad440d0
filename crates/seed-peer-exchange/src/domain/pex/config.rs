//! PEX protocol configuration.

use std::time::Duration;

/// Timers and thresholds of one PEX session
#[derive(Debug, Clone)]
pub struct PexConfig {
    /// Upper bound of the random delay before the first request
    pub initial_request_jitter: Duration,
    /// Steady delay between answered requests
    pub request_interval: Duration,
    /// Upper bound of the random delay added to `request_interval`
    pub request_jitter: Duration,
    /// How long the remote has to answer our request
    pub response_timeout: Duration,
    /// Inbound requests closer together than this are ignored
    pub min_request_interval: Duration,
    /// Ignored requests tolerated before disconnecting
    pub max_ignored_requests: u32,
    /// Unsolicited responses tolerated before disconnecting
    pub max_misbehavior: u32,
    /// Most addresses accepted in one response
    pub max_addresses_per_response: usize,
}

impl Default for PexConfig {
    fn default() -> Self {
        Self {
            initial_request_jitter: Duration::from_secs(3),
            request_interval: Duration::from_secs(30),
            request_jitter: Duration::from_secs(5),
            response_timeout: Duration::from_secs(20),
            min_request_interval: Duration::from_secs(10),
            max_ignored_requests: 5,
            max_misbehavior: 3,
            max_addresses_per_response: 250,
        }
    }
}

impl PexConfig {
    /// Testing config with no jitter and short timers
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        Self {
            initial_request_jitter: Duration::ZERO,
            request_interval: Duration::from_secs(10),
            request_jitter: Duration::ZERO,
            response_timeout: Duration::from_secs(5),
            min_request_interval: Duration::from_secs(2),
            max_ignored_requests: 2,
            max_misbehavior: 2,
            max_addresses_per_response: 4,
        }
    }
}
