//! Connection slots configuration.

/// Connection limits
#[derive(Debug, Clone)]
pub struct ConnectionSlotsConfig {
    /// Maximum inbound sessions, in-flight handshakes included
    pub max_inbound: usize,
    /// Maximum outbound sessions, in-flight dials included
    pub max_outbound: usize,
    /// Allow several sessions from one host
    pub allow_duplicate_ip: bool,
}

impl Default for ConnectionSlotsConfig {
    fn default() -> Self {
        Self {
            max_inbound: 1000,
            max_outbound: 1000,
            allow_duplicate_ip: true,
        }
    }
}

impl ConnectionSlotsConfig {
    /// Testing config with smaller limits
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        Self {
            max_inbound: 2,
            max_outbound: 2,
            allow_duplicate_ip: false,
        }
    }
}
