//! Per-host accounting for the duplicate-IP policy.
//!
//! SECURITY-CRITICAL: one host holding many slots is the cheapest way to
//! monopolize a seed.

use std::collections::HashMap;
use std::net::IpAddr;

/// Reference count of sessions and pending handshakes per host.
///
/// IPv4-mapped IPv6 addresses count as their IPv4 host.
#[derive(Debug, Clone, Default)]
pub struct HostIndex {
    counts: HashMap<IpAddr, usize>,
}

impl HostIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `ip` holds at least one slot
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.counts.contains_key(&canonical(ip))
    }

    pub fn add(&mut self, ip: &IpAddr) {
        *self.counts.entry(canonical(ip)).or_insert(0) += 1;
    }

    pub fn remove(&mut self, ip: &IpAddr) {
        let key = canonical(ip);
        if let Some(count) = self.counts.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&key);
            }
        }
    }

    /// Number of distinct hosts
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

fn canonical(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(*v6)),
        IpAddr::V4(_) => *ip,
    }
}
