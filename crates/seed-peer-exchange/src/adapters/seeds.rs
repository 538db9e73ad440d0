//! Seed list resolution.
//!
//! Seeds given by DNS name are resolved once, at startup; the first
//! address returned wins. Entries that fail to parse or resolve are logged
//! and skipped.

use tokio::net::lookup_host;
use tracing::warn;

use crate::domain::{parse_seed_list, NetAddress, SeedAddress};

/// Resolve parsed seeds into dialable addresses.
pub async fn resolve_seeds(seeds: &[SeedAddress]) -> Vec<NetAddress> {
    let mut resolved = Vec::with_capacity(seeds.len());
    for seed in seeds {
        if let Some(addr) = seed.to_net_address() {
            resolved.push(addr);
            continue;
        }
        match lookup_host(seed.host_port()).await {
            Ok(mut addrs) => match addrs.next() {
                Some(sock) => resolved.push(NetAddress::from_socket(seed.id.clone(), sock)),
                None => warn!(seed = %seed, "seed host resolved to no address"),
            },
            Err(e) => warn!(seed = %seed, error = %e, "failed to resolve seed host"),
        }
    }
    resolved
}

/// Parse a comma-separated seed list and resolve it.
pub async fn resolve_seed_list(raw: &str) -> Vec<NetAddress> {
    let parsed = parse_seed_list(raw);
    for (entry, error) in &parsed.rejected {
        warn!(entry = %entry, error = %error, "ignoring malformed seed");
    }
    resolve_seeds(&parsed.seeds).await
}
