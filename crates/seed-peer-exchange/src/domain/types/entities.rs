//! Core entities: peer identifiers, network addresses, node identity.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::AddressParseError;

/// Channel byte the PEX reactor is registered on.
pub const PEX_CHANNEL: u8 = 0x00;

/// P2P protocol version both sides of a handshake must agree on.
pub const P2P_PROTOCOL_VERSION: u64 = 8;

/// Hex-encoded node identifier.
///
/// Generated identifiers are 40 characters (the first 20 bytes of the
/// SHA-256 of the node's public key). Parsing accepts any non-empty hex
/// string up to 64 characters and normalizes it to lower case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Longest accepted identifier, in hex characters.
    pub const MAX_LEN: usize = 64;

    /// Bytes of the public-key hash a node id is made of.
    pub const KEY_HASH_LEN: usize = 20;

    /// Validate and normalize a hex identifier.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, AddressParseError> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() || raw.len() > Self::MAX_LEN {
            return Err(AddressParseError::InvalidId(raw.to_string()));
        }
        if !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressParseError::InvalidId(raw.to_string()));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    /// Build an identifier from raw digest bytes.
    pub fn from_digest(bytes: &[u8]) -> Result<Self, AddressParseError> {
        Self::new(hex::encode(bytes))
    }

    /// Identifier of a node whose truncated public-key hash is `hash`.
    pub fn from_key_hash(hash: &[u8; Self::KEY_HASH_LEN]) -> Self {
        Self(hex::encode(hash))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PeerId {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PeerId {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.0
    }
}

/// A dialable peer address: `id@ip:port`.
///
/// Two addresses name the same peer iff their `id` matches, and the same
/// machine iff their `ip` matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetAddress {
    /// Node identifier the remote must prove during the handshake.
    pub id: PeerId,
    /// Host IP.
    pub ip: IpAddr,
    /// TCP port.
    pub port: u16,
}

impl NetAddress {
    /// Create a new address.
    pub fn new(id: PeerId, ip: IpAddr, port: u16) -> Self {
        Self { id, ip, port }
    }

    /// Create from an id and a socket address.
    pub fn from_socket(id: PeerId, addr: SocketAddr) -> Self {
        Self::new(id, addr.ip(), addr.port())
    }

    /// The `ip:port` pair to dial.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Whether anything could possibly be listening here.
    pub fn is_dialable(&self) -> bool {
        self.port != 0 && !self.ip.is_unspecified() && !self.ip.is_multicast()
    }

    /// Whether the address is reachable from the public internet.
    pub fn is_routable(&self) -> bool {
        self.is_dialable() && is_routable_ip(&self.ip)
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.socket_addr())
    }
}

impl FromStr for NetAddress {
    type Err = AddressParseError;

    /// Parse `id@ip:port`, tolerating a leading `tcp://`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = strip_scheme(s.trim());
        let (id, host_port) = trimmed
            .split_once('@')
            .ok_or_else(|| AddressParseError::MissingId(s.to_string()))?;
        let id = PeerId::new(id)?;
        let addr: SocketAddr = host_port
            .parse()
            .map_err(|_| AddressParseError::InvalidHostPort(host_port.to_string()))?;
        Ok(Self::from_socket(id, addr))
    }
}

/// A seed entry whose host may still be a DNS name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeedAddress {
    /// Expected node identifier.
    pub id: PeerId,
    /// IP literal or DNS name.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl SeedAddress {
    /// The address without a lookup, if `host` is an IP literal.
    pub fn to_net_address(&self) -> Option<NetAddress> {
        self.host
            .parse::<IpAddr>()
            .ok()
            .map(|ip| NetAddress::new(self.id.clone(), ip, self.port))
    }

    /// `host:port` form suitable for a resolver.
    pub fn host_port(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for SeedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.host_port())
    }
}

impl FromStr for SeedAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = strip_scheme(s.trim());
        let (id, host_port) = trimmed
            .split_once('@')
            .ok_or_else(|| AddressParseError::MissingId(s.to_string()))?;
        let id = PeerId::new(id)?;
        let (host, port) = host_port
            .rsplit_once(':')
            .ok_or_else(|| AddressParseError::InvalidHostPort(host_port.to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port: u16 = port
            .parse()
            .map_err(|_| AddressParseError::InvalidHostPort(host_port.to_string()))?;
        if host.is_empty() || port == 0 {
            return Err(AddressParseError::InvalidHostPort(host_port.to_string()));
        }
        Ok(Self {
            id,
            host: host.to_string(),
            port,
        })
    }
}

/// Result of splitting a comma-separated seed list.
#[derive(Debug, Default)]
pub struct ParsedSeeds {
    /// Entries that parsed.
    pub seeds: Vec<SeedAddress>,
    /// Entries that did not, with the reason.
    pub rejected: Vec<(String, AddressParseError)>,
}

/// Split `id@host:port,id@host:port`, trimming every entry.
///
/// Empty entries are skipped silently; malformed ones end up in `rejected`.
pub fn parse_seed_list(input: &str) -> ParsedSeeds {
    let mut parsed = ParsedSeeds::default();
    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.parse::<SeedAddress>() {
            Ok(seed) if !parsed.seeds.iter().any(|s| s.id == seed.id) => parsed.seeds.push(seed),
            Ok(_) => {}
            Err(e) => parsed.rejected.push((entry.to_string(), e)),
        }
    }
    parsed
}

/// This node's identity as seen by peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    listen_addr: NetAddress,
}

impl NodeIdentity {
    /// Wrap the advertised listen address.
    pub fn new(listen_addr: NetAddress) -> Self {
        Self { listen_addr }
    }

    /// Our node identifier.
    pub fn id(&self) -> &PeerId {
        &self.listen_addr.id
    }

    /// Our advertised listen address.
    pub fn listen_addr(&self) -> &NetAddress {
        &self.listen_addr
    }

    /// `true` if `addr` names this node, by id or by exact endpoint.
    pub fn is_self(&self, addr: &NetAddress) -> bool {
        if addr.id == self.listen_addr.id {
            return true;
        }
        !self.listen_addr.ip.is_unspecified() && addr.socket_addr() == self.listen_addr.socket_addr()
    }
}

/// What a node declares about itself during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// P2P protocol version.
    pub protocol_version: u64,
    /// Node identifier.
    pub id: PeerId,
    /// Where the node accepts connections.
    pub listen_addr: NetAddress,
    /// Network (chain id) the node belongs to.
    pub network: String,
    /// Software version string.
    pub version: String,
    /// Reactor channels the node speaks.
    pub channels: Vec<u8>,
    /// Human-readable name.
    pub moniker: String,
}

impl NodeInfo {
    /// Node info for a seed that only speaks PEX.
    pub fn for_seed(identity: &NodeIdentity, network: &str, version: &str) -> Self {
        Self {
            protocol_version: P2P_PROTOCOL_VERSION,
            id: identity.id().clone(),
            listen_addr: identity.listen_addr().clone(),
            network: network.to_string(),
            version: version.to_string(),
            channels: vec![PEX_CHANNEL],
            moniker: format!("{network}-seed"),
        }
    }

    /// Whether the node advertises the PEX channel.
    pub fn supports_pex(&self) -> bool {
        self.channels.contains(&PEX_CHANNEL)
    }
}

fn strip_scheme(s: &str) -> &str {
    s.strip_prefix("tcp://").unwrap_or(s)
}

/// Public-internet reachability of an IP.
///
/// Rejects unspecified, loopback, private (RFC 1918), shared CGNAT
/// (RFC 6598), link-local, documentation, benchmarking (RFC 2544),
/// broadcast, multicast, IPv6 unique-local and IPv6 link-local ranges.
/// IPv4-mapped IPv6 addresses are judged by their IPv4 form.
pub fn is_routable_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_routable_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_routable_v4(&v4),
            None => is_routable_v6(v6),
        },
    }
}

fn is_routable_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    let shared_cgnat = a == 100 && (b & 0xc0) == 64;
    let benchmarking = a == 198 && (b & 0xfe) == 18;
    let reserved = a >= 240;
    !(ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_documentation()
        || ip.is_broadcast()
        || ip.is_multicast()
        || shared_cgnat
        || benchmarking
        || reserved
        || a == 0)
}

fn is_routable_v6(ip: &Ipv6Addr) -> bool {
    let segments = ip.segments();
    let unique_local = (segments[0] & 0xfe00) == 0xfc00;
    let link_local = (segments[0] & 0xffc0) == 0xfe80;
    let documentation = segments[0] == 0x2001 && segments[1] == 0x0db8;
    !(ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_multicast()
        || unique_local
        || link_local
        || documentation)
}
