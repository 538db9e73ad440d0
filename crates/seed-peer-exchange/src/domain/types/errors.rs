//! Error taxonomy for the seed.
//!
//! Every per-session error is contained inside that session's task. Only
//! startup conditions in the binary are fatal.

use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

use super::entities::PeerId;

/// Malformed peer id or address text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    /// Not a 1..=64 character hex string.
    #[error("invalid peer id {0:?}")]
    InvalidId(String),
    /// No `id@` prefix.
    #[error("address {0:?} is missing the id@ prefix")]
    MissingId(String),
    /// The `host:port` part did not parse.
    #[error("invalid host:port {0:?}")]
    InvalidHostPort(String),
}

/// The remote failed or refused the handshake. The connection is dropped
/// and nothing is recorded in the address book.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The handshake did not finish in time.
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),
    /// The remote is on another network.
    #[error("incompatible network: ours {ours}, theirs {theirs}")]
    NetworkMismatch {
        /// Our chain id.
        ours: String,
        /// Their chain id.
        theirs: String,
    },
    /// The remote speaks another P2P protocol version.
    #[error("incompatible protocol version: ours {ours}, theirs {theirs}")]
    ProtocolMismatch {
        /// Our version.
        ours: u64,
        /// Their version.
        theirs: u64,
    },
    /// The remote does not register the PEX channel.
    #[error("peer does not speak pex")]
    MissingPexChannel,
    /// The declared listen address belongs to another node.
    #[error("listen address {listen} does not match declared id {id}")]
    InconsistentIdentity {
        /// Declared id.
        id: PeerId,
        /// Declared listen address id.
        listen: PeerId,
    },
    /// Framing or decoding failed.
    #[error("handshake transport error: {0}")]
    Wire(#[from] WireError),
}

/// Framing errors on an established connection.
#[derive(Debug, Error)]
pub enum WireError {
    /// Underlying I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The peer announced a frame over the limit.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge {
        /// Announced length.
        len: usize,
        /// Configured limit.
        max: usize,
    },
    /// The payload did not decode.
    #[error("malformed frame: {0}")]
    Decode(String),
    /// Encoding a frame failed.
    #[error("failed to encode frame: {0}")]
    Encode(String),
    /// The remote closed the stream.
    #[error("connection closed by peer")]
    Closed,
}

/// The remote broke the PEX protocol. Always ends the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// Our request was not answered before the deadline.
    #[error("no pex response within {0:?}")]
    ResponseTimeout(Duration),
    /// A response carried more addresses than we ever ask for.
    #[error("pex response with {count} addresses exceeds cap of {max}")]
    OversizedResponse {
        /// Addresses received.
        count: usize,
        /// Allowed maximum.
        max: usize,
    },
    /// Requests kept arriving faster than the minimum interval.
    #[error("pex request flood: {ignored} requests ignored")]
    RequestFlood {
        /// Requests ignored so far.
        ignored: u32,
    },
    /// Unsolicited responses pushed the misbehavior score past the limit.
    #[error("misbehavior score {score} exceeds limit of {max}")]
    Misbehaving {
        /// Current score.
        score: u32,
        /// Configured limit.
        max: u32,
    },
}

/// Why an inbound connection was turned away.
///
/// None of these penalize the remote address; `Banned` only reports an
/// earlier penalty.
#[derive(Debug, Error)]
pub enum AcceptError {
    /// The switch is shutting down.
    #[error("switch is shutting down")]
    ShuttingDown,
    /// Inbound slots are exhausted.
    #[error("inbound capacity exceeded ({current}/{max})")]
    CapacityExceeded {
        /// Inbound sessions plus in-flight handshakes.
        current: usize,
        /// Configured limit.
        max: usize,
    },
    /// Another session already comes from this host.
    #[error("duplicate connection from host {0}")]
    DuplicateIp(IpAddr),
    /// We connected to ourselves.
    #[error("connection to self")]
    SelfConnection,
    /// A session with this peer already exists.
    #[error("already connected to peer {0}")]
    DuplicatePeer(PeerId),
    /// The peer is serving a ban for a protocol violation.
    #[error("peer {0} is banned")]
    Banned(PeerId),
    /// The handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
}

/// Why an outbound dial did not produce a session.
#[derive(Debug, Error)]
pub enum DialError {
    /// The switch is shutting down.
    #[error("switch is shutting down")]
    ShuttingDown,
    /// Outbound slots are exhausted.
    #[error("no outbound slot available")]
    NoSlot,
    /// A session or dial for this peer is already in progress.
    #[error("already connected or dialing {0}")]
    AlreadyConnected(PeerId),
    /// The address is our own.
    #[error("refusing to dial self")]
    SelfDial,
    /// The peer is serving a ban for a protocol violation.
    #[error("peer {0} is banned")]
    Banned(PeerId),
    /// TCP connect did not finish in time.
    #[error("dial timed out after {0:?}")]
    Timeout(Duration),
    /// TCP connect failed.
    #[error("connect failed: {0}")]
    Connect(#[from] std::io::Error),
    /// Connected, but the handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
    /// Connected, but somebody else answered.
    #[error("expected peer {expected}, handshake yielded {actual}")]
    UnexpectedPeer {
        /// Id we dialed.
        expected: PeerId,
        /// Id the remote proved.
        actual: PeerId,
    },
    /// The session table refused the connection after the handshake.
    #[error("session rejected: {0}")]
    Rejected(#[from] AcceptError),
}

impl DialError {
    /// Whether the host was unreachable, as opposed to reachable but unusable.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, DialError::Timeout(_) | DialError::Connect(_))
    }
}

/// Address book persistence failure. Logged; the in-memory book stays
/// authoritative.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading or writing the file failed.
    #[error("address book i/o error at {path}: {source}")]
    Io {
        /// File involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file content is not a valid address book.
    #[error("malformed address book: {0}")]
    Format(String),
    /// The background save task did not complete.
    #[error("address book save task failed: {0}")]
    Task(String),
}
