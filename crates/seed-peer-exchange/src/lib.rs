//! # Seed Peer Exchange
//!
//! Core of a gossip-network seed node: it accepts inbound peers, answers
//! their address requests from a bucketed address book, learns new
//! addresses from the peers it dials, and disconnects everyone once an
//! exchange completed so capacity keeps turning over.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** Address book, PEX state machine, connection slots
//!   and dial back-off. Pure and synchronous.
//! - **Ports Layer:** Transport, handshake, storage and clock traits, plus
//!   the `ConnectionManagerApi` driving port.
//! - **Service Layer:** The `Switch`, which owns every session task and
//!   the dial, save and event loops.
//! - **Adapters Layer:** TCP, length-prefixed bincode frames, the
//!   `NodeInfo` handshake, the JSON address book file and seed resolution.
//!
//! ## Example
//!
//! ```rust
//! use seed_peer_exchange::{
//!     AddressBook, AddressBookConfig, BucketKey, NetAddress, NodeIdentity, Timestamp,
//! };
//!
//! let ours: NetAddress = "aa@1.2.3.4:26656".parse().unwrap();
//! let mut book = AddressBook::new(
//!     NodeIdentity::new(ours.clone()),
//!     AddressBookConfig::default(),
//!     BucketKey::random(&mut rand::thread_rng()),
//! );
//!
//! let peer: NetAddress = "bb@5.6.7.8:26656".parse().unwrap();
//! assert!(book.add_address(peer.clone(), &ours));
//! assert!(book.mark_good(&peer.id, Timestamp::new(1_000)));
//! assert!(book.get(&peer.id).unwrap().is_old());
//! ```

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

/// Test utilities (FixedTimeSource, MemoryNetwork, MemoryStore)
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// =============================================================================
// RE-EXPORTS
// =============================================================================

// Domain entities
pub use domain::{
    parse_seed_list, AcceptError, AddrBookEntry, AddrBookSnapshot, AddressBook,
    AddressBookConfig, AddressBookStats, AddressParseError, BucketKey, BucketKind,
    ConnectionDirection, ConnectionSlotsConfig, ConnectionStats, DialError, HandshakeError,
    NetAddress, NodeIdentity, NodeInfo, ParsedSeeds, PeerId, PersistenceError, PexConfig,
    PexMessage, ProtocolViolation, SeedAddress, Timestamp, WireError,
};

// Port traits
pub use ports::{
    AddrBookStore, BoxedConnection, ConnectionManagerApi, Dialer, Handshaker, SwitchStats,
    TimeSource, TransportListener,
};

// Service
pub use service::{DisconnectReason, SharedAddressBook, Switch, SwitchConfig};

// Adapters
pub use adapters::{
    resolve_seed_list, resolve_seeds, JsonFileStore, NodeInfoHandshaker, SystemTimeSource,
    TcpDialer, TcpTransportListener,
};
