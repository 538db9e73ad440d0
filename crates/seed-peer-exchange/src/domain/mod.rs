//! Domain Layer - Pure seed logic with no I/O
//!
//! - Peer ids, addresses and node identity
//! - Address book (new/old buckets, keyed placement, eviction)
//! - PEX state machine (request schedule, flood and misbehavior limits)
//! - Connection slots (caps, duplicate-IP policy, reservations)
//! - Dial back-off
//! - Bans for peers that broke the protocol

pub mod address_book;
pub mod ban_list;
pub mod connection_slots;
pub mod dial_backoff;
pub mod pex;
/// Core domain types (entities, values, errors)
pub mod types;

pub use address_book::*;
pub use ban_list::*;
pub use connection_slots::*;
pub use dial_backoff::*;
pub use pex::*;
pub use types::*;
