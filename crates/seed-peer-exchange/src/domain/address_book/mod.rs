//! # Address Book - New/Old Bucket System
//!
//! Bounded, bucketed store of every peer address the seed has heard of.
//!
//! ## Design (addrman-Inspired)
//!
//! - **New buckets**: addresses heard about but never successfully dialed
//! - **Old buckets**: addresses we have connected to at least once
//!
//! ## Anti-Eclipse Properties
//!
//! 1. New-bucket placement hashes the address group together with the
//!    source group, so one source reaches only a handful of buckets
//! 2. Old buckets are only reachable through a recorded success
//! 3. All hashes are keyed with a random secret persisted with the book
//!
//! Reference: Bitcoin Core's `addrman.h`, Tendermint's `p2p/pex/addrbook.go`

// Semantic submodules
mod book;
mod bucket;
mod config;
mod security;
mod table;
mod types;

// Re-export public API
pub use book::AddressBook;
pub use bucket::AddressBucket;
pub use config::AddressBookConfig;
pub use security::{BucketKey, SubnetKey};
pub use table::AddressTable;
pub use types::{
    AddrBookEntry, AddrBookSnapshot, AddressBookStats, BucketKind, FailureOutcome, PersistedEntry,
};
