//! Address book type definitions.

use serde::{Deserialize, Serialize};

use super::security::BucketKey;
use crate::domain::{NetAddress, Timestamp};

/// Which bucket set an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketKind {
    /// Heard about, never connected.
    New,
    /// Connected to at least once.
    Old,
}

/// An address entry in the address book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrBookEntry {
    /// The peer's address
    pub addr: NetAddress,
    /// Peer that told us about this address
    pub source: NetAddress,
    /// Bucket set holding the entry
    pub kind: BucketKind,
    /// Index within that bucket set
    pub bucket: usize,
    /// When we last tried to reach it
    pub last_attempt: Option<Timestamp>,
    /// When we last connected successfully
    pub last_success: Option<Timestamp>,
    /// Consecutive failed attempts
    pub attempts: u32,
}

impl AddrBookEntry {
    /// Fresh, never-tried entry
    pub fn new(addr: NetAddress, source: NetAddress) -> Self {
        Self {
            addr,
            source,
            kind: BucketKind::New,
            bucket: 0,
            last_attempt: None,
            last_success: None,
            attempts: 0,
        }
    }

    /// Whether the entry is in an old bucket
    pub fn is_old(&self) -> bool {
        self.kind == BucketKind::Old
    }

    fn to_persisted(&self) -> PersistedEntry {
        PersistedEntry {
            addr: self.addr.clone(),
            src: self.source.clone(),
            bucket_type: self.kind,
            last_attempt: self.last_attempt,
            last_success: self.last_success,
            attempts: self.attempts,
        }
    }
}

/// What `mark_failed` did to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// No such entry.
    Unknown,
    /// Failure counted, entry stays where it is.
    Recorded {
        /// Consecutive failures so far.
        attempts: u32,
    },
    /// Old entry moved back to a new bucket.
    Demoted,
    /// Entry dropped from the book.
    Removed,
}

/// Statistics about the address book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressBookStats {
    /// Entries in new buckets.
    pub new_count: usize,
    /// Entries in old buckets.
    pub old_count: usize,
    /// Number of new buckets.
    pub new_bucket_count: usize,
    /// Number of old buckets.
    pub old_bucket_count: usize,
    /// Maximum number of entries.
    pub capacity: usize,
}

/// One entry as written to storage. Bucket indices are derived on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedEntry {
    /// The peer's address
    pub addr: NetAddress,
    /// Peer that told us about it
    pub src: NetAddress,
    /// New or old
    pub bucket_type: BucketKind,
    /// Last attempt time
    #[serde(default)]
    pub last_attempt: Option<Timestamp>,
    /// Last success time
    #[serde(default)]
    pub last_success: Option<Timestamp>,
    /// Consecutive failures
    #[serde(default)]
    pub attempts: u32,
}

/// Point-in-time copy of the book, detached from the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddrBookSnapshot {
    /// Bucket placement key
    pub key: BucketKey,
    /// Every retained entry
    pub addrs: Vec<PersistedEntry>,
}

impl AddrBookSnapshot {
    pub(crate) fn from_entries<'a>(
        key: BucketKey,
        entries: impl Iterator<Item = &'a AddrBookEntry>,
    ) -> Self {
        let mut addrs: Vec<PersistedEntry> = entries.map(AddrBookEntry::to_persisted).collect();
        // Stable file content across saves.
        addrs.sort_by(|a, b| a.addr.id.cmp(&b.addr.id));
        Self { key, addrs }
    }
}
