//! The address book shared by the switch and every session.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{
    AddrBookEntry, AddrBookSnapshot, AddressBook, AddressBookConfig, AddressBookStats, BucketKey,
    FailureOutcome, NetAddress, NodeIdentity, PeerId, PersistenceError, Timestamp,
};
use crate::ports::{AddrBookStore, TimeSource};

/// Handle to the single address book of the process.
///
/// Every operation holds the lock for its whole duration. Saving takes a
/// snapshot under the lock and writes it on the blocking pool.
#[derive(Clone)]
pub struct SharedAddressBook {
    book: Arc<Mutex<AddressBook>>,
    store: Arc<dyn AddrBookStore>,
    time: Arc<dyn TimeSource>,
}

impl SharedAddressBook {
    /// Wrap an existing book
    pub fn new(
        book: AddressBook,
        store: Arc<dyn AddrBookStore>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            book: Arc::new(Mutex::new(book)),
            store,
            time,
        }
    }

    /// Load the book from `store`.
    ///
    /// A missing or unreadable file yields an empty book with a fresh key.
    pub fn load(
        identity: NodeIdentity,
        config: AddressBookConfig,
        store: Arc<dyn AddrBookStore>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let book = match store.load() {
            Ok(Some(snapshot)) => {
                let stored = snapshot.addrs.len();
                let book = AddressBook::restore(identity, config, snapshot);
                info!(stored, restored = book.size(), "loaded address book");
                book
            }
            Ok(None) => {
                info!("no saved address book, starting empty");
                AddressBook::new(identity, config, BucketKey::random(&mut rand::thread_rng()))
            }
            Err(e) => {
                warn!(error = %e, "failed to load address book, starting empty");
                AddressBook::new(identity, config, BucketKey::random(&mut rand::thread_rng()))
            }
        };
        Self::new(book, store, time)
    }

    /// Current wall-clock time
    pub fn now(&self) -> Timestamp {
        self.time.now()
    }

    /// Add one address learned from `source`
    pub fn add_address(&self, addr: NetAddress, source: &NetAddress) -> bool {
        self.book.lock().add_address(addr, source)
    }

    /// Add a batch learned from `source`; returns how many were accepted
    pub fn add_addresses(&self, addrs: Vec<NetAddress>, source: &NetAddress) -> usize {
        let mut book = self.book.lock();
        addrs
            .into_iter()
            .filter(|addr| book.add_address(addr.clone(), source))
            .count()
    }

    pub fn mark_good(&self, id: &PeerId) -> bool {
        let now = self.now();
        self.book.lock().mark_good(id, now)
    }

    pub fn mark_attempt(&self, id: &PeerId) -> Option<u32> {
        let now = self.now();
        self.book.lock().mark_attempt(id, now)
    }

    pub fn mark_failed(&self, id: &PeerId) -> FailureOutcome {
        let now = self.now();
        let outcome = self.book.lock().mark_failed(id, now);
        if matches!(outcome, FailureOutcome::Demoted | FailureOutcome::Removed) {
            debug!(peer = %id, ?outcome, "address penalized after repeated failures");
        }
        outcome
    }

    /// Drop a misbehaving peer's entry
    pub fn mark_bad(&self, id: &PeerId) -> bool {
        let removed = self.book.lock().mark_bad(id).is_some();
        if removed {
            debug!(peer = %id, "removed misbehaving peer from address book");
        }
        removed
    }

    /// Up to `n` addresses for a PEX response
    pub fn get_selection(&self, n: usize) -> Vec<NetAddress> {
        self.book.lock().get_selection(n, &mut rand::thread_rng())
    }

    /// A random address to dial that `exclude` does not reject
    pub fn pick_dial_candidate(&self, exclude: impl Fn(&PeerId) -> bool) -> Option<NetAddress> {
        self.book
            .lock()
            .pick_dial_candidate(&mut rand::thread_rng(), exclude)
    }

    pub fn size(&self) -> usize {
        self.book.lock().size()
    }

    pub fn is_empty(&self) -> bool {
        self.book.lock().is_empty()
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.book.lock().contains(id)
    }

    /// Copy of the entry for `id`
    pub fn get(&self, id: &PeerId) -> Option<AddrBookEntry> {
        self.book.lock().get(id).cloned()
    }

    pub fn stats(&self) -> AddressBookStats {
        self.book.lock().stats()
    }

    pub fn snapshot(&self) -> AddrBookSnapshot {
        self.book.lock().snapshot()
    }

    /// Persist a point-in-time snapshot.
    ///
    /// The store runs on the blocking pool; the lock is released before
    /// any I/O starts.
    pub async fn save(&self) -> Result<(), PersistenceError> {
        let snapshot = self.snapshot();
        let store = Arc::clone(&self.store);
        let count = snapshot.addrs.len();
        tokio::task::spawn_blocking(move || store.save(&snapshot))
            .await
            .map_err(|e| PersistenceError::Task(e.to_string()))??;
        debug!(addresses = count, "saved address book");
        Ok(())
    }
}

impl std::fmt::Debug for SharedAddressBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedAddressBook")
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}
