//! Address bucket implementation.

use std::cmp::Reverse;

use super::types::AddrBookEntry;
use crate::domain::PeerId;

/// A fixed-capacity bucket of address entries
#[derive(Debug, Clone, Default)]
pub struct AddressBucket {
    pub(crate) entries: Vec<AddrBookEntry>,
}

impl AddressBucket {
    /// Create a new empty bucket
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if the bucket has reached `capacity`
    pub fn is_full(&self, capacity: usize) -> bool {
        self.entries.len() >= capacity
    }

    /// Add an entry to the bucket
    pub fn add(&mut self, entry: AddrBookEntry) {
        self.entries.push(entry);
    }

    /// Remove an entry by peer id
    pub fn remove(&mut self, id: &PeerId) -> Option<AddrBookEntry> {
        let pos = self.entries.iter().position(|e| &e.addr.id == id)?;
        Some(self.entries.swap_remove(pos))
    }

    /// Look up an entry
    pub fn get(&self, id: &PeerId) -> Option<&AddrBookEntry> {
        self.entries.iter().find(|e| &e.addr.id == id)
    }

    /// Look up an entry mutably
    pub fn get_mut(&mut self, id: &PeerId) -> Option<&mut AddrBookEntry> {
        self.entries.iter_mut().find(|e| &e.addr.id == id)
    }

    /// Get all entries
    pub fn entries(&self) -> &[AddrBookEntry] {
        &self.entries
    }

    /// Entry to give up when a newcomer needs the slot.
    ///
    /// Highest `attempts` first; ties go to never-succeeded entries, then
    /// to the oldest `last_success`.
    pub fn eviction_victim(&self) -> Option<&AddrBookEntry> {
        self.entries
            .iter()
            .max_by_key(|e| (e.attempts, Reverse(e.last_success)))
    }

    /// Entry with the oldest `last_success` (never-succeeded first).
    pub fn least_recently_successful(&self) -> Option<&AddrBookEntry> {
        self.entries.iter().min_by_key(|e| e.last_success)
    }
}
