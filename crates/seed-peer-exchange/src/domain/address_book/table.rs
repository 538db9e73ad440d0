//! Address table implementation.

use std::collections::HashMap;

use super::bucket::AddressBucket;
use super::types::AddrBookEntry;
use crate::domain::PeerId;

/// A set of buckets (either new or old)
#[derive(Debug, Clone)]
pub struct AddressTable {
    pub(crate) buckets: Vec<AddressBucket>,
    /// Quick lookup: PeerId -> bucket index
    pub(crate) node_to_bucket: HashMap<PeerId, usize>,
}

impl AddressTable {
    /// Create a new table with specified bucket count
    pub fn new(bucket_count: usize) -> Self {
        Self {
            buckets: (0..bucket_count.max(1)).map(|_| AddressBucket::new()).collect(),
            node_to_bucket: HashMap::new(),
        }
    }

    /// Get total entry count
    pub fn len(&self) -> usize {
        self.node_to_bucket.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.node_to_bucket.is_empty()
    }

    /// Check if table contains a peer
    pub fn contains(&self, id: &PeerId) -> bool {
        self.node_to_bucket.contains_key(id)
    }

    /// Bucket at `index`
    pub fn bucket(&self, index: usize) -> &AddressBucket {
        &self.buckets[index % self.buckets.len()]
    }

    /// Look up an entry
    pub fn get(&self, id: &PeerId) -> Option<&AddrBookEntry> {
        let idx = *self.node_to_bucket.get(id)?;
        self.buckets[idx].get(id)
    }

    /// Look up an entry mutably
    pub fn get_mut(&mut self, id: &PeerId) -> Option<&mut AddrBookEntry> {
        let idx = *self.node_to_bucket.get(id)?;
        self.buckets[idx].get_mut(id)
    }

    /// Place an entry in bucket `index`; the caller checked capacity.
    pub fn insert(&mut self, index: usize, mut entry: AddrBookEntry) {
        let index = index % self.buckets.len();
        entry.bucket = index;
        self.node_to_bucket.insert(entry.addr.id.clone(), index);
        self.buckets[index].add(entry);
    }

    /// Remove an entry wherever it is
    pub fn remove(&mut self, id: &PeerId) -> Option<AddrBookEntry> {
        let idx = self.node_to_bucket.remove(id)?;
        self.buckets[idx].remove(id)
    }

    /// Iterate over every entry
    pub fn entries(&self) -> impl Iterator<Item = &AddrBookEntry> {
        self.buckets.iter().flat_map(|b| b.entries().iter())
    }
}
