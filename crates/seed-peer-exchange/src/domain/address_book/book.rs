//! Main AddressBook implementation.
//!
//! Reference: Bitcoin Core's `addrman.h`

use rand::seq::SliceRandom;
use rand::Rng;

use super::config::AddressBookConfig;
use super::security::{BucketKey, SubnetKey};
use super::table::AddressTable;
use super::types::{
    AddrBookEntry, AddrBookSnapshot, AddressBookStats, BucketKind, FailureOutcome,
};
use crate::domain::{NetAddress, NodeIdentity, PeerId, Timestamp};

/// Address book with new/old segregation
///
/// # Invariants
///
/// 1. A peer id lives in at most one bucket across both tables
/// 2. Every bucket holds at most `bucket_size` entries
/// 3. Our own address is never stored
/// 4. An entry only reaches an old bucket through `mark_good`
#[derive(Debug, Clone)]
pub struct AddressBook {
    identity: NodeIdentity,
    key: BucketKey,
    /// Addresses we've heard about but never connected to
    new_table: AddressTable,
    /// Addresses we've successfully connected to
    old_table: AddressTable,
    config: AddressBookConfig,
}

impl AddressBook {
    /// Create an empty book
    pub fn new(identity: NodeIdentity, config: AddressBookConfig, key: BucketKey) -> Self {
        Self {
            identity,
            key,
            new_table: AddressTable::new(config.new_bucket_count),
            old_table: AddressTable::new(config.old_bucket_count),
            config,
        }
    }

    /// Rebuild a book from a snapshot.
    ///
    /// Old entries are placed first so demotions cannot crowd them out.
    /// Entries that are no longer admissible (our own address, or
    /// non-routable under strict mode) are dropped.
    pub fn restore(
        identity: NodeIdentity,
        config: AddressBookConfig,
        snapshot: AddrBookSnapshot,
    ) -> Self {
        let mut book = Self::new(identity, config, snapshot.key);
        let (old, new): (Vec<_>, Vec<_>) = snapshot
            .addrs
            .into_iter()
            .partition(|e| e.bucket_type == BucketKind::Old);

        for persisted in old.into_iter().chain(new) {
            if !book.is_admissible(&persisted.addr) || book.contains(&persisted.addr.id) {
                continue;
            }
            let was_old =
                persisted.bucket_type == BucketKind::Old && persisted.last_success.is_some();
            let mut entry = AddrBookEntry::new(persisted.addr, persisted.src);
            entry.last_attempt = persisted.last_attempt;
            entry.last_success = persisted.last_success;
            entry.attempts = persisted.attempts;

            if was_old {
                let idx = book.old_bucket_index(&entry.addr);
                if !book.old_table.bucket(idx).is_full(book.config.bucket_size) {
                    entry.kind = BucketKind::Old;
                    book.old_table.insert(idx, entry);
                    continue;
                }
            }
            // Losing placement on restore only happens when the
            // configuration shrank; the entry is simply forgotten.
            let _ = book.place_new(entry);
        }
        book
    }

    /// The bucket placement key
    pub fn key(&self) -> BucketKey {
        self.key
    }

    /// Configuration in force
    pub fn config(&self) -> &AddressBookConfig {
        &self.config
    }

    /// Our own identity
    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Total number of stored addresses
    pub fn size(&self) -> usize {
        self.new_table.len() + self.old_table.len()
    }

    /// `true` when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.new_table.is_empty() && self.old_table.is_empty()
    }

    /// Whether a peer is known
    pub fn contains(&self, id: &PeerId) -> bool {
        self.new_table.contains(id) || self.old_table.contains(id)
    }

    /// Look up a peer's entry
    pub fn get(&self, id: &PeerId) -> Option<&AddrBookEntry> {
        self.new_table.get(id).or_else(|| self.old_table.get(id))
    }

    /// Iterate over every entry
    pub fn entries(&self) -> impl Iterator<Item = &AddrBookEntry> {
        self.old_table.entries().chain(self.new_table.entries())
    }

    /// Get statistics
    pub fn stats(&self) -> AddressBookStats {
        AddressBookStats {
            new_count: self.new_table.len(),
            old_count: self.old_table.len(),
            new_bucket_count: self.new_table.buckets.len(),
            old_bucket_count: self.old_table.buckets.len(),
            capacity: self.config.capacity(),
        }
    }

    /// Add an address learned from `source`.
    ///
    /// Returns `true` if the address is stored afterwards (inserted now or
    /// already known), `false` if it was refused.
    pub fn add_address(&mut self, addr: NetAddress, source: &NetAddress) -> bool {
        if !self.is_admissible(&addr) {
            return false;
        }
        if self.contains(&addr.id) {
            return true;
        }
        self.place_new(AddrBookEntry::new(addr, source.clone()))
            .is_ok()
    }

    /// Record a successful connection and promote the entry to an old bucket.
    ///
    /// When the target old bucket is full, its least recently successful
    /// entry moves back to a new bucket. If no new bucket can take it, the
    /// promotion is refused and the entry stays new. Returns whether the
    /// entry is old afterwards.
    pub fn mark_good(&mut self, id: &PeerId, now: Timestamp) -> bool {
        if let Some(entry) = self.old_table.get_mut(id) {
            record_success(entry, now);
            return true;
        }
        let Some(mut entry) = self.new_table.remove(id) else {
            return false;
        };
        record_success(&mut entry, now);

        let old_idx = self.old_bucket_index(&entry.addr);
        if self.old_table.bucket(old_idx).is_full(self.config.bucket_size) {
            let victim_id = self
                .old_table
                .bucket(old_idx)
                .least_recently_successful()
                .map(|e| e.addr.id.clone());
            let victim = victim_id.and_then(|id| self.old_table.remove(&id));
            let Some(victim) = victim else {
                let home = entry.bucket;
                self.new_table.insert(home, entry);
                return false;
            };
            if let Err(victim) = self.place_new(victim) {
                self.old_table.insert(old_idx, victim);
                let home = entry.bucket;
                self.new_table.insert(home, entry);
                return false;
            }
        }

        entry.kind = BucketKind::Old;
        self.old_table.insert(old_idx, entry);
        true
    }

    /// Count an attempt to reach a peer. Returns the new attempt count.
    pub fn mark_attempt(&mut self, id: &PeerId, now: Timestamp) -> Option<u32> {
        let entry = self.entry_mut(id)?;
        entry.attempts = entry.attempts.saturating_add(1);
        entry.last_attempt = Some(now);
        Some(entry.attempts)
    }

    /// Count a failed dial.
    ///
    /// At `max_failures` consecutive failures an old entry is demoted to a
    /// new bucket and a new entry is dropped.
    pub fn mark_failed(&mut self, id: &PeerId, now: Timestamp) -> FailureOutcome {
        let Some(attempts) = self.mark_attempt(id, now) else {
            return FailureOutcome::Unknown;
        };
        if attempts < self.config.max_failures {
            return FailureOutcome::Recorded { attempts };
        }
        if let Some(entry) = self.old_table.remove(id) {
            return match self.place_new(entry) {
                Ok(()) => FailureOutcome::Demoted,
                Err(_) => FailureOutcome::Removed,
            };
        }
        self.new_table.remove(id);
        FailureOutcome::Removed
    }

    /// Forget a peer that broke the protocol. Returns the dropped entry.
    pub fn mark_bad(&mut self, id: &PeerId) -> Option<AddrBookEntry> {
        self.new_table
            .remove(id)
            .or_else(|| self.old_table.remove(id))
    }

    /// Up to `n` distinct addresses for a PEX response.
    ///
    /// Never more than `max_selection` or the book size. Old entries fill
    /// `selection_old_bias_percent` of the slots first when available; the
    /// rest is sampled uniformly.
    pub fn get_selection<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<NetAddress> {
        let want = n.min(self.config.max_selection).min(self.size());
        if want == 0 {
            return Vec::new();
        }

        let mut old: Vec<&AddrBookEntry> = self.old_table.entries().collect();
        let mut new: Vec<&AddrBookEntry> = self.new_table.entries().collect();
        old.shuffle(rng);
        new.shuffle(rng);

        let bias = usize::from(self.config.selection_old_bias_percent.min(100));
        let old_target = (want * bias).div_ceil(100).min(old.len());
        let new_take = (want - old_target).min(new.len());
        let old_take = (want - new_take).min(old.len());

        let mut selection: Vec<NetAddress> = old[..old_take]
            .iter()
            .chain(new[..new_take].iter())
            .map(|e| e.addr.clone())
            .collect();
        selection.shuffle(rng);
        selection
    }

    /// A random entry to dial, skipping ids `exclude` rejects.
    ///
    /// Seeds favour fresh addresses, so new buckets are tried first with
    /// probability `dial_new_bias_percent`.
    pub fn pick_dial_candidate<R: Rng>(
        &self,
        rng: &mut R,
        exclude: impl Fn(&PeerId) -> bool,
    ) -> Option<NetAddress> {
        let from_new = rng.gen_range(0..100u8) < self.config.dial_new_bias_percent;
        let order = if from_new {
            [&self.new_table, &self.old_table]
        } else {
            [&self.old_table, &self.new_table]
        };
        order.into_iter().find_map(|table| {
            let candidates: Vec<&AddrBookEntry> =
                table.entries().filter(|e| !exclude(&e.addr.id)).collect();
            candidates.choose(&mut *rng).map(|e| e.addr.clone())
        })
    }

    /// Point-in-time copy for persistence.
    pub fn snapshot(&self) -> AddrBookSnapshot {
        AddrBookSnapshot::from_entries(self.key, self.entries())
    }

    fn is_admissible(&self, addr: &NetAddress) -> bool {
        if self.identity.is_self(addr) || !addr.is_dialable() {
            return false;
        }
        !self.config.strict || addr.is_routable()
    }

    fn entry_mut(&mut self, id: &PeerId) -> Option<&mut AddrBookEntry> {
        if self.new_table.contains(id) {
            self.new_table.get_mut(id)
        } else {
            self.old_table.get_mut(id)
        }
    }

    /// Put an entry into its new bucket, evicting by the tie-break rule.
    ///
    /// The newcomer only wins a full bucket if the worst resident has at
    /// least one failed attempt. On refusal the entry is handed back.
    fn place_new(&mut self, mut entry: AddrBookEntry) -> Result<(), AddrBookEntry> {
        let idx = self.new_bucket_index(&entry.addr, &entry.source);
        let bucket = self.new_table.bucket(idx);
        if bucket.is_full(self.config.bucket_size) {
            let victim = match bucket.eviction_victim() {
                Some(victim) if victim.attempts > 0 => victim.addr.id.clone(),
                _ => return Err(entry),
            };
            self.new_table.remove(&victim);
        }
        entry.kind = BucketKind::New;
        self.new_table.insert(idx, entry);
        Ok(())
    }

    /// New bucket for `addr` as reported by `source`.
    ///
    /// # Security
    /// The source group picks one of `new_buckets_per_group` slots, and only
    /// then is the final bucket derived, so a single source reaches a
    /// bounded set of buckets no matter what addresses it invents.
    pub(super) fn new_bucket_index(&self, addr: &NetAddress, source: &NetAddress) -> usize {
        let addr_group = SubnetKey::from_ip(&addr.ip);
        let source_group = SubnetKey::from_ip(&source.ip);
        let per_group = self.config.new_buckets_per_group.max(1);
        let slot = self
            .key
            .hash(&[&b"new"[..], &addr_group.0[..], &source_group.0[..]])
            % per_group;
        let hash = self
            .key
            .hash(&[&b"new"[..], &source_group.0[..], &slot.to_le_bytes()[..]]);
        (hash % self.new_table.buckets.len() as u64) as usize
    }

    /// Old bucket for `addr`; the address group bounds the reachable set.
    pub(super) fn old_bucket_index(&self, addr: &NetAddress) -> usize {
        let group = SubnetKey::from_ip(&addr.ip);
        let per_group = self.config.old_buckets_per_group.max(1);
        let endpoint = addr.to_string();
        let slot = self.key.hash(&[&b"old"[..], endpoint.as_bytes()]) % per_group;
        let hash = self
            .key
            .hash(&[&b"old"[..], &group.0[..], &slot.to_le_bytes()[..]]);
        (hash % self.old_table.buckets.len() as u64) as usize
    }
}

fn record_success(entry: &mut AddrBookEntry, now: Timestamp) {
    entry.attempts = 0;
    entry.last_attempt = Some(now);
    entry.last_success = Some(now);
}
