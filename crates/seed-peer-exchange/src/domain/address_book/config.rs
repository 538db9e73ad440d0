//! Address book configuration.

/// Configuration for the address book
#[derive(Debug, Clone)]
pub struct AddressBookConfig {
    /// Number of buckets holding unverified addresses
    pub new_bucket_count: usize,
    /// Number of buckets holding verified addresses
    pub old_bucket_count: usize,
    /// Maximum entries per bucket (both kinds)
    pub bucket_size: usize,
    /// How many new buckets a single source group can reach
    pub new_buckets_per_group: u64,
    /// How many old buckets a single address group can reach
    pub old_buckets_per_group: u64,
    /// Consecutive failures before an entry is demoted or dropped
    pub max_failures: u32,
    /// Hard cap on addresses returned by one selection
    pub max_selection: usize,
    /// Share of a selection filled from old entries first (0-100)
    pub selection_old_bias_percent: u8,
    /// Chance a dial candidate is drawn from the new buckets (0-100)
    pub dial_new_bias_percent: u8,
    /// Reject addresses that are not publicly routable
    pub strict: bool,
}

impl AddressBookConfig {
    /// Upper bound on the number of stored addresses.
    pub fn capacity(&self) -> usize {
        (self.new_bucket_count + self.old_bucket_count) * self.bucket_size
    }
}

impl Default for AddressBookConfig {
    fn default() -> Self {
        Self {
            new_bucket_count: 256,
            old_bucket_count: 64,
            bucket_size: 64,
            new_buckets_per_group: 32,
            old_buckets_per_group: 4,
            max_failures: 3,
            max_selection: 250,
            selection_old_bias_percent: 60,
            dial_new_bias_percent: 70,
            strict: true,
        }
    }
}

impl AddressBookConfig {
    /// Testing config with tiny tables and strict routing off
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        Self {
            new_bucket_count: 4,
            old_bucket_count: 2,
            bucket_size: 2,
            new_buckets_per_group: 4,
            old_buckets_per_group: 2,
            max_failures: 3,
            max_selection: 8,
            selection_old_bias_percent: 60,
            dial_new_bias_percent: 70,
            strict: false,
        }
    }
}
