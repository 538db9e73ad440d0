//! Address book security types.
//!
//! SECURITY-CRITICAL: bucket placement must stay unpredictable to anyone
//! who does not know the book's key. Isolate for security audits.

use std::fmt;
use std::hash::Hasher;
use std::net::IpAddr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

/// Subnet key for grouping peers.
/// Stores /16 for IPv4 and /32 for IPv6, tagged with the family.
///
/// # Security (Anti-Eclipse)
/// One operator usually controls a whole /16 (or IPv6 /32). Grouping by it
/// keeps a single network from spreading across every bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubnetKey(pub [u8; 5]);

impl SubnetKey {
    /// Extract subnet key from IP address.
    pub fn from_ip(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => {
                let o = v4.octets();
                SubnetKey([4, o[0], o[1], 0, 0])
            }
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => Self::from_ip(&IpAddr::V4(v4)),
                None => {
                    let o = v6.octets();
                    SubnetKey([6, o[0], o[1], o[2], o[3]])
                }
            },
        }
    }
}

/// Secret 128-bit key for bucket placement.
///
/// # Security
/// Keyed SipHash-1-3 makes `(address, source) -> bucket` unpredictable to
/// an attacker choosing sources. The key is persisted with the book so a
/// restart reproduces the same placement.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketKey([u8; 16]);

impl BucketKey {
    /// Create from raw bytes.
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random key.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 16];
        rng.fill(&mut bytes);
        Self(bytes)
    }

    /// Keyed hash over a sequence of byte slices.
    pub fn hash(&self, parts: &[&[u8]]) -> u64 {
        let (k0, k1) = self.0.split_at(8);
        let mut k0_bytes = [0u8; 8];
        let mut k1_bytes = [0u8; 8];
        k0_bytes.copy_from_slice(k0);
        k1_bytes.copy_from_slice(k1);
        let mut hasher =
            SipHasher13::new_with_keys(u64::from_le_bytes(k0_bytes), u64::from_le_bytes(k1_bytes));
        for part in parts {
            // Length prefix keeps ("ab", "c") and ("a", "bc") apart.
            hasher.write_u64(part.len() as u64);
            hasher.write(part);
        }
        hasher.finish()
    }
}

impl fmt::Debug for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret.
        f.write_str("BucketKey(..)")
    }
}

impl TryFrom<String> for BucketKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let bytes = hex::decode(value.trim()).map_err(|e| format!("bucket key: {e}"))?;
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| "bucket key must be 16 bytes".to_string())?;
        Ok(Self(bytes))
    }
}

impl From<BucketKey> for String {
    fn from(key: BucketKey) -> Self {
        hex::encode(key.0)
    }
}
