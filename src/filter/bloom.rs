//! Bloom Filter implementation.
//!
//! A space-efficient probabilistic data structure used to test whether an element
//! is a member of a set. False positive matches are possible, but false negatives are not.
//!
//! The [`BloomFilter`] itself is only the policy (false positive rate, hash
//! count, seeds). Filters are plain byte strings: `[num_hashes: u8][bit array]`,
//! stored in the flexible block of each SST.

use crate::filter::hash::murmur64a;
use crate::filter::Filter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default false positive rate.
pub const DEFAULT_FP_RATE: f64 = 0.0082;

/// Seeds of the first ten hash functions.
const SEEDS: [u64; 10] = [
    0x6fef_439d_c013_aaa6,
    0x089f_55eb_6baa_ab91,
    0xfe28_c582_6fef_439d,
    0x8860_6e7e_6075_f2c3,
    0x38ed_602f_9a4f_44a7,
    0x45fc_1384_341b_1bea,
    0x3de4_e39c_7116_5672,
    0xae5f_61af_9a07_fd46,
    0x512f_9502_b7bc_2663,
    0xae7e_e2cb_5665_9fc5,
];

/// Seed of the generator that extends [`SEEDS`]; fixed so filters written by
/// one process can be read by another.
const EXTRA_SEED_STREAM: u64 = 0x7463_6462_626c_6f6f;

/// Upper bound on hash functions; the count is stored in one byte.
const MAX_HASHES: usize = 30;

/// Bloom filter policy.
///
/// # Example
/// ```
/// use tcdb::filter::{BloomFilter, Filter};
///
/// let policy = BloomFilter::new(0.01);
/// let keys: Vec<&[u8]> = vec![&b"key1"[..], &b"key2"[..]];
/// let filter = policy.create_filter(keys);
///
/// assert!(policy.may_contain(&filter, b"key1"));
/// assert!(policy.may_contain(&filter, b"key2"));
/// // key3 might return true (false positive) or false
/// ```
#[derive(Debug, Clone)]
pub struct BloomFilter {
    fp_rate: f64,
    num_hashes: usize,
    seeds: Vec<u64>,
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::new(DEFAULT_FP_RATE)
    }
}

impl BloomFilter {
    /// Creates a policy for the given false positive rate.
    pub fn new(fp_rate: f64) -> Self {
        let p = fp_rate.clamp(1e-9, 0.999_999);
        let k = (-p.ln() / std::f64::consts::LN_2).round() as usize;
        let num_hashes = k.clamp(1, MAX_HASHES);
        Self { fp_rate: p, num_hashes, seeds: seeds_for(num_hashes) }
    }

    /// Number of hash functions per key.
    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// Configured false positive rate.
    pub fn fp_rate(&self) -> f64 {
        self.fp_rate
    }

    /// Bytes of bit array needed for `num_keys` keys.
    pub fn bytes_for(&self, num_keys: usize) -> usize {
        let ln2 = std::f64::consts::LN_2;
        let bits = (-(num_keys as f64) * self.fp_rate.ln() / (ln2 * ln2)).ceil() as usize;
        bits.div_ceil(8).max(1)
    }

    fn bit_position(hash: u64, num_bytes: usize) -> (usize, u8) {
        let byte = ((hash / 8) % num_bytes as u64) as usize;
        let mask = 0x80u8 >> (hash % 8);
        (byte, mask)
    }
}

fn seeds_for(num_hashes: usize) -> Vec<u64> {
    let mut seeds: Vec<u64> = SEEDS.iter().copied().take(num_hashes).collect();
    if num_hashes > SEEDS.len() {
        let mut rng = StdRng::seed_from_u64(EXTRA_SEED_STREAM);
        seeds.extend((SEEDS.len()..num_hashes).map(|_| rng.random::<u64>()));
    }
    seeds
}

impl Filter for BloomFilter {
    fn create_filter<'a, I>(&self, keys: I) -> Vec<u8>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let keys: Vec<&[u8]> = keys.into_iter().collect();
        let num_bytes = self.bytes_for(keys.len());
        let mut filter = vec![0u8; 1 + num_bytes];
        filter[0] = self.num_hashes as u8;

        let bits = &mut filter[1..];
        for key in keys {
            for &seed in &self.seeds {
                let (byte, mask) = Self::bit_position(murmur64a(key, seed), num_bytes);
                bits[byte] |= mask;
            }
        }
        filter
    }

    fn may_contain(&self, filter: &[u8], key: &[u8]) -> bool {
        let Some((&stored_hashes, bits)) = filter.split_first() else {
            return true;
        };
        if bits.is_empty() {
            return true;
        }
        // Honor the hash count the filter was built with.
        let seeds = if usize::from(stored_hashes) == self.num_hashes {
            std::borrow::Cow::Borrowed(&self.seeds)
        } else {
            std::borrow::Cow::Owned(seeds_for(usize::from(stored_hashes)))
        };
        seeds.iter().all(|&seed| {
            let (byte, mask) = Self::bit_position(murmur64a(key, seed), bits.len());
            bits[byte] & mask != 0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(range: std::ops::Range<u32>) -> Vec<Vec<u8>> {
        range.map(|i| format!("key{:06}", i).into_bytes()).collect()
    }

    #[test]
    fn test_parameters_from_fp_rate() {
        let policy = BloomFilter::new(0.0082);
        // -ln(0.0082) / ln 2 = 6.93
        assert_eq!(policy.num_hashes(), 7);
        // m = -1000 * ln(0.0082) / ln(2)^2, just under 10000 bits
        assert_eq!(policy.bytes_for(1000), 1250);
        assert_eq!(BloomFilter::new(0.5).num_hashes(), 1);
    }

    #[test]
    fn test_bloom_filter_no_false_negatives() {
        let policy = BloomFilter::default();
        let keys = keys(0..1000);
        let filter = policy.create_filter(keys.iter().map(|k| k.as_slice()));
        assert_eq!(filter[0], 7);
        for key in &keys {
            assert!(policy.may_contain(&filter, key), "false negative for {:?}", key);
        }
    }

    #[test]
    fn test_bloom_filter_false_positive_rate() {
        let policy = BloomFilter::new(0.01);
        let members = keys(0..10_000);
        let filter = policy.create_filter(members.iter().map(|k| k.as_slice()));

        let false_positives =
            keys(10_000..20_000).iter().filter(|k| policy.may_contain(&filter, k)).count();
        let rate = false_positives as f64 / 10_000.0;
        assert!(rate < 0.03, "false positive rate too high: {}", rate);
    }

    #[test]
    fn test_many_hashes_use_generated_seeds() {
        let policy = BloomFilter::new(1e-6);
        assert!(policy.num_hashes() > SEEDS.len());
        let members = keys(0..100);
        let filter = policy.create_filter(members.iter().map(|k| k.as_slice()));
        assert!(members.iter().all(|k| policy.may_contain(&filter, k)));

        // A reader configured differently still honors the stored hash count.
        let other = BloomFilter::new(0.1);
        assert!(members.iter().all(|k| other.may_contain(&filter, k)));
    }

    #[test]
    fn test_empty_filters() {
        let policy = BloomFilter::default();
        assert!(policy.may_contain(&[], b"anything"));
        let filter = policy.create_filter(std::iter::empty::<&[u8]>());
        assert_eq!(filter.len(), 2);
        assert!(!policy.may_contain(&filter, b"anything"));
    }
}
