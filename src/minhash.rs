use crate::error::{DedupError, Result};
use crate::shingle::FeatureSet;
use rand::prelude::*;
use rand::seq::index;

/// Hashing modulus, a prime just below 2^31 (2^31 - 61). The largest is 2^31 - 1.
pub const NEXT_PRIME: u32 = 2_147_483_587;
/// Coefficients and features are reduced into `[0, MAX_VALUE)`.
pub const MAX_VALUE: u32 = NEXT_PRIME - 1;
/// Slot value when a feature set is empty; no real minimum can reach it.
pub const EMPTY_SLOT: u32 = NEXT_PRIME + 1;

/// Fixed-length MinHash signature. Only comparable with signatures from the same `MinHasher`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub hash_values: Vec<u32>,
}

impl Signature {
    pub fn len(&self) -> usize {
        self.hash_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash_values.is_empty()
    }

    /// Fraction of agreeing slots, an estimate of the Jaccard similarity of the feature sets.
    pub fn similarity(&self, other: &Signature) -> f64 {
        if self.len() != other.len() || self.is_empty() {
            return 0.0;
        }
        let equal_count = self
            .hash_values
            .iter()
            .zip(&other.hash_values)
            .filter(|&(a, b)| a == b)
            .count();
        equal_count as f64 / self.len() as f64
    }
}

/// Family of `num_hashes` universal hash functions `(a * x + b) mod NEXT_PRIME`.
///
/// Coefficients are drawn once and never change, so every signature produced by one
/// instance is comparable with every other.
#[derive(Clone, Debug)]
pub struct MinHasher {
    coeff_a: Vec<u32>,
    coeff_b: Vec<u32>,
}

impl MinHasher {
    /// Creates a hasher with coefficients drawn from OS entropy.
    pub fn new(num_hashes: usize) -> Result<Self> {
        Self::from_rng(num_hashes, &mut StdRng::from_entropy())
    }

    /// Creates a hasher whose coefficients are reproducible from `seed`.
    pub fn with_seed(num_hashes: usize, seed: u64) -> Result<Self> {
        Self::from_rng(num_hashes, &mut StdRng::seed_from_u64(seed))
    }

    fn from_rng<R: Rng>(num_hashes: usize, rng: &mut R) -> Result<Self> {
        if num_hashes == 0 || num_hashes > MAX_VALUE as usize {
            return Err(DedupError::config(format!(
                "number of hash functions must be within 1..={MAX_VALUE}, got {num_hashes}"
            )));
        }
        Ok(MinHasher {
            coeff_a: pick_rand_coeffs(rng, num_hashes),
            coeff_b: pick_rand_coeffs(rng, num_hashes),
        })
    }

    pub fn num_hashes(&self) -> usize {
        self.coeff_a.len()
    }

    /// Computes the signature of a feature set: slot `i` is the minimum of hash function `i`
    /// over every feature.
    pub fn hash(&self, features: &FeatureSet) -> Signature {
        let mut hash_values = vec![EMPTY_SLOT; self.num_hashes()];
        for &feature in features {
            let x = u64::from(feature % MAX_VALUE);
            for ((slot, &a), &b) in hash_values.iter_mut().zip(&self.coeff_a).zip(&self.coeff_b) {
                let hash = permute_hash(x, a, b);
                *slot = (*slot).min(hash);
            }
        }
        Signature { hash_values }
    }
}

/// `k` distinct values sampled uniformly from `[0, MAX_VALUE)`.
fn pick_rand_coeffs<R: Rng>(rng: &mut R, k: usize) -> Vec<u32> {
    index::sample(rng, MAX_VALUE as usize, k)
        .into_iter()
        .map(|value| value as u32)
        .collect()
}

#[inline]
fn permute_hash(x: u64, a: u32, b: u32) -> u32 {
    // a, x < 2^31 so the product cannot overflow 64 bits
    ((u64::from(a) * x + u64::from(b)) % u64::from(NEXT_PRIME)) as u32
}
