use crate::error::{DedupError, Result};
use crate::minhash::Signature;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{info, warn};

/// Concatenated big-endian values of one band; fixed width so distinct bands never alias.
type BandKey = Box<[u8]>;

/// Locality-Sensitive Hashing over MinHash signatures.
///
/// Each signature is split into `num_bands` contiguous bands of `rows` values. Documents
/// whose signatures agree on every value of at least one band share a bucket and become
/// query candidates for each other. The index is append-only.
#[derive(Debug)]
pub struct LshIndex {
    num_hashes: usize,
    num_bands: usize,
    rows: usize,
    /// Interned document ids; buckets refer to them by position
    ids: Vec<Box<str>>,
    /// One table per band, mapping band key to the ids inserted under it, in insertion order
    hash_tables: Vec<FxHashMap<BandKey, Vec<usize>>>,
}

impl LshIndex {
    /// Creates an empty index.
    ///
    /// ## Arguments
    ///
    /// * `num_hashes` - Signature length the index will receive.
    /// * `num_bands` - Number of bands (hash tables); must divide `num_hashes` evenly.
    pub fn new(num_hashes: usize, num_bands: usize) -> Result<Self> {
        if num_hashes == 0 || num_bands == 0 || num_hashes % num_bands != 0 {
            return Err(DedupError::config(format!(
                "bands {num_bands} must divide num_hashes {num_hashes} evenly"
            )));
        }
        let rows = num_hashes / num_bands;
        info!(
            num_hashes,
            num_bands,
            rows,
            "LSH with {num_hashes} hashes and {num_bands} bands, target Jaccard threshold {:.3}",
            band_threshold(num_hashes, num_bands)
        );
        Ok(LshIndex {
            num_hashes,
            num_bands,
            rows,
            ids: Vec::new(),
            hash_tables: vec![FxHashMap::default(); num_bands],
        })
    }

    /// Creates an empty index whose band count is derived from a Jaccard threshold.
    pub fn for_threshold(num_hashes: usize, threshold: f64) -> Result<Self> {
        Self::new(num_hashes, compute_bands(num_hashes, threshold))
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of insertions so far.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Adds `id` to the bucket of each of the signature's bands.
    ///
    /// Ids are not deduplicated: inserting the same id twice stores it twice. The signature
    /// must have `num_hashes` values.
    pub fn insert(&mut self, id: &str, signature: &Signature) {
        debug_assert_eq!(signature.len(), self.num_hashes, "signature length");
        let position = self.ids.len();
        self.ids.push(id.into());
        let rows = self.rows;
        for (table, band) in self
            .hash_tables
            .iter_mut()
            .zip(signature.hash_values.chunks_exact(rows))
        {
            table.entry(band_key(band)).or_default().push(position);
        }
    }

    /// Ids sharing at least one band with `signature`. The result has no defined order.
    pub fn query(&self, signature: &Signature) -> FxHashSet<&str> {
        debug_assert_eq!(signature.len(), self.num_hashes, "signature length");
        self.hash_tables
            .iter()
            .zip(signature.hash_values.chunks_exact(self.rows))
            .fold(FxHashSet::default(), |mut candidates, (table, band)| {
                if let Some(positions) = table.get(&band_key(band)) {
                    candidates.extend(positions.iter().map(|&p| &*self.ids[p]));
                }
                candidates
            })
    }
}

#[inline]
fn band_key(band: &[u32]) -> BandKey {
    band.iter().flat_map(|value| value.to_be_bytes()).collect()
}

/// Similarity at which a pair becomes likely to share a band: `(1/b)^(b/n)`.
pub fn band_threshold(num_hashes: usize, num_bands: usize) -> f64 {
    (1.0 / num_bands as f64).powf(num_bands as f64 / num_hashes as f64)
}

/// Picks the largest divisor `b` of `num_hashes` whose band threshold reaches `threshold`.
///
/// Divisors are scanned from `num_hashes` downward. When the chosen band count does not
/// bracket the target together with the previous candidate, a warning is logged and the
/// band count is used anyway. Falls back to a single band if no divisor above one qualifies.
pub fn compute_bands(num_hashes: usize, threshold: f64) -> usize {
    let mut t = 0.0;
    let mut last_t = 0.0;
    let mut num_bands = 1;
    for b in (2..=num_hashes).rev().filter(|b| num_hashes % b == 0) {
        last_t = t;
        t = band_threshold(num_hashes, b);
        if t >= threshold {
            num_bands = b;
            break;
        }
    }
    if num_bands == 1 {
        last_t = t;
        t = 1.0;
    }
    if !(t >= threshold && last_t <= threshold) {
        warn!(
            "Target threshold {:.3} not within range [{:.3}, {:.3}]",
            threshold, last_t, t
        );
    }
    num_bands
}
