//! Near-duplicate detection for large text corpora.
//!
//! Documents are reduced to word shingles, hashed into MinHash signatures and indexed
//! with banded LSH. A [`Deduper`] streams a corpus twice: once to build the index and
//! once to assign every document to the cluster of the first similar document seen.

pub mod dedup;
pub mod dto;
pub mod error;
pub mod lsh;
pub mod minhash;
pub mod normalize;
pub mod pipeline;
pub mod shingle;
pub mod source;

pub use dedup::{DedupStats, Deduper};
pub use dto::{ClusterRecord, DedupConfig, Document, ShingleMode};
pub use error::DedupError;
pub use lsh::LshIndex;
pub use minhash::{MinHasher, Signature};
pub use normalize::Normalizer;
pub use source::{CsvSource, DocumentSource, JsonlSchema, JsonlSource};
