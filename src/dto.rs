use crate::error::{DedupError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One input record after field extraction and normalization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub text: String,
}

impl Document {
    pub fn new<I, T, X>(id: I, title: T, text: X) -> Self
    where
        I: Into<String>,
        T: Into<String>,
        X: Into<String>,
    {
        Document {
            id: id.into(),
            title: title.into(),
            text: text.into(),
        }
    }
}

/// Row layout of the CSV corpora handled by the service.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CsvRecord {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub title: String,
}

/// One line of output: the cluster a document was assigned to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClusterRecord {
    pub cluster_id: String,
    pub id: String,
    pub title: String,
}

impl ClusterRecord {
    /// The first member of a cluster is its own representative.
    pub fn is_representative(&self) -> bool {
        self.cluster_id == self.id
    }
}

impl fmt::Display for ClusterRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.cluster_id, self.id, self.title)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShingleMode {
    #[default]
    Words,
    Chars,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DedupConfig {
    /// Signature length (number of MinHash functions).
    pub num_hashes: usize,
    /// Explicit band count; derived from `threshold` when absent.
    pub num_bands: Option<usize>,
    pub threshold: f64,
    pub seed: Option<u64>,
    pub batch_size: usize,
    pub queue_depth: usize,
    pub progress_interval: usize,
    pub shingle_mode: ShingleMode,
}

impl Default for DedupConfig {
    fn default() -> Self {
        DedupConfig {
            num_hashes: 256,
            num_bands: None,
            threshold: 0.9,
            seed: None,
            batch_size: 1024,
            queue_depth: 4,
            progress_interval: 10_000,
            shingle_mode: ShingleMode::Words,
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_hashes == 0 {
            return Err(DedupError::config("numHashes must be positive"));
        }
        match self.num_bands {
            Some(0) => return Err(DedupError::config("numBands must be positive")),
            Some(bands) if self.num_hashes % bands != 0 => {
                return Err(DedupError::config(format!(
                    "bands {} must divide num_hashes {} evenly",
                    bands, self.num_hashes
                )))
            }
            Some(_) => {}
            None if !(self.threshold > 0.0 && self.threshold < 1.0) => {
                return Err(DedupError::config(format!(
                    "threshold {} must lie strictly between 0 and 1",
                    self.threshold
                )))
            }
            None => {}
        }
        if self.batch_size == 0 || self.queue_depth == 0 {
            return Err(DedupError::config(
                "batchSize and queueDepth must be positive",
            ));
        }
        Ok(())
    }
}
