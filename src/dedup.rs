use crate::dto::{ClusterRecord, DedupConfig, ShingleMode};
use crate::error::{DedupError, Result};
use crate::lsh::{compute_bands, LshIndex};
use crate::minhash::{MinHasher, Signature};
use crate::pipeline::for_each_batch;
use crate::shingle::shingle_with;
use crate::source::DocumentSource;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DedupStats {
    /// Documents read in the clustering pass
    pub documents: usize,
    /// Documents that started a new cluster
    pub clusters: usize,
    /// Documents assigned to an earlier representative
    pub duplicates: usize,
}

///
/// Two-pass near-duplicate clustering over a re-readable document source.
///
/// The first pass indexes every document's signature. The second pass walks the source
/// again in order: a document not yet assigned becomes the representative of a new
/// cluster, and every unassigned candidate returned by the index joins it. Assignments
/// are never revised.
///
#[derive(Debug)]
pub struct Deduper {
    minhasher: MinHasher,
    num_bands: usize,
    shingle_mode: ShingleMode,
    batch_size: usize,
    queue_depth: usize,
    progress_interval: usize,
}

impl Deduper {
    ///
    /// Constructs a Deduper from a hasher and an explicit band count.
    ///
    /// ## Arguments
    ///
    /// * `minhasher` - Coefficients shared by both passes.
    /// * `num_bands` - Number of LSH bands; must divide the hasher's signature length.
    ///
    pub fn new(minhasher: MinHasher, num_bands: usize) -> Result<Self> {
        let num_hashes = minhasher.num_hashes();
        if num_bands == 0 || num_hashes % num_bands != 0 {
            return Err(DedupError::config(format!(
                "bands {num_bands} must divide num_hashes {num_hashes} evenly"
            )));
        }
        let defaults = DedupConfig::default();
        Ok(Deduper {
            minhasher,
            num_bands,
            shingle_mode: defaults.shingle_mode,
            batch_size: defaults.batch_size,
            queue_depth: defaults.queue_depth,
            progress_interval: defaults.progress_interval,
        })
    }

    pub fn from_config(config: &DedupConfig) -> Result<Self> {
        config.validate()?;
        let minhasher = match config.seed {
            Some(seed) => MinHasher::with_seed(config.num_hashes, seed)?,
            None => MinHasher::new(config.num_hashes)?,
        };
        let num_bands = config
            .num_bands
            .unwrap_or_else(|| compute_bands(config.num_hashes, config.threshold));
        Ok(Self::new(minhasher, num_bands)?
            .with_shingle_mode(config.shingle_mode)
            .with_batching(config.batch_size, config.queue_depth)
            .with_progress_interval(config.progress_interval))
    }

    pub fn with_shingle_mode(mut self, shingle_mode: ShingleMode) -> Self {
        self.shingle_mode = shingle_mode;
        self
    }

    pub fn with_batching(mut self, batch_size: usize, queue_depth: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self.queue_depth = queue_depth.max(1);
        self
    }

    pub fn with_progress_interval(mut self, progress_interval: usize) -> Self {
        self.progress_interval = progress_interval;
        self
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    pub fn num_hashes(&self) -> usize {
        self.minhasher.num_hashes()
    }

    /// Shingles and hashes one normalized text.
    pub fn fingerprint(&self, text: &str) -> Signature {
        self.minhasher.hash(&shingle_with(self.shingle_mode, text))
    }

    /// A fresh index sized for this Deduper's signatures.
    pub fn empty_index(&self) -> Result<LshIndex> {
        LshIndex::new(self.num_hashes(), self.num_bands)
    }

    /// First pass: inserts every document of `source` into a new index.
    pub fn index<S: DocumentSource>(&self, source: &S) -> Result<LshIndex> {
        let start = Instant::now();
        info!(source = %source.name(), "First pass, indexing documents");
        let mut index = self.empty_index()?;
        let mut progress = Progress::new(self.progress_interval);
        let docs = source.documents()?;
        for_each_batch(docs, self.batch_size, self.queue_depth, |batch| {
            let signatures: Vec<Signature> = batch
                .par_iter()
                .map(|doc| self.fingerprint(&doc.text))
                .collect();
            for (doc, signature) in batch.iter().zip(&signatures) {
                index.insert(&doc.id, signature);
                progress.tick();
            }
            Ok(())
        })?;
        info!(
            documents = progress.count,
            "Indexed documents in {:.4} secs",
            start.elapsed().as_secs_f64()
        );
        Ok(index)
    }

    /// Second pass: assigns every document of `source` to a cluster, in source order.
    ///
    /// `emit` receives one record per document. The index is only read.
    pub fn cluster<S, F>(&self, source: &S, index: &LshIndex, mut emit: F) -> Result<DedupStats>
    where
        S: DocumentSource,
        F: FnMut(ClusterRecord) -> Result<()>,
    {
        let start = Instant::now();
        info!(source = %source.name(), "Second pass, identifying duplicates");
        let mut cluster_map: FxHashMap<String, Arc<str>> = FxHashMap::default();
        let mut stats = DedupStats::default();
        let mut progress = Progress::new(self.progress_interval);
        let docs = source.documents()?;
        for_each_batch(docs, self.batch_size, self.queue_depth, |batch| {
            // documents already assigned when the batch arrives need no signature
            let signatures: Vec<Option<Signature>> = batch
                .par_iter()
                .map(|doc| {
                    (!cluster_map.contains_key(&doc.id)).then(|| self.fingerprint(&doc.text))
                })
                .collect();
            for (doc, signature) in batch.into_iter().zip(signatures) {
                progress.tick();
                stats.documents += 1;
                if let Some(cluster_id) = cluster_map.get(&doc.id) {
                    stats.duplicates += 1;
                    emit(ClusterRecord {
                        cluster_id: cluster_id.to_string(),
                        id: doc.id,
                        title: doc.title,
                    })?;
                    continue;
                }
                let representative: Arc<str> = Arc::from(doc.id.as_str());
                cluster_map.insert(doc.id.clone(), representative.clone());
                stats.clusters += 1;
                let signature = signature.unwrap_or_else(|| self.fingerprint(&doc.text));
                for candidate in index.query(&signature) {
                    if !cluster_map.contains_key(candidate) {
                        cluster_map.insert(candidate.to_owned(), representative.clone());
                    }
                }
                emit(ClusterRecord {
                    cluster_id: doc.id.clone(),
                    id: doc.id,
                    title: doc.title,
                })?;
            }
            Ok(())
        })?;
        info!(
            documents = stats.documents,
            clusters = stats.clusters,
            duplicates = stats.duplicates,
            "Clustered documents in {:.4} secs",
            start.elapsed().as_secs_f64()
        );
        Ok(stats)
    }

    /// Runs both passes. The index lives only for the duration of the call.
    pub fn dedupe<S, F>(&self, source: &S, emit: F) -> Result<DedupStats>
    where
        S: DocumentSource,
        F: FnMut(ClusterRecord) -> Result<()>,
    {
        let index = self.index(source)?;
        self.cluster(source, &index, emit)
    }

    /// Runs both passes, writing one `cluster_id id title` line per document.
    pub fn dedupe_to_writer<S, W>(&self, source: &S, writer: W) -> Result<DedupStats>
    where
        S: DocumentSource,
        W: Write,
    {
        let mut writer = BufWriter::new(writer);
        let stats = self.dedupe(source, |record| {
            writeln!(writer, "{record}")?;
            Ok(())
        })?;
        writer.flush()?;
        Ok(stats)
    }
}

struct Progress {
    count: usize,
    interval: usize,
}

impl Progress {
    fn new(interval: usize) -> Self {
        Progress { count: 0, interval }
    }

    fn tick(&mut self) {
        self.count += 1;
        if self.interval > 0 && self.count % self.interval == 0 {
            info!("{} docs", self.count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::Document;

    fn deduper() -> Deduper {
        let config = DedupConfig {
            seed: Some(2019),
            batch_size: 2,
            ..Default::default()
        };
        Deduper::from_config(&config).unwrap()
    }

    fn run(deduper: &Deduper, docs: &Vec<Document>) -> Vec<ClusterRecord> {
        let mut records = Vec::new();
        deduper
            .dedupe(docs, |record| {
                records.push(record);
                Ok(())
            })
            .unwrap();
        records
    }

    fn words(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    fn five_record_corpus() -> Vec<Document> {
        let shared = words("shared", 40).join(" ");
        vec![
            Document::new("d1", "First", shared.clone()),
            Document::new("d2", "Second", words("alpha", 40).join(" ")),
            Document::new("d3", "Third", shared),
            Document::new("d4", "Fourth", words("beta", 40).join(" ")),
            Document::new("d5", "Fifth", words("gamma", 40).join(" ")),
        ]
    }

    #[test]
    fn test_bands_must_divide_hashes() {
        let hasher = MinHasher::with_seed(256, 1).unwrap();
        assert!(Deduper::new(hasher, 7).unwrap_err().is_config());
    }

    #[test]
    fn test_from_config_derives_bands() {
        let deduper = deduper();
        assert_eq!(deduper.num_hashes(), 256);
        assert_eq!(deduper.num_bands(), 8);
    }

    #[test]
    fn test_exact_duplicates_share_cluster() {
        let records = run(&deduper(), &five_record_corpus());
        let expected = [
            ("d1", "d1", "First"),
            ("d2", "d2", "Second"),
            ("d1", "d3", "Third"),
            ("d4", "d4", "Fourth"),
            ("d5", "d5", "Fifth"),
        ];
        assert_eq!(records.len(), expected.len());
        for (record, (cluster_id, id, title)) in records.iter().zip(expected) {
            assert_eq!(record.cluster_id, cluster_id);
            assert_eq!(record.id, id);
            assert_eq!(record.title, title);
        }
    }

    #[test]
    fn test_stats() {
        let docs = five_record_corpus();
        let stats = deduper().dedupe(&docs, |_| Ok(())).unwrap();
        assert_eq!(
            stats,
            DedupStats {
                documents: 5,
                clusters: 4,
                duplicates: 1
            }
        );
    }

    #[test]
    fn test_unindexed_pass_gives_singletons() {
        let deduper = deduper();
        let docs = five_record_corpus();
        let index = deduper.empty_index().unwrap();
        let mut records = Vec::new();
        deduper
            .cluster(&docs, &index, |record| {
                records.push(record);
                Ok(())
            })
            .unwrap();
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(ClusterRecord::is_representative));
    }

    #[test]
    fn test_near_duplicates_with_low_threshold() {
        let hasher = MinHasher::with_seed(128, 11).unwrap();
        let deduper = Deduper::new(hasher, 32).unwrap();
        let original = words("w", 100);
        let mut edited = original.clone();
        edited[50] = "changed".into();
        let docs = vec![
            Document::new("a", "", original.join(" ")),
            Document::new("b", "", words("z", 100).join(" ")),
            Document::new("c", "", edited.join(" ")),
        ];
        let records = run(&deduper, &docs);
        assert_eq!(records[2].cluster_id, "a");
        assert!(records[1].is_representative());
    }

    #[test]
    fn test_empty_documents_cluster_together() {
        let docs = vec![
            Document::new("e1", "", ""),
            Document::new("t", "", words("text", 20).join(" ")),
            Document::new("e2", "", "   "),
        ];
        let records = run(&deduper(), &docs);
        assert_eq!(records[1].cluster_id, "t");
        assert_eq!(records[2].cluster_id, "e1");
    }

    #[test]
    fn test_assignments_are_first_writer_wins() {
        // b is claimed by a, so c's later match on b does not move it
        let shared = words("s", 30).join(" ");
        let docs = vec![
            Document::new("a", "", shared.clone()),
            Document::new("b", "", shared.clone()),
            Document::new("c", "", shared),
        ];
        let records = run(&deduper(), &docs);
        assert!(records.iter().all(|record| record.cluster_id == "a"));
    }

    #[test]
    fn test_writer_output_lines() {
        let mut out = Vec::new();
        deduper()
            .dedupe_to_writer(&five_record_corpus(), &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "d1 d1 First");
        assert_eq!(lines[2], "d1 d3 Third");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_emit_error_aborts_run() {
        let result = deduper().dedupe(&five_record_corpus(), |_| {
            Err(DedupError::Output(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "sink closed",
            )))
        });
        assert!(matches!(result, Err(DedupError::Output(_))));
    }
}
