//! near-dedup CLI - cluster near-duplicate documents in a corpus file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use near_dedup::{
    CsvSource, DedupConfig, DedupStats, Deduper, DocumentSource, JsonlSchema, JsonlSource,
    Normalizer, ShingleMode,
};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Compute fingerprints for documents and cluster near duplicates.
///
/// Prints one line per document: cluster representative id, document id, title.
/// A line whose first two fields match starts a new cluster.
#[derive(Parser, Debug)]
#[command(name = "near-dedup")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file; flags override its values.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Number of MinHash functions (signature length).
    #[arg(short = 'm', long, global = true)]
    num_hashes: Option<usize>,

    /// Number of LSH bands; must divide the number of hashes. Overrides --threshold.
    #[arg(short, long, global = true)]
    bands: Option<usize>,

    /// Target Jaccard similarity threshold used to derive the band count.
    #[arg(short, long, global = true)]
    threshold: Option<f64>,

    /// Seed for the MinHash coefficients, for reproducible output.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Documents per hashing batch.
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Shingle characters instead of words.
    #[arg(long, global = true)]
    chars: bool,

    /// Write clusters to this file instead of stdout.
    #[arg(short, long, value_name = "OUTPUT", global = true)]
    output: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dedupe the Washington Post collection
    Wapo(InputArgs),
    /// Dedupe the BETTER dry run collection
    Better(InputArgs),
    /// Dedupe the BETTER evaluation collection
    Better2(InputArgs),
    /// Dedupe the MSMARCO v2 passage collection
    MarcoPass(InputArgs),
    /// Dedupe a JSON lines file with custom field paths
    Jsonl(JsonlArgs),
    /// Dedupe a CSV file with columns id, text and optionally title
    Csv(InputArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Input file.
    #[arg(value_name = "INPUT")]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct JsonlArgs {
    /// Input JSON lines file.
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Dotted path of the document id.
    #[arg(long, default_value = "id")]
    id_field: String,

    /// Dotted path of the document text.
    #[arg(long, default_value = "text")]
    text_field: String,

    /// Dotted path of the document title.
    #[arg(long)]
    title_field: Option<String>,
}

impl Cli {
    fn dedup_config(&self) -> Result<DedupConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Unable to open config {}", path.display()))?;
                serde_json::from_reader(io::BufReader::new(file))
                    .with_context(|| format!("Unable to parse config {}", path.display()))?
            }
            None => DedupConfig::default(),
        };
        if let Some(num_hashes) = self.num_hashes {
            config.num_hashes = num_hashes;
        }
        if let Some(bands) = self.bands {
            config.num_bands = Some(bands);
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
            // an explicit threshold replaces a band count from the config file
            if self.bands.is_none() {
                config.num_bands = None;
            }
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if self.chars {
            config.shingle_mode = ShingleMode::Chars;
        }
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn jsonl_source(path: &Path, schema: JsonlSchema) -> JsonlSource {
    JsonlSource::new(path, schema, Normalizer::new())
}

fn run<S: DocumentSource>(
    deduper: &Deduper,
    source: &S,
    output: Option<&Path>,
) -> Result<DedupStats> {
    let stats = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Unable to create output {}", path.display()))?;
            deduper.dedupe_to_writer(source, file)?
        }
        None => deduper.dedupe_to_writer(source, io::stdout().lock())?,
    };
    Ok(stats)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let start = Instant::now();
    let config = cli.dedup_config()?;
    let deduper = Deduper::from_config(&config)?;
    let output = cli.output.as_deref();
    let stats = match &cli.command {
        Commands::Wapo(args) => {
            run(&deduper, &jsonl_source(&args.input, JsonlSchema::wapo()), output)?
        }
        Commands::Better(args) => {
            run(&deduper, &jsonl_source(&args.input, JsonlSchema::better()), output)?
        }
        Commands::Better2(args) => {
            run(&deduper, &jsonl_source(&args.input, JsonlSchema::better2()), output)?
        }
        Commands::MarcoPass(args) => run(
            &deduper,
            &jsonl_source(&args.input, JsonlSchema::marco_passage()),
            output,
        )?,
        Commands::Jsonl(args) => {
            let schema = JsonlSchema::custom(
                &args.id_field,
                &args.text_field,
                args.title_field.as_deref(),
            );
            run(&deduper, &jsonl_source(&args.input, schema), output)?
        }
        Commands::Csv(args) => run(
            &deduper,
            &CsvSource::from_path(&args.input, Normalizer::new()),
            output,
        )?,
    };
    info!(
        documents = stats.documents,
        clusters = stats.clusters,
        duplicates = stats.duplicates,
        "Finished in {:.4} secs",
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
