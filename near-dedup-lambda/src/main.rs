mod response;
mod util;

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use lazy_static::lazy_static;
use near_dedup::DedupConfig;
use response::{make_response_payload, ServiceError};
use rusoto_core::{Client, Region};
use rusoto_s3::S3Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;
use util::DataFile;

lazy_static! {
    // AWS Region
    static ref REGION: Result<Region, ServiceError> = util::get_region();
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupRequest {
    pub data: DataFile,
    pub num_perm: usize,
    #[serde(default)]
    pub num_bands: Option<usize>,
    pub threshold: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl DedupRequest {
    fn dedup_config(&self) -> DedupConfig {
        DedupConfig {
            num_hashes: self.num_perm,
            num_bands: self.num_bands,
            threshold: self.threshold,
            seed: self.seed,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .without_time()
        .init();
    run(service_fn(process)).await?;
    Ok(())
}

async fn process(event: LambdaEvent<DedupRequest>) -> Result<Value, Error> {
    let (request, _context) = event.into_parts();
    let result = dedup(request).await;
    make_response_payload(result)
}

async fn dedup(request: DedupRequest) -> Result<Value, ServiceError> {
    let start = Instant::now();
    let region = REGION.clone()?;
    let client = S3Client::new_with_client(Client::shared(), region);
    let bytes = request.data.download(&client).await?;
    info!(
        "File downloaded in {:.4} secs",
        start.elapsed().as_secs_f64()
    );
    let config = request.dedup_config();
    let (object, stats) = tokio::task::spawn_blocking(move || util::cluster_csv(bytes, &config))
        .await
        .map_err(ServiceError::internal_server_error)??;
    let output = request.data.output_location();
    output.upload(&client, object).await?;
    info!(
        "Dedupe completed in {:.4} secs",
        start.elapsed().as_secs_f64()
    );
    Ok(json!({
        "bucket": output.bucket,
        "key": output.key,
        "documents": stats.documents,
        "clusters": stats.clusters,
        "duplicates": stats.duplicates,
    }))
}
