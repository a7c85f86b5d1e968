use crate::response::ServiceError;
use futures::stream::TryStreamExt;
use near_dedup::{CsvSource, DedupConfig, DedupStats, Deduper, Normalizer};
use rusoto_core::Region;
use rusoto_s3::{GetObjectRequest, PutObjectRequest, S3Client, S3};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DataFile {
    pub bucket: String,
    pub key: String,
}

impl DataFile {
    /// Results go next to the input, under the matching `/output` prefix.
    pub fn output_location(&self) -> DataFile {
        DataFile {
            bucket: self.bucket.replace("/input", "/output"),
            key: self.key.clone(),
        }
    }

    pub async fn download(&self, client: &S3Client) -> Result<Vec<u8>, ServiceError> {
        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            ..Default::default()
        };
        let mut object = client
            .get_object(request)
            .await
            .map_err(ServiceError::internal_server_error)?;
        let body = object
            .body
            .take()
            .ok_or_else(|| ServiceError::internal_server_error("Unable to extract body"))?;
        body.map_ok(|b| b.to_vec())
            .try_concat()
            .await
            .map_err(ServiceError::internal_server_error)
    }

    pub async fn upload(&self, client: &S3Client, object: Vec<u8>) -> Result<(), ServiceError> {
        let request = PutObjectRequest {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            body: Some(object.into()),
            ..Default::default()
        };
        client
            .put_object(request)
            .await
            .map(|_| ())
            .map_err(ServiceError::internal_server_error)
    }
}

pub fn get_region() -> Result<Region, ServiceError> {
    let val = env::var("REGION").map_err(|_| {
        ServiceError::internal_server_error("Environment variable 'REGION' not found")
    })?;
    Region::from_str(val.as_str())
        .map_err(|_| ServiceError::internal_server_error(format!("Unable to parse region {val}")))
}

/// Clusters a downloaded CSV corpus into CSV rows `cluster_id,id,title`.
pub fn cluster_csv(
    bytes: Vec<u8>,
    config: &DedupConfig,
) -> Result<(Vec<u8>, DedupStats), ServiceError> {
    let deduper = Deduper::from_config(config)?;
    let source = CsvSource::from_bytes(bytes, Normalizer::new());
    let mut writer = csv::Writer::from_writer(vec![]);
    let stats = deduper.dedupe(&source, |record| {
        writer.serialize(&record)?;
        Ok(())
    })?;
    let object = writer
        .into_inner()
        .map_err(ServiceError::internal_server_error)?;
    Ok((object, stats))
}
