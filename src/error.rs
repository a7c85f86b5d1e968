use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DedupError {
    /// The document source could not be opened for one of the passes.
    #[error("unable to open document source '{source_name}': {error}")]
    SourceUnavailable {
        source_name: String,
        #[source]
        error: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unable to write output: {0}")]
    Output(#[from] io::Error),

    #[error("unable to write csv output: {0}")]
    Csv(#[from] csv::Error),
}

impl DedupError {
    pub fn config<T: std::fmt::Display>(msg: T) -> DedupError {
        DedupError::Config(msg.to_string())
    }

    pub fn source_unavailable<T: std::fmt::Display>(name: T, error: io::Error) -> DedupError {
        DedupError::SourceUnavailable {
            source_name: name.to_string(),
            error,
        }
    }

    /// Configuration problems are the caller's fault; everything else is an environment failure.
    pub fn is_config(&self) -> bool {
        matches!(self, DedupError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, DedupError>;
