//! Acquisition of raw index files.
//!
//! An [`IndexSource`] lists crawl collections, lists the index files of a
//! collection, and copies one file to local disk in decompressed form. The
//! only implementation shells out to the AWS CLI, which handles credentials
//! and request signing for the public bucket.

mod aws_cli;
mod decompress;
mod retry;
mod skip_list;

pub use aws_cli::{
    parse_collection_listing, parse_index_listing, AwsCliIndexSource, AwsCliSettings,
    DEFAULT_BUCKET_URL, SLOW_DOWN_MARKER,
};
pub use decompress::gunzip_in_place;
pub use retry::{retry_on_slow_down, SlowDownRetryPolicy};
pub use skip_list::SkipList;

use std::path::PathBuf;
use std::process::ExitStatus;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("rate limited by the index bucket: {0}")]
    SlowDown(String),

    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<AcquisitionError>,
    },

    #[error("failed to prepare staging directory {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decompress {path}: {source}")]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decompression task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AcquisitionError {
    /// Only bucket rate limiting is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, AcquisitionError::SlowDown(_))
    }
}

/// Trait for index file providers.
#[async_trait]
pub trait IndexSource: Send + Sync {
    /// Collection ids, in the order they should be processed.
    async fn list_collections(&self) -> Result<Vec<String>, AcquisitionError>;

    /// Index file names of `collection`, in processing order.
    async fn list_index_files(&self, collection: &str) -> Result<Vec<String>, AcquisitionError>;

    /// Copies `file` of `collection` locally and returns the decompressed path.
    async fn fetch_index(&self, collection: &str, file: &str)
        -> Result<PathBuf, AcquisitionError>;
}
