//! Fetch-and-persist workers.
//!
//! A worker takes one admitted `(url, mime)` pair and either stores the
//! payload under `<data-root>/<mime>/` and charges its size to the quota, or
//! gives up. Nothing is surfaced to the caller beyond the returned
//! [`FetchOutcome`], which the parser only logs.

mod client;
mod naming;

pub use client::{FetchSettings, HttpFetcher};
pub use naming::derive_filename;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::moderation::ModerationVerdict;
use crate::trust::TrustRejection;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("server returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("failed to write {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a single worker run.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Payload written and charged to the quota.
    Stored { path: PathBuf, megabytes: f64 },
    /// URL refused by the trust gate before any request was made.
    Untrusted(TrustRejection),
    /// Image refused by moderation. `None` when the classifier call failed.
    Discarded { verdict: Option<ModerationVerdict> },
    /// Transport, status or filesystem failure.
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, FetchOutcome::Stored { .. })
    }
}

/// Trait for the worker body spawned by the parser.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_and_persist(&self, url: String, mime: String) -> FetchOutcome;
}
