//! Common Crawl Harvester Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod dispatcher;
pub mod fetch;
pub mod harvest;
pub mod index;
pub mod index_source;
pub mod mime;
pub mod moderation;
pub mod quota;
pub mod stats;
pub mod trust;

// Re-export commonly used types for convenience
pub use dispatcher::BoundedDispatcher;
pub use fetch::{ContentFetcher, FetchOutcome, HttpFetcher};
pub use harvest::{HarvestSummary, Harvester, StopReason};
pub use index::{ParseOutcome, RecordStreamParser};
pub use index_source::{AwsCliIndexSource, IndexSource};
pub use mime::ActiveMimeSet;
pub use quota::MimeQuotaRegistry;
pub use trust::TrustPolicy;
