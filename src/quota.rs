//! Per-content-type volume accounting.
//!
//! Workers add the size of every accepted download; the producer checks the
//! running totals before each admission and drops types that went over
//! budget from its [`ActiveMimeSet`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::mime::{ActiveMimeSet, ContentTypeLimits};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Converts a byte count to megabytes.
pub fn bytes_to_megabytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MEGABYTE
}

/// Usage of a single content type, as reported by [`MimeQuotaRegistry::snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaUsage {
    pub mime: String,
    pub used_mb: f64,
    pub limit_mb: f64,
}

impl QuotaUsage {
    pub fn is_exceeded(&self) -> bool {
        self.used_mb > self.limit_mb
    }
}

/// Shared quota state: cumulative megabytes downloaded per content type,
/// checked against a static limit table.
pub struct MimeQuotaRegistry {
    limits: Arc<ContentTypeLimits>,
    usage: RwLock<HashMap<String, f64>>,
}

impl MimeQuotaRegistry {
    pub fn new(limits: Arc<ContentTypeLimits>) -> Self {
        Self {
            limits,
            usage: RwLock::new(HashMap::new()),
        }
    }

    pub fn limits(&self) -> &ContentTypeLimits {
        &self.limits
    }

    /// Removes `mime` from `active` if its usage strictly exceeds its limit.
    ///
    /// Only the read lock is taken; `active` belongs to the caller. Returns
    /// true if this call removed the type.
    pub async fn check_and_prune(&self, active: &mut ActiveMimeSet, mime: &str) -> bool {
        let exceeded = {
            let usage = self.usage.read().await;
            usage.get(mime).copied().unwrap_or(0.0) > self.limits.limit_mb(mime)
        };
        if exceeded && active.remove(mime) {
            info!("Mime type {} exceeded limit. Removing from active types.", mime);
            return true;
        }
        false
    }

    /// Adds `megabytes` to the usage of `mime`. Negative or NaN amounts count as zero.
    pub async fn record(&self, mime: &str, megabytes: f64) {
        let megabytes = if megabytes.is_finite() && megabytes > 0.0 {
            megabytes
        } else {
            0.0
        };
        let mut usage = self.usage.write().await;
        *usage.entry(mime.to_string()).or_insert(0.0) += megabytes;
    }

    pub async fn usage(&self, mime: &str) -> f64 {
        self.usage.read().await.get(mime).copied().unwrap_or(0.0)
    }

    pub fn is_exhausted(active: &ActiveMimeSet) -> bool {
        active.is_empty()
    }

    /// Usage for every type that has recorded downloads, sorted by mime.
    pub async fn snapshot(&self) -> Vec<QuotaUsage> {
        let usage = self.usage.read().await;
        let mut rows: Vec<QuotaUsage> = usage
            .iter()
            .map(|(mime, used)| QuotaUsage {
                mime: mime.clone(),
                used_mb: *used,
                limit_mb: self.limits.limit_mb(mime),
            })
            .collect();
        rows.sort_by(|a, b| a.mime.cmp(&b.mime));
        rows
    }
}
